//! Report Rendering
//!
//! Turns an [`EvaluationRecord`] into a PDF score report. The layout is fixed:
//! a title, a "Scores:" section with one line per criterion, a blank separator,
//! and a "Feedback:" section holding the recommendations as wrapped text.

use crate::evaluation::EvaluationRecord;
use lopdf::{
    Document, Object, ObjectId, Stream, StringFormat,
    content::{Content, Operation},
    dictionary,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REPORT_TITLE: &str = "IELTS Scoring Report";
pub const DEFAULT_REPORTS_DIR: &str = "reports";
pub const DEFAULT_REPORT_FILENAME: &str = "IELTS_Report.pdf";
pub const DEFAULT_SAMPLE_FILENAME: &str = "Sample_IELTS_Report.pdf";

/// Characters per feedback line before wrapping.
const WRAP_COLUMNS: usize = 90;

// A4 in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub reports_dir: PathBuf,
    pub report_filename: String,
    pub sample_filename: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            report_filename: DEFAULT_REPORT_FILENAME.to_string(),
            sample_filename: DEFAULT_SAMPLE_FILENAME.to_string(),
        }
    }
}

impl ReportConfig {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            ..Self::default()
        }
    }

    /// Destination of the report for the session's own evaluation.
    pub fn report_path(&self) -> PathBuf {
        self.reports_dir.join(&self.report_filename)
    }

    /// Destination of the report for the built-in sample evaluation.
    pub fn sample_path(&self) -> PathBuf {
        self.reports_dir.join(&self.sample_filename)
    }
}

/// A failure while producing a report. Every variant names the target path.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory for {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode report {path}: {source}")]
    Encode {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("report task for {path} did not complete: {source}")]
    Task {
        path: PathBuf,
        source: tokio::task::JoinError,
    },
}

impl ReportError {
    pub fn path(&self) -> &Path {
        match self {
            ReportError::CreateDir { path, .. }
            | ReportError::Encode { path, .. }
            | ReportError::Write { path, .. }
            | ReportError::Task { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    Body,
    Blank,
}

impl LineStyle {
    fn font(&self) -> (&'static str, i64) {
        match self {
            LineStyle::Title => ("F2", 16),
            LineStyle::Heading => ("F2", 12),
            LineStyle::Body | LineStyle::Blank => ("F1", 10),
        }
    }

    fn height(&self) -> i64 {
        match self {
            LineStyle::Title => 28,
            LineStyle::Heading => 20,
            LineStyle::Body => 14,
            LineStyle::Blank => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Blank, "")
    }
}

/// The report laid out as styled lines, independent of the output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    lines: Vec<Line>,
}

impl ReportLayout {
    pub fn from_evaluation(evaluation: &EvaluationRecord) -> Self {
        let mut lines = vec![
            Line::new(LineStyle::Title, REPORT_TITLE),
            Line::blank(),
            Line::new(LineStyle::Heading, "Scores:"),
        ];
        lines.extend(
            evaluation
                .scores()
                .iter()
                .map(|(name, score)| Line::new(LineStyle::Body, format!("{}: {}", name, score))),
        );
        lines.push(Line::blank());
        lines.push(Line::new(LineStyle::Heading, "Feedback:"));

        let feedback = evaluation
            .recommendations()
            .iter()
            .map(|(name, text)| format!("{}: {}", name, text))
            .collect::<Vec<_>>()
            .join("\n");
        lines.extend(
            feedback
                .lines()
                .flat_map(|paragraph| wrap(paragraph, WRAP_COLUMNS))
                .map(|l| Line::new(LineStyle::Body, l)),
        );
        Self { lines }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Splits the lines into pages that fit between the top and bottom margins.
    fn pages(&self) -> Vec<&[Line]> {
        let usable = PAGE_HEIGHT - 2 * MARGIN;
        let mut pages = Vec::new();
        let mut start = 0;
        let mut used = 0;
        for (i, line) in self.lines.iter().enumerate() {
            if used + line.style.height() > usable && i > start {
                pages.push(&self.lines[start..i]);
                start = i;
                used = 0;
            }
            used += line.style.height();
        }
        pages.push(&self.lines[start..]);
        pages
    }
}

/// Greedy word wrap. Words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// A character the standard report fonts cannot show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("character {character:?} in {text:?} is not supported by the report font")]
pub struct UnsupportedCharacter {
    pub character: char,
    pub text: String,
}

/// Encodes text for the standard fonts' WinAnsiEncoding.
fn encode_win_ansi(text: &str) -> Result<Vec<u8>, UnsupportedCharacter> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => Ok(c as u8),
            '\u{a0}'..='\u{ff}' => Ok(c as u32 as u8),
            '\u{2018}' => Ok(0x91),
            '\u{2019}' => Ok(0x92),
            '\u{201c}' => Ok(0x93),
            '\u{201d}' => Ok(0x94),
            '\u{2013}' => Ok(0x96),
            '\u{2014}' => Ok(0x97),
            '\u{2026}' => Ok(0x85),
            '\u{20ac}' => Ok(0x80),
            _ => Err(UnsupportedCharacter {
                character: c,
                text: text.to_string(),
            }),
        })
        .collect()
}

fn page_content(lines: &[Line]) -> Result<Content, UnsupportedCharacter> {
    let mut operations = vec![Operation::new("BT", vec![])];
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        y -= line.style.height();
        if line.style == LineStyle::Blank {
            continue;
        }
        let (font, size) = line.style.font();
        operations.push(Operation::new("Tf", vec![font.into(), size.into()]));
        operations.push(Operation::new(
            "Tm",
            vec![
                1i64.into(),
                0i64.into(),
                0i64.into(),
                1i64.into(),
                MARGIN.into(),
                y.into(),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&line.text)?,
                StringFormat::Literal,
            )],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Ok(Content { operations })
}

type EncodeError = Box<dyn std::error::Error + Send + Sync>;

fn build_document(layout: &ReportLayout) -> Result<Document, EncodeError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<ObjectId> = Vec::new();
    for lines in layout.pages() {
        let content = page_content(lines)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    let media_box: Vec<Object> = vec![0i64.into(), 0i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()];
    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids.into_iter().map(Object::from).collect::<Vec<Object>>(),
        "Resources" => resources_id,
        "MediaBox" => media_box,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

/// Renders `evaluation` as a PDF at `path`, creating the parent directory and
/// replacing any existing file.
///
/// The document is fully encoded in memory before anything touches the
/// destination, so an encoding failure never leaves an empty file behind.
/// Text the report fonts cannot show fails with [`ReportError::Encode`]
/// rather than being dropped.
pub fn render_report(evaluation: &EvaluationRecord, path: &Path) -> Result<PathBuf, ReportError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let layout = ReportLayout::from_evaluation(evaluation);
    let encode_error = |source: EncodeError| ReportError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let mut doc = build_document(&layout).map_err(encode_error)?;
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| encode_error(e.into()))?;
    debug!(path = %path.display(), lines = layout.lines().len(), bytes = bytes.len(), "Report encoded");

    fs::write(path, &bytes).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Report written");
    Ok(path.to_path_buf())
}

/// Runs [`render_report`] on the blocking thread pool so the async runtime
/// keeps serving the voice channel while the file is written.
pub async fn render_report_in_background(
    evaluation: EvaluationRecord,
    path: PathBuf,
) -> Result<PathBuf, ReportError> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || render_report(&evaluation, &path))
        .await
        .map_err(|source| ReportError::Task {
            path: target,
            source,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_layout_sections_in_order() {
        let layout = ReportLayout::from_evaluation(&EvaluationRecord::sample());
        let texts: Vec<&str> = layout.lines().iter().map(|l| l.text.as_str()).collect();

        assert_eq!(texts[0], REPORT_TITLE);
        assert_eq!(texts[2], "Scores:");
        assert_eq!(texts[3], "Fluency & Coherence: 8");
        assert_eq!(texts[4], "Lexical Resource: 7");
        assert_eq!(texts[5], "Grammatical Range & Accuracy: 7");
        assert_eq!(texts[6], "Pronunciation: 6.5");
        assert_eq!(layout.lines()[7].style, LineStyle::Blank);
        assert_eq!(texts[8], "Feedback:");
        assert_eq!(
            texts[9],
            "Fluency & Coherence: Practice speaking continuously for fewer pauses."
        );
        assert_eq!(texts.len(), 13);
    }

    #[test]
    fn test_layout_wraps_long_feedback() {
        let long_text = "Try to extend every answer with a reason and a concrete example from your own life. ".repeat(4);
        let record = EvaluationRecord::new(
            vec![("Fluency & Coherence".to_string(), 6.0)],
            vec![("Fluency & Coherence".to_string(), long_text.trim().to_string())],
        );
        let layout = ReportLayout::from_evaluation(&record);
        let feedback: Vec<&Line> = layout.lines().iter().skip(6).collect();

        assert!(feedback.len() > 1);
        assert!(feedback.iter().all(|l| l.text.chars().count() <= WRAP_COLUMNS));
        let rejoined = feedback
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, format!("Fluency & Coherence: {}", long_text.trim()));
    }

    #[test]
    fn test_wrap_splits_overlong_words() {
        let lines = wrap(&"x".repeat(25), 10);
        assert_eq!(lines, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
        assert_eq!(wrap("", 10), vec![String::new()]);
        assert_eq!(wrap("a bb ccc", 4), vec!["a bb", "ccc"]);
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Score: 7").unwrap(), b"Score: 7".to_vec());
        assert_eq!(
            encode_win_ansi("caf\u{e9}").unwrap(),
            vec![b'c', b'a', b'f', 0xe9]
        );
        assert_eq!(
            encode_win_ansi("don\u{2019}t").unwrap(),
            vec![b'd', b'o', b'n', 0x92, b't']
        );
        let err = encode_win_ansi("ni \u{4f60}").unwrap_err();
        assert_eq!(err.character, '\u{4f60}');
        assert_eq!(err.text, "ni \u{4f60}");
    }

    #[test]
    fn test_render_report_rejects_phonetic_symbols() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IELTS_Report.pdf");
        let record = EvaluationRecord::new(
            vec![("Pronunciation".to_string(), 6.0)],
            vec![(
                "Pronunciation".to_string(),
                "Work on the /\u{3b8}/ and /\u{283}/ sounds, e.g. 'think' (not 'sink').".to_string(),
            )],
        );

        let err = render_report(&record, &path).unwrap_err();

        assert!(matches!(err, ReportError::Encode { .. }));
        assert_eq!(err.path(), path.as_path());
        assert!(err.to_string().contains('\u{3b8}'));
        assert!(!path.exists());
    }

    #[test]
    fn test_render_report_keeps_parentheses_and_latin1_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IELTS_Report.pdf");
        let record = EvaluationRecord::new(
            vec![("Pronunciation".to_string(), 6.0)],
            vec![(
                "Pronunciation".to_string(),
                "Say 'think' (not 'sink') \u{2013} na\u{ef}ve caf\u{e9}.".to_string(),
            )],
        );

        render_report(&record, &path).unwrap();

        let doc = Document::load(&path).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Say 'think' (not 'sink')"));
    }

    #[test]
    fn test_long_report_spans_several_pages() {
        let recommendations = (0..80)
            .map(|i| (format!("Note {}", i), "Keep practising.".to_string()))
            .collect();
        let record = EvaluationRecord::new(vec![], recommendations);
        let layout = ReportLayout::from_evaluation(&record);
        let pages = layout.pages();

        assert!(pages.len() > 1);
        assert_eq!(
            pages.iter().map(|p| p.len()).sum::<usize>(),
            layout.lines().len()
        );
    }

    #[test]
    fn test_render_report_writes_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("IELTS_Report.pdf");

        let written = render_report(&EvaluationRecord::sample(), &path).unwrap();
        assert_eq!(written, path);

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, REPORT_TITLE));
        assert!(contains(&bytes, "Fluency & Coherence: 8"));
        assert!(contains(
            &bytes,
            "Lexical Resource: Expand your vocabulary by learning synonyms and idioms."
        ));

        let reloaded = Document::load(&path).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn test_render_report_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IELTS_Report.pdf");
        fs::write(&path, b"stale").unwrap();

        render_report(&EvaluationRecord::sample(), &path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_report_reports_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_directory");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("IELTS_Report.pdf");

        let err = render_report(&EvaluationRecord::sample(), &path).unwrap_err();
        assert!(matches!(err, ReportError::CreateDir { .. }));
        assert_eq!(err.path(), path.as_path());
        assert!(err.to_string().contains("IELTS_Report.pdf"));
    }

    #[tokio::test]
    async fn test_render_report_in_background() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Sample_IELTS_Report.pdf");

        let written = render_report_in_background(EvaluationRecord::sample(), path.clone())
            .await
            .unwrap();
        assert_eq!(written, path);
        assert!(path.exists());
    }

    #[test]
    fn test_report_config_paths() {
        let config = ReportConfig::default();
        assert_eq!(config.report_path(), PathBuf::from("reports/IELTS_Report.pdf"));
        assert_eq!(
            config.sample_path(),
            PathBuf::from("reports/Sample_IELTS_Report.pdf")
        );
        assert_eq!(
            ReportConfig::new("/tmp/out").report_path(),
            PathBuf::from("/tmp/out/IELTS_Report.pdf")
        );
    }
}
