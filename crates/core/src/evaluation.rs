//! Evaluation records and the parser for the examiner's scoring payload.
//!
//! The examiner is asked to answer with a JSON object of the form
//!
//! ```json
//! {
//!   "scores": { "Fluency & Coherence": 7, "Lexical Resource": 6.5 },
//!   "recommendations": { "Fluency & Coherence": "Pause less between ideas." }
//! }
//! ```
//!
//! Both groups are required. Anything else is rejected as a whole; a record is
//! never built from half a payload.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

/// Highest band a criterion can be awarded.
pub const MAX_BAND: f64 = 9.0;

/// One axis of the IELTS speaking assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    FluencyCoherence,
    LexicalResource,
    GrammaticalRangeAccuracy,
    Pronunciation,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::FluencyCoherence,
        Criterion::LexicalResource,
        Criterion::GrammaticalRangeAccuracy,
        Criterion::Pronunciation,
    ];

    /// The name used as a key in payloads and printed in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::FluencyCoherence => "Fluency & Coherence",
            Criterion::LexicalResource => "Lexical Resource",
            Criterion::GrammaticalRangeAccuracy => "Grammatical Range & Accuracy",
            Criterion::Pronunciation => "Pronunciation",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Pronunciation is the only criterion an evaluation may leave out.
    pub fn is_required(&self) -> bool {
        !matches!(self, Criterion::Pronunciation)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The structured result of assessing a candidate.
///
/// Entries keep the order in which the examiner produced them. Recommendation
/// keys are not required to match score keys.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    scores: Vec<(String, f64)>,
    recommendations: Vec<(String, String)>,
}

impl EvaluationRecord {
    pub fn new(scores: Vec<(String, f64)>, recommendations: Vec<(String, String)>) -> Self {
        Self {
            scores,
            recommendations,
        }
    }

    /// The fixed record used for the sample report.
    pub fn sample() -> Self {
        let scores = [
            (Criterion::FluencyCoherence, 8.0),
            (Criterion::LexicalResource, 7.0),
            (Criterion::GrammaticalRangeAccuracy, 7.0),
            (Criterion::Pronunciation, 6.5),
        ];
        let recommendations = [
            (
                Criterion::FluencyCoherence,
                "Practice speaking continuously for fewer pauses.",
            ),
            (
                Criterion::LexicalResource,
                "Expand your vocabulary by learning synonyms and idioms.",
            ),
            (
                Criterion::GrammaticalRangeAccuracy,
                "Work on constructing complex sentences.",
            ),
            (
                Criterion::Pronunciation,
                "Focus on word stress and intonation patterns.",
            ),
        ];
        Self::new(
            scores
                .into_iter()
                .map(|(c, s)| (c.label().to_string(), s))
                .collect(),
            recommendations
                .into_iter()
                .map(|(c, r)| (c.label().to_string(), r.to_string()))
                .collect(),
        )
    }

    pub fn scores(&self) -> &[(String, f64)] {
        &self.scores
    }

    pub fn recommendations(&self) -> &[(String, String)] {
        &self.recommendations
    }

    pub fn score(&self, criterion: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, score)| *score)
    }

    pub fn recommendation(&self, criterion: &str) -> Option<&str> {
        self.recommendations
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, text)| text.as_str())
    }

    /// Required criteria that received no score.
    pub fn missing_criteria(&self) -> Vec<Criterion> {
        Criterion::ALL
            .into_iter()
            .filter(|c| c.is_required() && self.score(c.label()).is_none())
            .collect()
    }

    /// A one-sentence spoken summary, e.g. "Fluency & Coherence 7, Lexical Resource 6.5".
    pub fn summary(&self) -> String {
        self.scores
            .iter()
            .map(|(name, score)| format!("{} {}", name, score))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Why a payload could not be turned into an [`EvaluationRecord`].
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation payload is empty")]
    Empty,
    #[error("malformed evaluation payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(serde::Deserialize)]
struct RawEvaluation {
    scores: OrderedEntries<f64>,
    recommendations: OrderedEntries<String>,
}

/// A JSON object read as a list of entries in document order.
///
/// A repeated key keeps its first position and takes the last value, which is
/// what a map would do.
struct OrderedEntries<T>(Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedEntries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = OrderedEntries<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by criterion name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, T)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => entries.push((key, value)),
                    }
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Parses the examiner's raw payload into an [`EvaluationRecord`].
///
/// A surrounding Markdown code fence is tolerated since chat models like to add
/// one. Unknown criterion names and out-of-range scores are accepted but logged.
pub fn parse_evaluation(raw: &str) -> Result<EvaluationRecord, EvaluationError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(EvaluationError::Empty);
    }

    let parsed: RawEvaluation = serde_json::from_str(body)?;
    let record = EvaluationRecord::new(parsed.scores.0, parsed.recommendations.0);

    for (name, score) in record.scores() {
        if Criterion::from_label(name).is_none() {
            warn!(criterion = %name, "Evaluation contains an unrecognised criterion");
        }
        if !(0.0..=MAX_BAND).contains(score) {
            warn!(criterion = %name, score, "Score is outside the 0-9 band range");
        }
    }
    let missing = record.missing_criteria();
    if !missing.is_empty() {
        warn!(?missing, "Evaluation does not score every required criterion");
    }

    Ok(record)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL_PAYLOAD: &str = r#"{
        "scores": {
            "Fluency & Coherence": 7,
            "Lexical Resource": 6.5,
            "Grammatical Range & Accuracy": 7,
            "Pronunciation": 6
        },
        "recommendations": {
            "Fluency & Coherence": "Practice speaking continuously for fewer pauses.",
            "Lexical Resource": "Expand your vocabulary by learning synonyms and idioms.",
            "Grammatical Range & Accuracy": "Work on constructing complex sentences.",
            "Pronunciation": "Focus on word stress and intonation patterns."
        }
    }"#;

    #[test]
    fn test_parse_well_formed_payload() {
        let record = parse_evaluation(FULL_PAYLOAD).expect("payload should parse");

        let scores: HashMap<&str, f64> = record
            .scores()
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        let expected: HashMap<&str, f64> = HashMap::from([
            ("Fluency & Coherence", 7.0),
            ("Lexical Resource", 6.5),
            ("Grammatical Range & Accuracy", 7.0),
            ("Pronunciation", 6.0),
        ]);
        assert_eq!(scores, expected);
        assert_eq!(record.recommendations().len(), 4);
        assert_eq!(
            record.recommendation("Pronunciation"),
            Some("Focus on word stress and intonation patterns.")
        );
        assert!(record.missing_criteria().is_empty());
    }

    #[test]
    fn test_parse_keeps_document_order() {
        let record = parse_evaluation(
            r#"{"scores": {"Lexical Resource": 6, "Fluency & Coherence": 7},
                "recommendations": {}}"#,
        )
        .unwrap();
        let names: Vec<&str> = record.scores().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["Lexical Resource", "Fluency & Coherence"]);
    }

    #[test]
    fn test_parse_three_criteria_without_pronunciation() {
        let record = parse_evaluation(
            r#"{"scores": {"Fluency & Coherence": 5, "Lexical Resource": 5.5, "Grammatical Range & Accuracy": 6},
                "recommendations": {"Fluency & Coherence": "Use linking words."}}"#,
        )
        .unwrap();
        assert_eq!(record.scores().len(), 3);
        assert_eq!(record.score("Pronunciation"), None);
        assert!(record.missing_criteria().is_empty());
    }

    #[test]
    fn test_parse_accepts_asymmetric_keys() {
        let record = parse_evaluation(
            r#"{"scores": {"Fluency & Coherence": 7},
                "recommendations": {"Pronunciation": "Work on vowel length."}}"#,
        )
        .unwrap();
        assert_eq!(record.score("Fluency & Coherence"), Some(7.0));
        assert_eq!(record.score("Pronunciation"), None);
        assert_eq!(
            record.recommendation("Pronunciation"),
            Some("Work on vowel length.")
        );
        assert_eq!(
            record.missing_criteria(),
            vec![
                Criterion::LexicalResource,
                Criterion::GrammaticalRangeAccuracy
            ]
        );
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let fenced = format!("```json\n{}\n```", FULL_PAYLOAD);
        let record = parse_evaluation(&fenced).unwrap();
        assert_eq!(record.scores().len(), 4);

        let bare_fence = format!("```\n{}\n```", FULL_PAYLOAD);
        assert!(parse_evaluation(&bare_fence).is_ok());
    }

    #[test]
    fn test_parse_duplicate_key_takes_last_value() {
        let record = parse_evaluation(
            r#"{"scores": {"Lexical Resource": 5, "Pronunciation": 6, "Lexical Resource": 6.5},
                "recommendations": {}}"#,
        )
        .unwrap();
        assert_eq!(
            record.scores(),
            &[
                ("Lexical Resource".to_string(), 6.5),
                ("Pronunciation".to_string(), 6.0)
            ]
        );
    }

    #[test]
    fn test_parse_accepts_unknown_criterion_and_out_of_range_score() {
        let record = parse_evaluation(
            r#"{"scores": {"Coherence of Argument": 12}, "recommendations": {}}"#,
        )
        .unwrap();
        assert_eq!(record.score("Coherence of Argument"), Some(12.0));
    }

    #[test]
    fn test_parse_rejects_missing_groups() {
        let missing_scores = r#"{"recommendations": {"Fluency & Coherence": "Slow down."}}"#;
        assert!(matches!(
            parse_evaluation(missing_scores),
            Err(EvaluationError::Malformed(_))
        ));

        let missing_recommendations = r#"{"scores": {"Fluency & Coherence": 7}}"#;
        assert!(matches!(
            parse_evaluation(missing_recommendations),
            Err(EvaluationError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let string_score = r#"{"scores": {"Fluency & Coherence": "seven"}, "recommendations": {}}"#;
        assert!(parse_evaluation(string_score).is_err());

        let array_scores = r#"{"scores": [7, 6], "recommendations": {}}"#;
        assert!(parse_evaluation(array_scores).is_err());

        let numeric_recommendation =
            r#"{"scores": {"Fluency & Coherence": 7}, "recommendations": {"Fluency & Coherence": 3}}"#;
        assert!(parse_evaluation(numeric_recommendation).is_err());

        let null_scores = r#"{"scores": null, "recommendations": {}}"#;
        assert!(parse_evaluation(null_scores).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage_and_empty_input() {
        assert!(matches!(
            parse_evaluation("the candidate did well overall"),
            Err(EvaluationError::Malformed(_))
        ));
        assert!(matches!(parse_evaluation("   "), Err(EvaluationError::Empty)));
        assert!(matches!(parse_evaluation("```json\n```"), Err(EvaluationError::Empty)));
        assert!(parse_evaluation("{\"scores\": {").is_err());
    }

    #[test]
    fn test_criterion_labels_round_trip() {
        for criterion in Criterion::ALL {
            assert_eq!(Criterion::from_label(criterion.label()), Some(criterion));
        }
        assert_eq!(
            Criterion::from_label(" fluency & coherence "),
            Some(Criterion::FluencyCoherence)
        );
        assert_eq!(Criterion::from_label("Vocabulary"), None);
        assert!(!Criterion::Pronunciation.is_required());
    }

    #[test]
    fn test_sample_record_values() {
        let sample = EvaluationRecord::sample();
        assert_eq!(sample.score("Fluency & Coherence"), Some(8.0));
        assert_eq!(sample.scores().len(), 4);
        assert_eq!(sample.recommendations().len(), 4);
        assert_eq!(
            sample.summary(),
            "Fluency & Coherence 8, Lexical Resource 7, Grammatical Range & Accuracy 7, Pronunciation 6.5"
        );
    }
}
