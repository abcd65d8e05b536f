//! Classification of candidate utterances into session commands.

/// An action requested by a single utterance from the candidate.
///
/// The classifier only decides *what* was asked for; the session controller
/// decides what to do about it given its current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Leave the session. No further input is processed.
    Exit,
    /// Finish the current test and ask the examiner for an evaluation.
    EndTest,
    /// Render the last evaluation to the default report path.
    GenerateReport,
    /// Render the built-in sample evaluation to the sample report path.
    SampleReport,
    /// Begin a full three-part speaking test.
    StartTest,
    /// Begin a practice session with immediate feedback.
    StartPractice,
    /// Drop back to idle and forget the current transcript.
    Reset,
    /// Ordinary conversation for the examiner.
    Converse,
}

/// Command phrases in priority order. The first phrase found wins.
const VOCABULARY: &[(&[&str], Command)] = &[
    (&["exit"], Command::Exit),
    (&["quit"], Command::Exit),
    (&["end", "test"], Command::EndTest),
    (&["generate", "pdf"], Command::GenerateReport),
    (&["sample", "pdf"], Command::SampleReport),
    (&["start", "test"], Command::StartTest),
    (&["test", "mode"], Command::StartTest),
    (&["start", "practice"], Command::StartPractice),
    (&["practice", "mode"], Command::StartPractice),
    (&["reset", "session"], Command::Reset),
];

impl Command {
    /// Classifies an utterance by looking for a command phrase anywhere in it.
    ///
    /// Matching is case-insensitive and works on whole words, so "Please
    /// generate PDF." is a report request while "I'm quite tired" is not an exit.
    /// The cost is that inflected forms do not match either: "generate pdfs"
    /// is conversation.
    pub fn classify(utterance: &str) -> Self {
        let words = normalize(utterance);
        VOCABULARY
            .iter()
            .find(|(phrase, _)| contains_phrase(&words, phrase))
            .map(|(_, command)| *command)
            .unwrap_or(Command::Converse)
    }
}

fn normalize(utterance: &str) -> Vec<String> {
    utterance
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &[&str]) -> bool {
    words
        .windows(phrase.len())
        .any(|window| window.iter().zip(phrase).all(|(w, p)| w == p))
}
