use std::fmt;

/// Who produced a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Candidate,
    Examiner,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Candidate => write!(f, "Candidate"),
            Speaker::Examiner => write!(f, "Examiner"),
        }
    }
}

/// A single utterance in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// The ordered conversation of the current practice or test session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_candidate(&mut self, text: impl Into<String>) {
        self.push(Speaker::Candidate, text.into());
    }

    pub fn push_examiner(&mut self, text: impl Into<String>) {
        self.push(Speaker::Examiner, text.into());
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.turns.push(Turn { speaker, text });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns spoken by the candidate.
    pub fn candidate_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.speaker == Speaker::Candidate)
            .count()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Renders the transcript as `Speaker: text` lines, the form handed to the
    /// examiner when it is asked for an evaluation.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker, t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
