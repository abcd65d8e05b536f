//! Examiner Service
//!
//! The examiner is the conversational side of a session: it replies to the
//! candidate and, when a test ends, produces the raw scoring payload that the
//! evaluation parser turns into a record.

use crate::{
    llm_client::{LLMClient, ReplyFormat},
    session::Mode,
    transcript::{Speaker, Transcript},
};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Defines the contract for anything that can play the examiner.
///
/// This abstraction lets a session run against a live model or against the
/// offline [`SimulatedExaminer`] without the controller knowing which.
#[async_trait]
pub trait Examiner: Send + Sync {
    /// Produces the examiner's next line. The transcript already ends with the
    /// candidate's latest utterance.
    async fn reply(&self, mode: Mode, transcript: &Transcript) -> Result<String>;

    /// Produces the raw scoring payload for the conversation so far.
    async fn evaluate(&self, transcript: &Transcript) -> Result<String>;
}

fn mode_context(mode: Mode) -> &'static str {
    match mode {
        Mode::Idle => {
            "Idle. No session is running; invite the candidate to start practice or start a test."
        }
        Mode::Practice => {
            "Practice mode. Give short, immediate feedback on each answer, then ask the next question."
        }
        Mode::Test => {
            "Test mode. Run the full three-part test (Part 1 introduction, Part 2 long turn with a cue card, Part 3 two-way discussion). Do not give feedback until the test ends."
        }
        Mode::Terminated => "The session has ended.",
    }
}

/// An implementation of `Examiner` backed by an OpenAI-compatible chat model.
pub struct LLMExaminer {
    client: Arc<dyn LLMClient>,
    system_prompt: String,
    evaluation_prompt: String,
}

impl LLMExaminer {
    /// Creates a new LLM-backed examiner.
    ///
    /// # Arguments
    ///
    /// * `client` - The chat client used for every call.
    /// * `prompts` - Prompt templates keyed by name; `"system_prompt"` and
    ///   `"evaluate"` are required.
    pub fn new(client: Arc<dyn LLMClient>, prompts: &HashMap<String, String>) -> Result<Self> {
        let system_prompt = prompts
            .get("system_prompt")
            .context("Missing prompt template: 'system_prompt'")?
            .clone();
        let evaluation_prompt = prompts
            .get("evaluate")
            .context("Missing prompt template: 'evaluate'")?
            .clone();
        Ok(Self {
            client,
            system_prompt,
            evaluation_prompt,
        })
    }

    fn conversation_messages(
        &self,
        mode: Mode,
        transcript: &Transcript,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let system_prompt_with_mode = format!(
            "{}\n\n# Current Context for This Turn\n\n**Session mode:** {}",
            self.system_prompt,
            mode_context(mode)
        );

        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt_with_mode)
                .build()?
                .into(),
        ];
        for turn in transcript.turns() {
            match turn.speaker {
                Speaker::Candidate => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
                Speaker::Examiner => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
            };
        }
        Ok(messages)
    }
}

#[async_trait]
impl Examiner for LLMExaminer {
    async fn reply(&self, mode: Mode, transcript: &Transcript) -> Result<String> {
        let messages = self.conversation_messages(mode, transcript)?;
        self.client.complete(messages, ReplyFormat::Text).await
    }

    async fn evaluate(&self, transcript: &Transcript) -> Result<String> {
        info!(turns = transcript.len(), "Requesting evaluation from LLM");
        let conversation = if transcript.is_empty() {
            "(The candidate did not say anything.)".to_string()
        } else {
            transcript.render()
        };
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.evaluation_prompt.clone())
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Transcript:\n{}", conversation))
                .build()?
                .into(),
        ];
        self.client.complete(messages, ReplyFormat::Json).await
    }
}

/// The payload returned by [`SimulatedExaminer::evaluate`] unless overridden.
pub const SIMULATED_EVALUATION: &str = r#"{
  "scores": {
    "Fluency & Coherence": 7,
    "Lexical Resource": 6,
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

const TEST_QUESTIONS: &[&str] = &[
    "Part 1. Let's talk about where you live. Do you live in a house or a flat?",
    "What do you like most about your neighbourhood?",
    "Part 2. Describe a book you enjoyed reading. You should say what it was, when you read it, and why you enjoyed it. Please speak for one to two minutes.",
    "Thank you. Would you read that book again?",
    "Part 3. Do you think people read less than they used to? Why?",
    "How might reading habits change in the future?",
];

const PRACTICE_FEEDBACK: &[&str] = &[
    "Good answer. Try to add a reason and an example. Next question: what do you do in your free time?",
    "Nice range of vocabulary there. Watch your verb tenses. Next: tell me about a place you would like to visit.",
    "Well organised. Use linking words such as however and moreover. Next: how do you usually travel to work or school?",
];

/// An offline `Examiner` for development and tests.
///
/// Replies follow a fixed script and `evaluate` returns a fixed payload, so a
/// session can be exercised end to end without a model behind it.
pub struct SimulatedExaminer {
    evaluation: String,
}

impl SimulatedExaminer {
    pub fn new() -> Self {
        Self::with_evaluation(SIMULATED_EVALUATION)
    }

    /// Uses `payload` as the raw evaluation instead of the built-in one.
    pub fn with_evaluation(payload: impl Into<String>) -> Self {
        Self {
            evaluation: payload.into(),
        }
    }
}

impl Default for SimulatedExaminer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Examiner for SimulatedExaminer {
    async fn reply(&self, mode: Mode, transcript: &Transcript) -> Result<String> {
        // The transcript already holds the candidate's current answer.
        let answered = transcript.candidate_turns().saturating_sub(1);
        let line = match mode {
            Mode::Practice => PRACTICE_FEEDBACK[answered % PRACTICE_FEEDBACK.len()],
            Mode::Test => TEST_QUESTIONS[answered % TEST_QUESTIONS.len()],
            Mode::Idle | Mode::Terminated => {
                "Say start practice for a practice session, or start test for a full speaking test."
            }
        };
        Ok(line.to_string())
    }

    async fn evaluate(&self, _transcript: &Transcript) -> Result<String> {
        Ok(self.evaluation.clone())
    }
}
