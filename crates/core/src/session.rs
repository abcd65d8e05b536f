//! Session Controller
//!
//! This module implements the command-driven state machine for one examining
//! session. It owns the current mode, the transcript and the last accepted
//! evaluation, and it handles exactly one utterance at a time: listen, classify,
//! act, speak, then listen again.

use crate::{
    Command,
    evaluation::{EvaluationRecord, parse_evaluation},
    examiner::Examiner,
    report::{ReportConfig, render_report_in_background},
    transcript::Transcript,
    voice::VoiceChannel,
};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Span, debug, error, field, info, instrument, warn};

const GREETING: &str = "Welcome to the IELTS Speaking examiner! Say start practice for a practice session, or start test for a full speaking test.";
const PRACTICE_INTRO: &str = "Practice mode. I will give you feedback after each answer. Let's start: can you tell me a little about yourself?";
const TEST_INTRO: &str = "Let's begin the speaking test. It has three parts and takes about fifteen minutes. First, can you tell me your full name?";
const RESET_NOTICE: &str = "The session has been reset. Say start practice or start test when you are ready.";
const EVALUATION_FAILED: &str = "Sorry, I could not produce a valid evaluation. Please try saying end test again.";
const NO_EVALUATION: &str = "There is no evaluation yet, so there is nothing to put in a report. Say end test to finish a test first.";
const REPORT_FAILED: &str = "Sorry, I could not generate the report.";
const FAREWELL: &str = "Thank you for practising with me. Goodbye!";

/// The conversational mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No practice or test is running.
    #[default]
    Idle,
    /// Practice with feedback after every answer.
    Practice,
    /// A full three-part speaking test.
    Test,
    /// The candidate has left; nothing more is processed.
    Terminated,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Practice => write!(f, "practice"),
            Mode::Test => write!(f, "test"),
            Mode::Terminated => write!(f, "terminated"),
        }
    }
}

/// What handling a single utterance led to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The examiner answered the candidate.
    Replied,
    /// The session entered a new mode.
    ModeChanged(Mode),
    /// A new evaluation was accepted and stored.
    Evaluated,
    /// The examiner's payload could not be parsed; nothing was stored.
    EvaluationRejected,
    /// A report was requested before any evaluation existed.
    NoEvaluationAvailable,
    /// A report was written to the given path.
    ReportWritten(PathBuf),
    /// Writing a report failed. The cause has been logged.
    ReportFailed,
    /// The session is over.
    Terminated,
}

/// Mutable state of a session, owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub mode: Mode,
    /// Replaced by every accepted evaluation, never cleared.
    pub last_evaluation: Option<EvaluationRecord>,
    pub transcript: Transcript,
}

/// Drives a session between the candidate's voice channel and the examiner.
pub struct SessionController {
    examiner: Arc<dyn Examiner>,
    voice: Arc<dyn VoiceChannel>,
    reports: ReportConfig,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        examiner: Arc<dyn Examiner>,
        voice: Arc<dyn VoiceChannel>,
        reports: ReportConfig,
    ) -> Self {
        Self {
            examiner,
            voice,
            reports,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn last_evaluation(&self) -> Option<&EvaluationRecord> {
        self.state.last_evaluation.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.mode == Mode::Terminated
    }

    /// Speaks the opening greeting.
    pub async fn greet(&self) -> Result<()> {
        self.voice.speak(GREETING, true).await
    }

    /// Listens and handles utterances until the session is terminated.
    ///
    /// Each command runs to completion before the next utterance is read.
    /// Errors from the voice channel or the examiner end the loop.
    pub async fn run(&mut self) -> Result<()> {
        while !self.is_terminated() {
            let utterance = self.voice.listen().await?;
            let outcome = self.handle(&utterance).await?;
            debug!(?outcome, "Command handled");
        }
        info!("Session terminated.");
        Ok(())
    }

    /// Classifies and handles a single utterance.
    #[instrument(skip_all, fields(mode = %self.state.mode, command))]
    pub async fn handle(&mut self, utterance: &str) -> Result<Outcome> {
        if self.is_terminated() {
            warn!("Ignoring input received after the session ended.");
            return Ok(Outcome::Terminated);
        }

        let command = Command::classify(utterance);
        Span::current().record("command", field::debug(&command));

        match command {
            Command::Exit => self.terminate().await,
            Command::EndTest => self.end_test().await,
            Command::GenerateReport => self.generate_report().await,
            Command::SampleReport => {
                let path = self.reports.sample_path();
                self.write_report(EvaluationRecord::sample(), path).await
            }
            Command::StartTest => self.start(Mode::Test).await,
            Command::StartPractice => self.start(Mode::Practice).await,
            Command::Reset => self.reset().await,
            Command::Converse => self.converse(utterance).await,
        }
    }

    async fn terminate(&mut self) -> Result<Outcome> {
        self.state.mode = Mode::Terminated;
        info!("Candidate ended the session.");
        self.voice.speak(FAREWELL, false).await?;
        Ok(Outcome::Terminated)
    }

    async fn start(&mut self, mode: Mode) -> Result<Outcome> {
        let intro = match mode {
            Mode::Test => TEST_INTRO,
            _ => PRACTICE_INTRO,
        };
        info!(from = %self.state.mode, to = %mode, "Starting new session mode");
        self.state.mode = mode;
        self.state.transcript.clear();
        self.state.transcript.push_examiner(intro);
        self.voice.speak(intro, true).await?;
        Ok(Outcome::ModeChanged(mode))
    }

    async fn reset(&mut self) -> Result<Outcome> {
        self.state.mode = Mode::Idle;
        self.state.transcript.clear();
        self.voice.speak(RESET_NOTICE, true).await?;
        Ok(Outcome::ModeChanged(Mode::Idle))
    }

    async fn converse(&mut self, utterance: &str) -> Result<Outcome> {
        self.state.transcript.push_candidate(utterance);
        let reply = self
            .examiner
            .reply(self.state.mode, &self.state.transcript)
            .await
            .context("Examiner failed to reply")?;
        self.state.transcript.push_examiner(reply.clone());
        self.voice.speak(&reply, true).await?;
        Ok(Outcome::Replied)
    }

    async fn end_test(&mut self) -> Result<Outcome> {
        let raw = self
            .examiner
            .evaluate(&self.state.transcript)
            .await
            .context("Examiner failed to produce an evaluation")?;

        match parse_evaluation(&raw) {
            Ok(record) => {
                info!(criteria = record.scores().len(), "Evaluation accepted");
                let announcement = format!(
                    "Your test is complete. Your scores are: {}. Say generate PDF to save your report.",
                    record.summary()
                );
                self.state.last_evaluation = Some(record);
                self.state.mode = Mode::Idle;
                // The scored turns must not be scored again by a later end test.
                self.state.transcript.clear();
                self.voice.speak(&announcement, false).await?;
                Ok(Outcome::Evaluated)
            }
            Err(e) => {
                warn!(error = %e, "Rejected evaluation payload");
                self.voice.speak(EVALUATION_FAILED, false).await?;
                Ok(Outcome::EvaluationRejected)
            }
        }
    }

    async fn generate_report(&mut self) -> Result<Outcome> {
        let Some(record) = self.state.last_evaluation.clone() else {
            info!("Report requested before any evaluation was produced.");
            self.voice.speak(NO_EVALUATION, true).await?;
            return Ok(Outcome::NoEvaluationAvailable);
        };
        let path = self.reports.report_path();
        self.write_report(record, path).await
    }

    async fn write_report(&self, record: EvaluationRecord, path: PathBuf) -> Result<Outcome> {
        match render_report_in_background(record, path).await {
            Ok(path) => {
                self.voice
                    .speak(
                        &format!("Your report has been saved to {}.", path.display()),
                        true,
                    )
                    .await?;
                Ok(Outcome::ReportWritten(path))
            }
            Err(e) => {
                error!(path = %e.path().display(), error = %e, "Report generation failed");
                self.voice.speak(REPORT_FAILED, true).await?;
                Ok(Outcome::ReportFailed)
            }
        }
    }
}
