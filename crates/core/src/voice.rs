//! The voice channel seam.
//!
//! Audio capture, speech recognition and speech synthesis live behind this
//! trait. The session controller only ever sees text.

use anyhow::Result;
use async_trait::async_trait;

/// What `listen` returns once the input side has been closed.
pub const END_OF_INPUT: &str = "exit";

/// A bidirectional text channel to the candidate.
#[async_trait]
pub trait VoiceChannel: Send + Sync {
    /// Says `text` to the candidate. When `allow_interruptions` is false the
    /// transport should finish speaking before accepting new input.
    async fn speak(&self, text: &str, allow_interruptions: bool) -> Result<()>;

    /// Waits for the next utterance. Returns [`END_OF_INPUT`] once the input
    /// has been exhausted.
    async fn listen(&self) -> Result<String>;
}
