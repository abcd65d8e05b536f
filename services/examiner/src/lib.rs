//! Examiner Service Library Crate
//!
//! Everything the `examiner` binary needs besides the core session logic:
//! environment configuration, prompt loading and the console voice channel.
//! The binary itself is a thin wrapper around this library.

pub mod config;
pub mod console;
pub mod prompts;
