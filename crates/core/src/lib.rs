//! Core logic for the IELTS speaking examiner.
//!
//! The crate is split leaf-first: `evaluation` parses the model's scoring payload,
//! `report` renders it to a PDF, and `session` drives the command state machine
//! that ties the voice channel and the examiner together.

pub mod command;
pub mod evaluation;
pub mod examiner;
pub mod llm_client;
pub mod report;
pub mod session;
pub mod transcript;
pub mod voice;

pub use command::Command;
