//! vision-relay — image recognition core.
//!
//! Routes an image to an AI vision provider, negotiates the contract of
//! unknown self-hosted relays, optionally classifies the content first and
//! runs category-specific post-analysis on the recognized text.
//!
//! Modules:
//!   - llm/         — provider resolution, dialect adapters, negotiation,
//!                    classification, probing
//!   - analysis/    — post-analysis dispatcher + built-in analyzers
//!   - pipeline.rs  — `Recognizer`, the orchestration core
//!   - batch.rs     — sequential batch runs and provider comparison
//!   - history.rs   — history sink collaborator
//!   - config.rs    — provider settings, env/keychain loading, options
//!   - cli.rs       — command-line front end

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod pipeline;

pub use config::{ProviderConfig, RecognizerOptions};
pub use error::RecognitionError;
pub use pipeline::{Recognizer, RecognizerBuilder};
