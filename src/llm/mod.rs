//! LLM domain — everything that talks to a vision provider.
//!
//! External code should only need the items re-exported here.
//!
//! Dialects:
//!   - gemini.rs    — Google Gemini generateContent
//!   - openai.rs    — OpenAI chat completions (also OpenRouter, DeepSeek)
//!   - anthropic.rs — Anthropic messages
//!   - generic.rs   — bare `{prompt, image}` body, negotiation only
//!
//! Shared:
//!   - provider.rs  — provider tags, dialects, resolver rule table
//!   - dialect.rs   — adapter trait, registry, token budgets
//!   - envelope.rs  — response envelope parsing + degraded answers
//!   - negotiate.rs — candidate enumeration for self-hosted relays
//!   - session.rs   — request-scoped routing (pins the negotiated candidate)
//!   - classify.rs  — classification gate
//!   - probe.rs     — connection prober
//!   - transport.rs — HTTP seam (reqwest in production, doubles in tests)

pub mod anthropic;
pub mod auth;
pub mod classify;
pub mod dialect;
pub mod envelope;
pub mod gemini;
pub mod generic;
pub mod negotiate;
pub mod openai;
pub mod probe;
pub mod prompts;
pub mod provider;
pub mod session;
pub mod transport;
pub mod types;

pub use classify::{classify, ClassificationError};
pub use dialect::{AdapterRegistry, DialectAdapter, TokenBudget};
pub use envelope::{Completion, ParseFailure};
pub use negotiate::{candidate_order, BodyShape, DialectCandidate};
pub use probe::{ProbeOutcome, ProbePolicy};
pub use provider::{Dialect, ProviderTag, Resolution, ResolverRules};
pub use transport::{HttpTransport, RawRequest, RawResponse, Transport, TransportError};
pub use types::{Category, ClassificationResult, ImageInput, RecognitionRequest, RecognitionResult};
