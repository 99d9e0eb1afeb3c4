//! Intent-routing orchestration for Conflux.
//!
//! Sits in front of the pipeline engine and decides, per request, which
//! pipeline runs:
//!
//! ```text
//! request ──► IntentClassifier ──► Route table ──► Pipeline
//!                  │                                  │
//!                  └── below threshold: rejected      ▼
//!                                              ResultCache (TTL)
//! ```
//!
//! [`Orchestrator::handle`] is the external boundary; it never returns a
//! raw error, only `Error`-status [`conflux_types::ExecutionResult`]s.

pub mod cache;
pub mod error;
pub mod intent;
pub mod orchestrator;

pub use cache::ResultCache;
pub use error::{OrchestratorError, Result};
pub use intent::{classify_content, ContentKind, Intent, IntentClassifier};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
