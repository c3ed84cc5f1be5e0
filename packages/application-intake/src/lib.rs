//! # Application Intake
//!
//! Applies inbound domain events (case management, payment approval, register,
//! internal schedulers) to long-lived application records, exactly once in
//! effect under at-least-once delivery.
//!
//! ```text
//! EventEnvelope
//!     │
//!     ▼
//! Registry ──(source, kind)──▶ InboundEvent
//!     │
//!     ▼
//! Engine loads record (UID index → primary key)
//!     │
//!     ▼
//! guards::* (pure) ── Skip ──▶ Outcome::Skipped
//!     │ Apply
//!     ▼
//! Orchestrator: side effects in order, then a single put / transaction
//! ```
//!
//! Guards decide, the orchestrator executes, and the final write is always the
//! last thing that happens.

pub mod config;
pub mod context;
pub mod domain;
pub mod effects;
pub mod engine;
pub mod error;
pub mod events;
pub mod guards;
pub mod kernel;
pub mod store;

pub use config::Config;
pub use context::{InvocationContext, Interruption};
pub use engine::{Engine, EngineSettings, Outcome};
pub use error::{EngineError, ErrorClass};
pub use events::{EventEnvelope, EventKind, Source};
