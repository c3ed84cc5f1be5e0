//! Event Envelope & Router.

mod envelope;
mod kinds;
mod payloads;
mod registry;

pub use envelope::EventEnvelope;
pub use kinds::{Category, EventKind, Source};
pub use payloads::{
    ApplicationStatusChanged, CaseIdentifierRequested, DecodeError, FeeApproved, FollowUpDue,
    InboundEvent, PriorityCorrespondenceSent, StatusChange, UidEvent,
};
pub use registry::{Registry, RegistryError};
