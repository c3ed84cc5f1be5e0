//! Kernel module - collaborator contracts and dependency wiring.

pub mod deps;
pub mod dry_run;
pub mod test_dependencies;
pub mod traits;

pub use deps::EngineDeps;
pub use secret_cache::{Clock, SystemClock};
pub use traits::{
    BaseCaseClient, BaseCaseDocumentStore, BaseEventPublisher, BaseNotifier, CaseValidationError,
    IdSource, UuidIds,
};
