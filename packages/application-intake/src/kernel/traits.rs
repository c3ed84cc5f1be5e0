// Infrastructure traits for the engine's collaborators.
//
// The engine only depends on these contracts. Concrete clients (HTTP, message
// bus, managed secrets) live with the host; `test_dependencies` and `dry_run`
// provide in-process implementations.

use anyhow::Result;
use async_trait::async_trait;
use secret_cache::SecretString;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    ApplicationRecord, ApplicationType, CaseDocument, ExternalUid, Person, RecipientContext,
    Template,
};

/// The case-management system refused the request. Retrying the same input
/// cannot succeed.
#[derive(Debug, Error)]
#[error("case rejected: {0}")]
pub struct CaseValidationError(pub String);

#[async_trait]
pub trait BaseCaseClient: Send + Sync {
    /// Open a case and return its external UID. Returns a
    /// [`CaseValidationError`] when the input is rejected.
    async fn create_case(
        &self,
        application_type: ApplicationType,
        donor: &Person,
    ) -> Result<ExternalUid>;
}

#[async_trait]
pub trait BaseCaseDocumentStore: Send + Sync {
    /// File the application with the case document store.
    async fn send(&self, credential: &SecretString, record: &ApplicationRecord) -> Result<()>;

    async fn fetch(&self, credential: &SecretString, uid: &ExternalUid) -> Result<CaseDocument>;
}

#[async_trait]
pub trait BaseEventPublisher: Send + Sync {
    async fn publish(&self, kind: &str, payload: Value) -> Result<()>;
}

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    async fn send(
        &self,
        credential: &SecretString,
        template: Template,
        recipient: &RecipientContext,
    ) -> Result<()>;
}

/// Generates identifiers for records the engine creates.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
