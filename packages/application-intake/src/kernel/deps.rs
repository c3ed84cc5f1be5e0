use std::sync::Arc;

use secret_cache::{Clock, SecretCache};

use super::{BaseCaseClient, BaseCaseDocumentStore, BaseEventPublisher, BaseNotifier, IdSource};
use crate::store::EntityStore;

/// Everything the engine talks to, behind trait objects so hosts and tests
/// can swap implementations.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn EntityStore>,
    pub case_client: Arc<dyn BaseCaseClient>,
    pub case_documents: Arc<dyn BaseCaseDocumentStore>,
    pub publisher: Arc<dyn BaseEventPublisher>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub secrets: Arc<SecretCache>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdSource>,
}
