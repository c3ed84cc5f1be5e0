// TestDependencies - mock collaborators for engine tests
//
// Every mock writes into one shared CallLog so tests can assert the order of
// calls across collaborators, not just per mock.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secret_cache::{CacheSettings, Clock, SecretCache, SecretStore, SecretString};

use super::{
    BaseCaseClient, BaseCaseDocumentStore, BaseEventPublisher, BaseNotifier, CaseValidationError,
    EngineDeps, IdSource,
};
use crate::domain::{
    ApplicationRecord, ApplicationType, CaseDocument, ExternalUid, Person, RecipientContext,
    Template,
};
use crate::engine::{Engine, EngineSettings};
use crate::store::{MemoryStore, SecondaryIndexRecord};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Call log
// =============================================================================

/// One outbound collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateCase {
        application_type: ApplicationType,
        donor: String,
    },
    CaseStoreSend {
        uid: Option<ExternalUid>,
    },
    CaseStoreFetch {
        uid: ExternalUid,
    },
    Publish {
        kind: String,
        payload: Value,
    },
    Notify {
        template: Template,
        recipient: RecipientContext,
        credential: String,
    },
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Call::CreateCase { .. } => "case-client.create",
            Call::CaseStoreSend { .. } => "case-store.send",
            Call::CaseStoreFetch { .. } => "case-store.fetch",
            Call::Publish { .. } => "publisher.publish",
            Call::Notify { .. } => "notifier.send",
        }
    }
}

/// Ordered record of calls shared by every mock.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        lock(&self.0).push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.0).clone()
    }

    /// Call kinds in order, e.g. `["case-store.send", "notifier.send"]`.
    pub fn kinds(&self) -> Vec<&'static str> {
        lock(&self.0).iter().map(Call::kind).collect()
    }

    pub fn contains(&self, call: &Call) -> bool {
        lock(&self.0).contains(call)
    }

    /// Templates sent, in order.
    pub fn templates(&self) -> Vec<Template> {
        lock(&self.0)
            .iter()
            .filter_map(|call| match call {
                Call::Notify { template, .. } => Some(*template),
                _ => None,
            })
            .collect()
    }

    /// Calls that change something outside the engine. Fetches are reads.
    pub fn side_effects(&self) -> Vec<Call> {
        lock(&self.0)
            .iter()
            .filter(|call| !matches!(call, Call::CaseStoreFetch { .. }))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

// =============================================================================
// Mock Case Client
// =============================================================================

enum CaseResponse {
    Uid(ExternalUid),
    Rejected(String),
    Failed(String),
}

pub struct MockCaseClient {
    log: CallLog,
    responses: Mutex<Vec<CaseResponse>>,
    issued: AtomicUsize,
}

impl MockCaseClient {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            responses: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
        }
    }

    /// Queue the UID the next `create_case` returns.
    pub fn with_uid(&self, uid: &str) -> &Self {
        lock(&self.responses).push(CaseResponse::Uid(ExternalUid::new(uid)));
        self
    }

    /// Queue a validation rejection.
    pub fn rejecting(&self, reason: &str) -> &Self {
        lock(&self.responses).push(CaseResponse::Rejected(reason.to_string()));
        self
    }

    pub fn failing(&self, message: &str) -> &Self {
        lock(&self.responses).push(CaseResponse::Failed(message.to_string()));
        self
    }
}

#[async_trait]
impl BaseCaseClient for MockCaseClient {
    async fn create_case(
        &self,
        application_type: ApplicationType,
        donor: &Person,
    ) -> Result<ExternalUid> {
        self.log.record(Call::CreateCase {
            application_type,
            donor: donor.full_name(),
        });

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(ExternalUid::new(format!("M-9000-0000-{:04}", n)));
        }
        match responses.remove(0) {
            CaseResponse::Uid(uid) => Ok(uid),
            CaseResponse::Rejected(reason) => Err(CaseValidationError(reason).into()),
            CaseResponse::Failed(message) => Err(anyhow!(message)),
        }
    }
}

// =============================================================================
// Mock Case Document Store
// =============================================================================

pub struct MockCaseDocumentStore {
    log: CallLog,
    documents: Mutex<HashMap<ExternalUid, CaseDocument>>,
    send_failure: Mutex<Option<String>>,
}

impl MockCaseDocumentStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            documents: Mutex::new(HashMap::new()),
            send_failure: Mutex::new(None),
        }
    }

    pub fn with_document(&self, document: CaseDocument) -> &Self {
        lock(&self.documents).insert(document.uid.clone(), document);
        self
    }

    /// Make every `send` fail with `message`.
    pub fn fail_sends(&self, message: &str) {
        *lock(&self.send_failure) = Some(message.to_string());
    }
}

#[async_trait]
impl BaseCaseDocumentStore for MockCaseDocumentStore {
    async fn send(&self, _credential: &SecretString, record: &ApplicationRecord) -> Result<()> {
        self.log.record(Call::CaseStoreSend {
            uid: record.external_uid.clone(),
        });
        match lock(&self.send_failure).as_ref() {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    async fn fetch(&self, _credential: &SecretString, uid: &ExternalUid) -> Result<CaseDocument> {
        self.log.record(Call::CaseStoreFetch { uid: uid.clone() });
        lock(&self.documents)
            .get(uid)
            .cloned()
            .ok_or_else(|| anyhow!("no case document for {}", uid))
    }
}

// =============================================================================
// Mock Publisher
// =============================================================================

pub struct MockPublisher {
    log: CallLog,
    failure: Mutex<Option<String>>,
}

impl MockPublisher {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failure: Mutex::new(None),
        }
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }
}

#[async_trait]
impl BaseEventPublisher for MockPublisher {
    async fn publish(&self, kind: &str, payload: Value) -> Result<()> {
        self.log.record(Call::Publish {
            kind: kind.to_string(),
            payload,
        });
        match lock(&self.failure).as_ref() {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

pub struct MockNotifier {
    log: CallLog,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockNotifier {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failure: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }

    /// Make every send take `delay` before answering.
    pub fn respond_after(&self, delay: std::time::Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn recover(&self) {
        *lock(&self.failure) = None;
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send(
        &self,
        credential: &SecretString,
        template: Template,
        recipient: &RecipientContext,
    ) -> Result<()> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.log.record(Call::Notify {
            template,
            recipient: recipient.clone(),
            credential: credential.expose().to_string(),
        });
        match lock(&self.failure).as_ref() {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Mock Secret Store, Clock, Ids
// =============================================================================

/// Secret store with fixed values; names it does not know fail.
pub struct MockSecretStore {
    values: Mutex<HashMap<String, String>>,
    fetches: AtomicUsize,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_secret(self, name: &str, value: &str) -> Self {
        lock(&self.values).insert(name.to_string(), value.to_string());
        self
    }

    pub fn remove(&self, name: &str) {
        lock(&self.values).remove(name);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn fetch(&self, name: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.values)
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("secret {} not found", name))
    }
}

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.0);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Ids `app-1`, `app-2`, ... in call order.
#[derive(Default)]
pub struct SequentialIds(AtomicUsize);

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        format!("app-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub const NOTIFY_SECRET: &str = "notify-api-key";
pub const CASE_STORE_SECRET: &str = "case-store-jwt";
pub const NOTIFY_CREDENTIAL: &str = "notify-key-1";

/// Every collaborator mocked, over a [`MemoryStore`].
pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub calls: CallLog,
    pub case_client: Arc<MockCaseClient>,
    pub case_documents: Arc<MockCaseDocumentStore>,
    pub publisher: Arc<MockPublisher>,
    pub notifier: Arc<MockNotifier>,
    pub secret_store: Arc<MockSecretStore>,
    pub secrets: Arc<SecretCache>,
    pub clock: Arc<FixedClock>,
    pub ids: Arc<SequentialIds>,
    pub settings: EngineSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        let calls = CallLog::new();
        let clock = Arc::new(FixedClock::new(Self::now()));
        let secret_store = Arc::new(
            MockSecretStore::new()
                .with_secret(NOTIFY_SECRET, NOTIFY_CREDENTIAL)
                .with_secret(CASE_STORE_SECRET, "case-store-signing-key"),
        );
        let secrets = Arc::new(SecretCache::new(
            secret_store.clone(),
            clock.clone(),
            CacheSettings::default(),
        ));

        Self {
            store: Arc::new(MemoryStore::new()),
            case_client: Arc::new(MockCaseClient::new(calls.clone())),
            case_documents: Arc::new(MockCaseDocumentStore::new(calls.clone())),
            publisher: Arc::new(MockPublisher::new(calls.clone())),
            notifier: Arc::new(MockNotifier::new(calls.clone())),
            calls,
            secret_store,
            secrets,
            clock,
            ids: Arc::new(SequentialIds::default()),
            settings: EngineSettings {
                deadline: std::time::Duration::from_secs(5),
                app_public_url: "https://apply.example.gov".to_string(),
                notify_api_key_secret: NOTIFY_SECRET.to_string(),
                case_store_secret: CASE_STORE_SECRET.to_string(),
                conditional_writes: false,
            },
        }
    }

    /// The instant the clock starts at: 2024-05-20 14:00 UTC.
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 14, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn deps(&self) -> EngineDeps {
        EngineDeps {
            store: self.store.clone(),
            case_client: self.case_client.clone(),
            case_documents: self.case_documents.clone(),
            publisher: self.publisher.clone(),
            notifier: self.notifier.clone(),
            secrets: self.secrets.clone(),
            clock: self.clock.clone(),
            ids: self.ids.clone(),
        }
    }

    /// # Panics
    ///
    /// If the standard route table is inconsistent.
    pub fn engine(&self) -> Engine {
        match Engine::new(self.deps(), self.settings.clone()) {
            Ok(engine) => engine,
            Err(err) => panic!("standard registry rejected: {}", err),
        }
    }

    /// An online application with `uid`, not yet stored.
    pub fn application(&self, uid: &str) -> ApplicationRecord {
        let mut record = ApplicationRecord::new("app-seeded", "session-1", Self::now());
        record.external_uid = Some(ExternalUid::new(uid));
        record.application_type = Some(ApplicationType::PropertyAndAffairs);
        record.donor = person("Sam", "Smith");
        record.certificate_provider = person("Charlie", "Cooper");
        record.integrity_hash = record.compute_hash();
        record
    }

    /// Store `record` and, when it has a UID, its index entry.
    pub fn seed(&self, mut record: ApplicationRecord) {
        record.integrity_hash = record.compute_hash();
        if let Some(uid) = record.external_uid.clone() {
            self.store
                .seed(SecondaryIndexRecord::new(uid, record.key(), Self::now()));
        }
        self.store.seed(record);
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

/// A person with an email derived from their first name.
pub fn person(first: &str, last: &str) -> Person {
    Person {
        first_names: first.to_string(),
        last_name: last.to_string(),
        email: Some(format!("{}@example.com", first.to_lowercase())),
        ..Person::default()
    }
}
