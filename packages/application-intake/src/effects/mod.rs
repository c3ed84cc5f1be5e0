//! Side-Effect Orchestrator.
//!
//! Guards return [`SideEffect`]s; the orchestrator runs them in order against
//! the collaborators, stops at the first failure, and performs the final write
//! last. Every call is bounded by the invocation context and every failure is
//! wrapped with the step it belongs to.

use std::fmt;
use std::future::Future;

use serde_json::json;
use tracing::debug;

use crate::context::InvocationContext;
use crate::domain::{
    ApplicationRecord, ApplicationType, CaseDocument, ExternalUid, FollowUpAction, Person,
    RecipientContext, Template,
};
use crate::engine::EngineSettings;
use crate::error::{EngineError, Result};
use crate::events::EventKind;
use crate::kernel::{CaseValidationError, EngineDeps};
use crate::store::{Item, RecordKey, StoreError, Transaction};
use secret_cache::SecretString;

/// Published once the certificate provider's part of the workflow can begin.
pub const CERTIFICATE_PROVIDER_STARTED: &str = "certificate-provider-started";

/// A unit of work that can fail on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    LoadRecord,
    FetchCaseDocument,
    LoadCredential,
    CreateCase,
    SendToCaseStore,
    PublishCertificateProviderStarted,
    InviteCertificateProvider,
    PromptCertificateProvider,
    SendVoucherAccessCode,
    InviteAttorneys,
    RemindCertificateProvider,
    InformDonor,
    DeleteFollowUps,
    Persist,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::LoadRecord => "load record",
            Step::FetchCaseDocument => "fetch case document",
            Step::LoadCredential => "load credential",
            Step::CreateCase => "create case",
            Step::SendToCaseStore => "send to case store",
            Step::PublishCertificateProviderStarted => "publish certificate-provider-started",
            Step::InviteCertificateProvider => "invite certificate provider",
            Step::PromptCertificateProvider => "prompt certificate provider",
            Step::SendVoucherAccessCode => "send voucher access code",
            Step::InviteAttorneys => "invite attorneys",
            Step::RemindCertificateProvider => "remind certificate provider",
            Step::InformDonor => "inform donor",
            Step::DeleteFollowUps => "delete follow-ups",
            Step::Persist => "persist",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An externally visible action decided by a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// File the (updated) record with the case document store.
    SendToCaseStore,
    PublishCertificateProviderStarted,
    Notify {
        step: Step,
        template: Template,
        recipient: RecipientContext,
    },
    /// Cancel scheduled follow-ups for the record's UID: those with one of
    /// `actions`, or all of them when empty.
    DeleteFollowUps { actions: Vec<FollowUpAction> },
}

impl SideEffect {
    pub fn step(&self) -> Step {
        match self {
            SideEffect::SendToCaseStore => Step::SendToCaseStore,
            SideEffect::PublishCertificateProviderStarted => Step::PublishCertificateProviderStarted,
            SideEffect::Notify { step, .. } => *step,
            SideEffect::DeleteFollowUps { .. } => Step::DeleteFollowUps,
        }
    }
}

/// Runs one event's reads, side effects and final write.
pub struct Orchestrator<'a> {
    deps: &'a EngineDeps,
    settings: &'a EngineSettings,
    ctx: &'a InvocationContext,
    kind: EventKind,
    uid: Option<ExternalUid>,
    performed: Vec<Step>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        deps: &'a EngineDeps,
        settings: &'a EngineSettings,
        ctx: &'a InvocationContext,
        kind: EventKind,
        uid: Option<ExternalUid>,
    ) -> Self {
        Self {
            deps,
            settings,
            ctx,
            kind,
            uid,
            performed: Vec::new(),
        }
    }

    /// Steps that completed so far.
    pub fn performed(&self) -> &[Step] {
        &self.performed
    }

    pub fn into_performed(self) -> Vec<Step> {
        self.performed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn resolve_uid(&self, uid: &ExternalUid) -> Result<Option<RecordKey>> {
        self.read(self.deps.store.get_by_external_uid(uid)).await
    }

    /// Resolve through the UID index, then read the primary record.
    pub async fn load_by_uid(&self, uid: &ExternalUid) -> Result<ApplicationRecord> {
        let key = self
            .resolve_uid(uid)
            .await?
            .ok_or_else(|| self.missing(format!("uid {}", uid)))?;
        self.load_by_key(&key).await
    }

    pub async fn load_by_key(&self, key: &RecordKey) -> Result<ApplicationRecord> {
        self.read(self.deps.store.get_application(key))
            .await?
            .ok_or_else(|| self.missing(format!("key {}", key)))
    }

    pub async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>> {
        self.read(self.deps.store.get_by_key(key)).await
    }

    pub async fn fetch_case_document(&self, uid: &ExternalUid) -> Result<CaseDocument> {
        let credential = self.credential(&self.settings.case_store_secret).await?;
        self.call(
            Step::FetchCaseDocument,
            self.deps.case_documents.fetch(&credential, uid),
        )
        .await
    }

    // =========================================================================
    // Side effects
    // =========================================================================

    pub async fn create_case(
        &mut self,
        application_type: ApplicationType,
        donor: &Person,
    ) -> Result<ExternalUid> {
        let uid = self
            .call(
                Step::CreateCase,
                self.deps.case_client.create_case(application_type, donor),
            )
            .await?;
        self.performed.push(Step::CreateCase);
        self.uid = Some(uid.clone());
        Ok(uid)
    }

    /// Run `effects` in order; the first failure stops the rest.
    pub async fn perform(
        &mut self,
        effects: &[SideEffect],
        record: &ApplicationRecord,
    ) -> Result<()> {
        for effect in effects {
            self.perform_one(effect, record).await?;
            self.performed.push(effect.step());
            debug!(kind = %self.kind, step = %effect.step(), "side effect performed");
        }
        Ok(())
    }

    async fn perform_one(&self, effect: &SideEffect, record: &ApplicationRecord) -> Result<()> {
        match effect {
            SideEffect::SendToCaseStore => {
                let credential = self.credential(&self.settings.case_store_secret).await?;
                self.call(
                    Step::SendToCaseStore,
                    self.deps.case_documents.send(&credential, record),
                )
                .await
            }
            SideEffect::PublishCertificateProviderStarted => {
                let payload = json!({ "uid": self.uid });
                self.call(
                    Step::PublishCertificateProviderStarted,
                    self.deps.publisher.publish(CERTIFICATE_PROVIDER_STARTED, payload),
                )
                .await
            }
            SideEffect::Notify {
                step,
                template,
                recipient,
            } => {
                let credential = self.credential(&self.settings.notify_api_key_secret).await?;
                self.call(
                    *step,
                    self.deps.notifier.send(&credential, *template, recipient),
                )
                .await
            }
            SideEffect::DeleteFollowUps { actions } => {
                let Some(uid) = self.uid.as_ref() else {
                    return Ok(());
                };
                let removed = self
                    .bounded(Step::DeleteFollowUps, self.deps.store.delete_follow_ups(uid, actions))
                    .await?
                    .map_err(|source| self.downstream(Step::DeleteFollowUps, false, source.into()))?;
                debug!(kind = %self.kind, uid = %uid, removed, "follow-ups deleted");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Final writes
    // =========================================================================

    /// Write the record, conditionally when configured. `loaded_hash` is the
    /// hash the record carried when it was read.
    pub async fn persist(&mut self, record: ApplicationRecord, loaded_hash: &str) -> Result<()> {
        let store = &self.deps.store;
        if self.settings.conditional_writes {
            self.write(store.put_if_unchanged(record.into(), loaded_hash)).await
        } else {
            self.write(store.put(record.into())).await
        }
    }

    pub async fn put_item(&mut self, item: Item) -> Result<()> {
        self.write(self.deps.store.put(item)).await
    }

    pub async fn commit(&mut self, transaction: Transaction) -> Result<()> {
        self.write(self.deps.store.write_transaction(transaction)).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn credential(&self, name: &str) -> Result<SecretString> {
        self.bounded(Step::LoadCredential, self.deps.secrets.get(name))
            .await?
            .map_err(|err| self.downstream(Step::LoadCredential, false, Box::new(err)))
    }

    async fn call<T, F>(&self, step: Step, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.bounded(step, fut).await?.map_err(|err| {
            let terminal = err.is::<CaseValidationError>();
            self.downstream(step, terminal, err.into())
        })
    }

    async fn read<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        self.bounded(Step::LoadRecord, fut)
            .await?
            .map_err(|err| self.downstream(Step::LoadRecord, false, Box::new(err)))
    }

    async fn write<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), StoreError>>,
    {
        self.bounded(Step::Persist, fut)
            .await?
            .map_err(|source| EngineError::PersistenceFailure {
                kind: self.kind,
                uid: self.uid.clone(),
                performed: self.performed.clone(),
                source,
            })
    }

    async fn bounded<F: Future>(&self, step: Step, fut: F) -> Result<F::Output> {
        self.ctx
            .bounded(fut)
            .await
            .map_err(|reason| EngineError::Interrupted {
                kind: self.kind,
                uid: self.uid.clone(),
                step,
                reason,
                performed: self.performed.clone(),
            })
    }

    fn downstream(
        &self,
        step: Step,
        terminal: bool,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> EngineError {
        EngineError::DownstreamFailure {
            kind: self.kind,
            uid: self.uid.clone(),
            step,
            terminal,
            performed: self.performed.clone(),
            source,
        }
    }

    fn missing(&self, lookup: String) -> EngineError {
        EngineError::RecordMissing {
            kind: self.kind,
            lookup,
        }
    }
}
