// Dry-run collaborators for local replays.
//
// Nothing leaves the process: calls are logged, cases get locally minted UIDs,
// case documents come from whatever the replay seeded, and secrets are read
// from the environment.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::env;
use tracing::info;

use secret_cache::{SecretStore, SecretString};

use super::{BaseCaseClient, BaseCaseDocumentStore, BaseEventPublisher, BaseNotifier};
use crate::domain::{
    ApplicationRecord, ApplicationType, CaseDocument, ExternalUid, Person, RecipientContext,
    Template,
};

/// Mints `M-XXXX-XXXX-XXXX` style UIDs from random uuids.
#[derive(Debug, Default)]
pub struct LoggingCaseClient;

#[async_trait]
impl BaseCaseClient for LoggingCaseClient {
    async fn create_case(
        &self,
        application_type: ApplicationType,
        donor: &Person,
    ) -> Result<ExternalUid> {
        let digits: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(12)
            .collect::<String>()
            .to_uppercase();
        let uid = ExternalUid::new(format!(
            "M-{}-{}-{}",
            &digits[0..4],
            &digits[4..8],
            &digits[8..12]
        ));

        info!(
            application_type = application_type.as_str(),
            donor = %donor.full_name(),
            uid = %uid,
            "dry run: case created"
        );
        Ok(uid)
    }
}

/// Serves case documents loaded up front; filing is logged only.
#[derive(Debug, Default)]
pub struct LoggingCaseDocumentStore {
    documents: DashMap<ExternalUid, CaseDocument>,
}

impl LoggingCaseDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: CaseDocument) {
        self.documents.insert(document.uid.clone(), document);
    }
}

#[async_trait]
impl BaseCaseDocumentStore for LoggingCaseDocumentStore {
    async fn send(&self, _credential: &SecretString, record: &ApplicationRecord) -> Result<()> {
        info!(
            uid = record.external_uid.as_ref().map(ExternalUid::as_str).unwrap_or("-"),
            version = record.version,
            "dry run: application filed"
        );
        Ok(())
    }

    async fn fetch(&self, _credential: &SecretString, uid: &ExternalUid) -> Result<CaseDocument> {
        self.documents
            .get(uid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("no case document seeded for {}", uid))
    }
}

#[derive(Debug, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl BaseEventPublisher for LoggingPublisher {
    async fn publish(&self, kind: &str, payload: Value) -> Result<()> {
        info!(kind, %payload, "dry run: event published");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl BaseNotifier for LoggingNotifier {
    async fn send(
        &self,
        _credential: &SecretString,
        template: Template,
        recipient: &RecipientContext,
    ) -> Result<()> {
        info!(
            template = template.as_str(),
            recipient = %recipient.name,
            postal = recipient.is_postal(),
            "dry run: notification sent"
        );
        Ok(())
    }
}

/// Reads secret `name` from `SECRET_<NAME>`, with non-alphanumerics as `_`.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn variable_for(name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("SECRET_{}", suffix)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn fetch(&self, name: &str) -> Result<String> {
        let variable = Self::variable_for(name);
        env::var(&variable).map_err(|_| anyhow!("{} is not set", variable))
    }
}
