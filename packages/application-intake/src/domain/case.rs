//! Shapes shared with the external case systems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExternalUid;

/// How an actor takes part: through the online service or on paper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Online,
    Paper,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Cy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationType {
    PropertyAndAffairs,
    PersonalWelfare,
}

impl ApplicationType {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationType::PropertyAndAffairs => "property-and-affairs",
            ApplicationType::PersonalWelfare => "personal-welfare",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub first_names: String,
    pub last_name: String,
    pub email: Option<String>,
    pub contact_language: Language,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_name)
            .trim()
            .to_string()
    }
}

/// The filed application as held by the case document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDocument {
    pub uid: ExternalUid,
    pub application_type: ApplicationType,
    pub donor: Person,
    pub donor_channel: Channel,
    pub certificate_provider: Person,
    pub certificate_provider_channel: Channel,
    #[serde(default)]
    pub attorneys: Vec<Person>,
    pub signed_at: Option<DateTime<Utc>>,
}
