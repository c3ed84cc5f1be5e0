use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{ExternalUid, Language, Person};

/// Outbound notification templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    CertificateProviderInvite,
    CertificateProviderPrompt,
    VoucherAccessCode,
    AttorneyInvite,
    CertificateProviderReminder,
    DonorCertificateProviderNotActed,
    DonorIdentityCheckFailed,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Template::CertificateProviderInvite => "certificate-provider-invite",
            Template::CertificateProviderPrompt => "certificate-provider-prompt",
            Template::VoucherAccessCode => "voucher-access-code",
            Template::AttorneyInvite => "attorney-invite",
            Template::CertificateProviderReminder => "certificate-provider-reminder",
            Template::DonorCertificateProviderNotActed => "donor-certificate-provider-not-acted",
            Template::DonorIdentityCheckFailed => "donor-identity-check-failed",
        }
    }

    /// Where the recipient starts in the online service, if anywhere.
    pub fn start_path(self) -> Option<&'static str> {
        match self {
            Template::CertificateProviderInvite
            | Template::CertificateProviderPrompt
            | Template::CertificateProviderReminder => Some("/certificate-provider-start"),
            Template::VoucherAccessCode => Some("/voucher-start"),
            Template::AttorneyInvite => Some("/attorney-start"),
            Template::DonorCertificateProviderNotActed | Template::DonorIdentityCheckFailed => None,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a notification goes to and what it says about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientContext {
    pub uid: Option<ExternalUid>,
    pub name: String,
    pub email: Option<String>,
    pub language: Language,
    pub personalisation: BTreeMap<String, String>,
}

impl RecipientContext {
    pub fn to(person: &Person, uid: Option<&ExternalUid>) -> Self {
        Self {
            uid: uid.cloned(),
            name: person.full_name(),
            email: person.email.clone(),
            language: person.contact_language,
            personalisation: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.personalisation.insert(field.to_string(), value.into());
        self
    }

    /// Paper recipients get letters rather than emails.
    pub fn is_postal(&self) -> bool {
        self.email.is_none()
    }
}
