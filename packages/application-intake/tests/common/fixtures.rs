use application_intake::domain::{
    ApplicationRecord, ApplicationType, CaseDocument, Channel, ExternalUid, FeeType, PaymentState,
    TaskState,
};
use application_intake::kernel::test_dependencies::{person, TestDependencies};
use application_intake::EventEnvelope;
use serde_json::{json, Value};

pub const UID: &str = "M-1111-2222-3333";

pub fn envelope(source: &str, kind: &str, detail: Value) -> EventEnvelope {
    EventEnvelope::new(source, kind, detail)
}

pub fn fee_approved(uid: &str, approved: &str) -> EventEnvelope {
    envelope(
        "payment-approval",
        "fee-approved",
        json!({ "uid": uid, "approvedType": approved }),
    )
}

pub fn uid_event(source: &str, kind: &str, uid: &str) -> EventEnvelope {
    envelope(source, kind, json!({ "uid": uid }))
}

pub fn status_changed(uid: &str, change_type: &str) -> EventEnvelope {
    envelope(
        "register",
        "application-status-changed",
        json!({ "uid": uid, "changeType": change_type }),
    )
}

/// A signed application whose donor asked for an exemption.
pub fn signed_exemption_request(deps: &TestDependencies, uid: &str) -> ApplicationRecord {
    let mut record = deps.application(uid);
    record.fee.fee_type = FeeType::NoFee;
    record.tasks.sign = TaskState::Completed;
    record.tasks.pay_for_application = PaymentState::Pending;
    record
}

pub fn case_document(uid: &str, donor_channel: Channel, cp_channel: Channel) -> CaseDocument {
    CaseDocument {
        uid: ExternalUid::new(uid),
        application_type: ApplicationType::PropertyAndAffairs,
        donor: person("Sam", "Smith"),
        donor_channel,
        certificate_provider: person("Charlie", "Cooper"),
        certificate_provider_channel: cp_channel,
        attorneys: vec![person("Alex", "Adams"), person("Jo", "Jones")],
        signed_at: Some(TestDependencies::now()),
    }
}
