use chrono::{DateTime, Utc};

use super::{Decision, SkipReason};
use crate::domain::{ApplicationRecord, ExternalUid};
use crate::store::{SecondaryIndexRecord, Transaction};

/// A case is opened only for records that do not have one yet.
pub fn case_identifier_requested(record: &ApplicationRecord) -> Decision<()> {
    if record.external_uid.is_some() {
        return Decision::Skip(SkipReason::AlreadyApplied("case identifier already assigned"));
    }
    Decision::Apply(())
}

/// Record the new UID on the application and index it, atomically.
pub fn assign_identifier(
    record: &ApplicationRecord,
    uid: ExternalUid,
    now: DateTime<Utc>,
) -> Transaction {
    let mut next = record.clone();
    next.external_uid = Some(uid.clone());
    next.touch(now);

    let index = SecondaryIndexRecord::new(uid, next.key(), now);
    Transaction::new().put(next).create(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::fixtures::{now, record};
    use crate::store::Item;

    #[test]
    fn assigned_identifier_is_indexed() {
        let mut record = record();
        record.external_uid = None;

        assert_eq!(case_identifier_requested(&record), Decision::Apply(()));

        let transaction = assign_identifier(&record, ExternalUid::new("M-9"), now());
        let Item::Application(updated) = &transaction.puts()[0] else {
            panic!("expected application put");
        };
        let Item::Index(index) = &transaction.creates()[0] else {
            panic!("expected index create");
        };

        assert_eq!(updated.external_uid, Some(ExternalUid::new("M-9")));
        assert_eq!(updated.version, record.version + 1);
        assert_eq!(index.target, record.key());
    }

    #[test]
    fn existing_identifier_is_kept() {
        assert!(matches!(
            case_identifier_requested(&record()),
            Decision::Skip(SkipReason::AlreadyApplied(_))
        ));
    }
}
