//! IP Change Detector
//!
//! Compares the requested addresses against the current record sets. Each
//! address family is decided on its own: a family that was not requested is
//! left alone, never cleared.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::traits::{RecordType, ZoneRecord};

/// Decision for one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyChange {
    /// Not requested; the record set is not read, cleared, or written
    Untouched,
    /// Requested and already equal to the current value set
    Unchanged(BTreeSet<IpAddr>),
    /// Requested and different (or absent); the set replaces the current one
    Replace(BTreeSet<IpAddr>),
}

impl FamilyChange {
    fn decide(current: Option<&ZoneRecord>, requested: Option<IpAddr>) -> Self {
        let Some(requested) = requested else {
            return FamilyChange::Untouched;
        };

        let desired: BTreeSet<IpAddr> = BTreeSet::from([requested]);
        match current {
            Some(record) if record.values == desired => FamilyChange::Unchanged(desired),
            _ => FamilyChange::Replace(desired),
        }
    }

    /// Whether this family needs a write
    pub fn is_replace(&self) -> bool {
        matches!(self, FamilyChange::Replace(_))
    }
}

/// Per-family decisions for one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// A record decision
    pub ipv4: FamilyChange,
    /// AAAA record decision
    pub ipv6: FamilyChange,
}

impl ChangeSet {
    /// True iff at least one family must be written
    pub fn changed(&self) -> bool {
        self.ipv4.is_replace() || self.ipv6.is_replace()
    }

    /// Record sets that must be written, A before AAAA
    pub fn pending(&self) -> impl Iterator<Item = (RecordType, &BTreeSet<IpAddr>)> {
        [(RecordType::A, &self.ipv4), (RecordType::Aaaa, &self.ipv6)]
            .into_iter()
            .filter_map(|(record_type, change)| match change {
                FamilyChange::Replace(values) => Some((record_type, values)),
                _ => None,
            })
    }
}

/// Decide what must change for a hostname
///
/// `current_a` / `current_aaaa` are the record sets as read from the store
/// (`None` when absent or not read). Set comparison ignores order and
/// duplicates.
pub fn detect(
    current_a: Option<&ZoneRecord>,
    current_aaaa: Option<&ZoneRecord>,
    requested_ipv4: Option<Ipv4Addr>,
    requested_ipv6: Option<Ipv6Addr>,
) -> ChangeSet {
    ChangeSet {
        ipv4: FamilyChange::decide(current_a, requested_ipv4.map(IpAddr::V4)),
        ipv6: FamilyChange::decide(current_aaaa, requested_ipv6.map(IpAddr::V6)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(record_type: RecordType, values: &[&str]) -> ZoneRecord {
        ZoneRecord::new(
            "example.com",
            "vpn",
            record_type,
            values.iter().map(|v| v.parse::<IpAddr>().unwrap()),
            60,
        )
    }

    #[test]
    fn test_absent_record_is_created() {
        let changes = detect(None, None, Some("203.0.113.5".parse().unwrap()), None);

        assert!(changes.changed());
        assert_eq!(changes.ipv6, FamilyChange::Untouched);
        let pending: Vec<_> = changes.pending().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, RecordType::A);
    }

    #[test]
    fn test_equal_record_is_unchanged() {
        let current = record(RecordType::A, &["203.0.113.5"]);
        let changes = detect(Some(&current), None, Some("203.0.113.5".parse().unwrap()), None);

        assert!(!changes.changed());
        assert_eq!(changes.pending().count(), 0);
    }

    #[test]
    fn test_extra_values_are_replaced() {
        let current = record(RecordType::A, &["203.0.113.5", "203.0.113.6"]);
        let changes = detect(Some(&current), None, Some("203.0.113.5".parse().unwrap()), None);

        assert!(changes.changed());
        let expected = BTreeSet::from(["203.0.113.5".parse::<IpAddr>().unwrap()]);
        assert_eq!(changes.ipv4, FamilyChange::Replace(expected));
    }

    #[test]
    fn test_unrequested_family_untouched() {
        let current_aaaa = record(RecordType::Aaaa, &["2001:db8::1"]);
        let changes = detect(
            None,
            Some(&current_aaaa),
            Some("203.0.113.5".parse().unwrap()),
            None,
        );

        assert_eq!(changes.ipv6, FamilyChange::Untouched);
        assert!(changes.pending().all(|(t, _)| t == RecordType::A));
    }

    #[test]
    fn test_dual_stack_partial_change() {
        let current_a = record(RecordType::A, &["203.0.113.5"]);
        let current_aaaa = record(RecordType::Aaaa, &["2001:db8::1"]);
        let changes = detect(
            Some(&current_a),
            Some(&current_aaaa),
            Some("203.0.113.5".parse().unwrap()),
            Some("2001:db8::2".parse().unwrap()),
        );

        assert!(changes.changed());
        assert!(!changes.ipv4.is_replace());
        assert!(changes.ipv6.is_replace());
    }
}
