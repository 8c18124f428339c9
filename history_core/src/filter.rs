//! Event filters and the per-kind indexing capabilities they rely on.
//!
//! The two pool events expose the account differently. `Withdraw` carries the
//! account in an indexed topic, so the log source can narrow the query for us.
//! `Supply` is queried without any account constraint and the beneficiary is
//! compared locally on every returned log. The choice is fixed per kind in
//! [`EventKind::account_match`]; changing it changes which logs a chunk returns,
//! not just how fast.

use crate::{Address, EventKind, RawEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address-valued fields of the pool events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventField {
    Reserve,
    User,
    OnBehalfOf,
    To,
}

/// Where the account constraint of a kind is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMatch {
    /// Sent to the log source as a topic constraint
    Native,
    /// Superset retrieved, compared after each chunk arrives
    ClientSide,
}

impl EventKind {
    /// Field holding the account whose history is being built
    pub fn account_field(&self) -> EventField {
        match self {
            EventKind::Inbound => EventField::OnBehalfOf,
            EventKind::Outbound => EventField::User,
        }
    }

    /// Supply: client-side. Withdraw: native.
    pub fn account_match(&self) -> AccountMatch {
        match self {
            EventKind::Inbound => AccountMatch::ClientSide,
            EventKind::Outbound => AccountMatch::Native,
        }
    }

    /// Topic slot (1-3) of an indexed field, `None` for data fields
    pub fn topic_position(&self, field: EventField) -> Option<usize> {
        match (self, field) {
            (EventKind::Inbound, EventField::Reserve) => Some(1),
            (EventKind::Inbound, EventField::OnBehalfOf) => Some(2),
            (EventKind::Inbound, EventField::User) => None,
            (EventKind::Inbound, EventField::To) => None,
            (EventKind::Outbound, EventField::Reserve) => Some(1),
            (EventKind::Outbound, EventField::User) => Some(2),
            (EventKind::Outbound, EventField::To) => Some(3),
            (EventKind::Outbound, EventField::OnBehalfOf) => None,
        }
    }

    /// Counterparty field carried in [`RawEvent::counterparty`]
    pub fn counterparty_field(&self) -> EventField {
        match self {
            EventKind::Inbound => EventField::User,
            EventKind::Outbound => EventField::To,
        }
    }
}

impl RawEvent {
    /// Value of `field` for this event, if the event kind has it
    pub fn field(&self, field: EventField) -> Option<Address> {
        if field == EventField::Reserve {
            Some(self.asset)
        } else if field == self.kind.account_field() {
            Some(self.account)
        } else if field == self.kind.counterparty_field() {
            self.counterparty
        } else {
            None
        }
    }
}

/// What to look for in one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    kind: EventKind,
    account: Option<Address>,
    constraints: BTreeMap<EventField, Address>,
}

impl EventFilter {
    /// All events of `kind`, no constraints
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            account: None,
            constraints: BTreeMap::new(),
        }
    }

    /// Events of `kind` belonging to `account`
    pub fn for_account(kind: EventKind, account: Address) -> Self {
        Self::new(kind).with_constraint(kind.account_field(), account)
    }

    pub fn with_constraint(mut self, field: EventField, value: Address) -> Self {
        if field == self.kind.account_field() {
            self.account = Some(value);
        }
        self.constraints.insert(field, value);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn constraints(&self) -> &BTreeMap<EventField, Address> {
        &self.constraints
    }

    fn is_native(&self, field: EventField) -> bool {
        if field == self.kind.account_field() {
            return self.kind.account_match() == AccountMatch::Native;
        }
        self.kind.topic_position(field).is_some()
    }

    /// Constraints handed to the log source
    pub fn native_constraints(&self) -> BTreeMap<EventField, Address> {
        self.constraints
            .iter()
            .filter(|(field, _)| self.is_native(**field))
            .map(|(field, value)| (*field, *value))
            .collect()
    }

    /// True when some constraint must be re-applied after each query
    pub fn needs_post_filter(&self) -> bool {
        self.constraints.keys().any(|field| !self.is_native(*field))
    }

    /// Client-side predicate: every non-native constraint holds for `event`
    pub fn matches_client_side(&self, event: &RawEvent) -> bool {
        event.kind == self.kind
            && self
                .constraints
                .iter()
                .filter(|(field, _)| !self.is_native(**field))
                .all(|(field, value)| event.field(*field) == Some(*value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn supply(account: Address) -> RawEvent {
        RawEvent {
            kind: EventKind::Inbound,
            block_number: 1,
            transaction_index: 0,
            log_index: 0,
            transaction_hash: None,
            asset: addr(0xaa),
            account,
            counterparty: Some(addr(0xbb)),
            amount: BigUint::from(1u8),
        }
    }

    #[test]
    fn test_inbound_account_is_filtered_locally() {
        let filter = EventFilter::for_account(EventKind::Inbound, addr(1));

        assert!(filter.native_constraints().is_empty());
        assert!(filter.needs_post_filter());
        assert!(filter.matches_client_side(&supply(addr(1))));
        assert!(!filter.matches_client_side(&supply(addr(2))));
    }

    #[test]
    fn test_outbound_account_is_native() {
        let filter = EventFilter::for_account(EventKind::Outbound, addr(1));
        let native = filter.native_constraints();

        assert_eq!(native.get(&EventField::User), Some(&addr(1)));
        assert!(!filter.needs_post_filter());
        assert_eq!(filter.account(), Some(addr(1)));
    }

    #[test]
    fn test_non_indexed_extra_constraint_goes_client_side() {
        // Supply.user lives in the data section
        let filter = EventFilter::new(EventKind::Inbound)
            .with_constraint(EventField::Reserve, addr(0xaa))
            .with_constraint(EventField::User, addr(0xbb));

        assert_eq!(filter.native_constraints().len(), 1);
        assert!(filter.needs_post_filter());
        assert!(filter.matches_client_side(&supply(addr(9))));

        let other = EventFilter::new(EventKind::Inbound).with_constraint(EventField::User, addr(0xcc));
        assert!(!other.matches_client_side(&supply(addr(9))));
    }

    #[test]
    fn test_kind_mismatch_never_matches() {
        let filter = EventFilter::new(EventKind::Outbound);
        assert!(!filter.matches_client_side(&supply(addr(1))));
    }

    #[test]
    fn test_event_field_lookup() {
        let event = supply(addr(1));
        assert_eq!(event.field(EventField::Reserve), Some(addr(0xaa)));
        assert_eq!(event.field(EventField::OnBehalfOf), Some(addr(1)));
        assert_eq!(event.field(EventField::User), Some(addr(0xbb)));
        assert_eq!(event.field(EventField::To), None);
    }
}
