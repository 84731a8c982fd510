use crate::proposal::{Proposal, ProposalKey};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Lookback used for NEW when no persisted snapshot is available.
    pub new_window: Duration,
    /// Lookahead for EXPIRING.
    pub expiry_window: Duration,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            new_window: Duration::hours(24),
            expiry_window: Duration::hours(36),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub new_items: Vec<Proposal>,
    pub expiring_items: Vec<Proposal>,
}

/// Splits a batch into NEW and EXPIRING partitions. The two are independent,
/// so one proposal may land in both; both keep batch order.
pub fn classify(
    batch: &[Proposal],
    previously_seen: Option<&HashSet<ProposalKey>>,
    now: DateTime<Utc>,
    windows: &Windows,
) -> Classification {
    let mut classification = Classification::default();

    for proposal in batch {
        let is_new = match previously_seen {
            Some(seen) => !seen.contains(&proposal.key()),
            None => is_recent(proposal, now, windows.new_window),
        };
        if is_new {
            classification.new_items.push(proposal.clone());
        }
        if is_expiring(proposal, now, windows.expiry_window) {
            classification.expiring_items.push(proposal.clone());
        }
    }

    classification
}

pub fn is_recent(proposal: &Proposal, now: DateTime<Utc>, window: Duration) -> bool {
    proposal.date_added > now - window && proposal.date_added < now
}

/// Unknown expiry is never expiring.
pub fn is_expiring(proposal: &Proposal, now: DateTime<Utc>, window: Duration) -> bool {
    proposal
        .date_expiry
        .is_some_and(|expiry| expiry > now && expiry < now + window)
}
