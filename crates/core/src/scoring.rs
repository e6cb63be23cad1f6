//! Master selection.
//!
//! Every cluster member gets a [`RankKey`]. Keys compare lexicographically, in descending priority:
//!
//! 1. payment-processor link present
//! 2. active in the EMR
//! 3. group membership (only for policies that rank by group)
//! 4. data richness score
//! 5. older `created_at`
//! 6. earlier roster position
//!
//! A lower-priority signal can therefore never outweigh a higher one, and the final roster-position
//! tiebreak makes the order total: two distinct members never compare equal.

use crate::record::EnrichedRecord;
use crate::safety::SafetyPolicy;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Composite rank of one cluster member. Greater is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    pub payment_linked: bool,
    pub active: bool,
    pub grouped: bool,
    pub richness: u64,
    pub age: Reverse<DateTime<Utc>>,
    pub position: Reverse<usize>,
}

impl RankKey {
    /// Rank `member`, found at `position` within its cluster.
    pub fn new(member: &EnrichedRecord, position: usize, policy: SafetyPolicy) -> Self {
        let attrs = &member.enrichment;
        Self {
            payment_linked: attrs.payment_link_id.is_some(),
            active: attrs.is_active,
            grouped: policy.ranks_by_group() && attrs.has_group,
            richness: attrs.richness_score(),
            age: Reverse(member.record.created_at()),
            position: Reverse(position),
        }
    }
}

/// A cluster member with its rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedMember {
    pub member: EnrichedRecord,
    pub key: RankKey,
}

/// Sort members best-first. Index 0 is the master.
pub fn rank_members(members: &[EnrichedRecord], policy: SafetyPolicy) -> Vec<RankedMember> {
    let mut ranked: Vec<RankedMember> = members
        .iter()
        .enumerate()
        .map(|(position, member)| RankedMember {
            member: member.clone(),
            key: RankKey::new(member, position, policy),
        })
        .collect();
    ranked.sort_by(|a, b| b.key.cmp(&a.key));
    ranked
}
