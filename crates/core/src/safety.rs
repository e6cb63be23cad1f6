//! Safety gate deciding whether a retirement candidate may be deactivated.
//!
//! Rules are applied in a fixed order and the first match wins:
//!
//! 1. a payment-processor link is a hard veto (`skip-payment-linked`), whatever else is known
//! 2. an inactive record needs no action (`skip-already-inactive`)
//! 3. the group rule of the configured [`SafetyPolicy`] (`skip-group-conflict`)
//! 4. otherwise `retire`
//!
//! The master is never passed through the gate and is never retired.

use crate::error::DedupError;
use crate::record::EnrichedRecord;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named safety policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyPolicy {
    /// Payment veto and already-inactive only. Groups play no part.
    #[default]
    ActiveOnly,
    /// Additionally skips a candidate carrying a group assignment the master lacks.
    GroupAware,
    /// Additionally takes no action on a cluster in which any member carries a group assignment.
    StrictNoGroups,
}

impl SafetyPolicy {
    pub const ALL: [SafetyPolicy; 3] = [
        SafetyPolicy::ActiveOnly,
        SafetyPolicy::GroupAware,
        SafetyPolicy::StrictNoGroups,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyPolicy::ActiveOnly => "active-only",
            SafetyPolicy::GroupAware => "group-aware",
            SafetyPolicy::StrictNoGroups => "strict-no-groups",
        }
    }

    /// Whether group membership participates in master ranking.
    pub fn ranks_by_group(self) -> bool {
        !matches!(self, SafetyPolicy::ActiveOnly)
    }
}

impl std::fmt::Display for SafetyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyPolicy {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == wanted)
            .ok_or_else(|| DedupError::UnknownPolicy(s.to_string()))
    }
}

/// What the safety gate decided for one retirement candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    Retire,
    SkipPaymentLinked,
    SkipAlreadyInactive,
    SkipGroupConflict,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Retire => "retire",
            Disposition::SkipPaymentLinked => "skip-payment-linked",
            Disposition::SkipAlreadyInactive => "skip-already-inactive",
            Disposition::SkipGroupConflict => "skip-group-conflict",
        }
    }

    pub fn is_retire(self) -> bool {
        self == Disposition::Retire
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SafetyGate {
    policy: SafetyPolicy,
}

impl SafetyGate {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SafetyPolicy {
        self.policy
    }

    /// Dispositions for every candidate of a cluster, in the order given.
    pub fn evaluate_cluster(
        &self,
        master: &EnrichedRecord,
        candidates: &[EnrichedRecord],
    ) -> Vec<Disposition> {
        let cluster_has_group = master.enrichment.has_group
            || candidates.iter().any(|c| c.enrichment.has_group);

        candidates
            .iter()
            .map(|candidate| self.evaluate(master, candidate, cluster_has_group))
            .collect()
    }

    /// Disposition for a single candidate.
    ///
    /// `cluster_has_group` is true when any member of the cluster, master included, carries a
    /// group assignment.
    pub fn evaluate(
        &self,
        master: &EnrichedRecord,
        candidate: &EnrichedRecord,
        cluster_has_group: bool,
    ) -> Disposition {
        let attrs = &candidate.enrichment;

        if attrs.payment_link_id.is_some() {
            return Disposition::SkipPaymentLinked;
        }
        if !attrs.is_active {
            return Disposition::SkipAlreadyInactive;
        }

        let group_conflict = match self.policy {
            SafetyPolicy::ActiveOnly => false,
            SafetyPolicy::GroupAware => attrs.has_group && !master.enrichment.has_group,
            SafetyPolicy::StrictNoGroups => cluster_has_group,
        };
        if group_conflict {
            return Disposition::SkipGroupConflict;
        }

        Disposition::Retire
    }
}
