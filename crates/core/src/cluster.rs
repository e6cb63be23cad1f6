//! Duplicate-candidate clustering over the roster snapshot.
//!
//! Two independent strategies run in order:
//!
//! 1. **Name + date of birth**: records with the same normalised last name, the same date of birth
//!    (exact string equality) and similar first names are grouped. The scan is an explicit O(n²)
//!    nested iteration; rosters are in the low thousands and this is an offline batch.
//! 2. **Email**: records left unassigned by pass 1 that share a normalised, non-placeholder email
//!    are grouped, provided no member already belongs to a pass-1 cluster.
//!
//! Clusters never overlap and always have at least two members. Output order follows roster order,
//! so an unchanged roster always yields the same clusters in the same order.

use crate::normalize::{normalize_email, normalize_name};
use crate::record::CandidateRecord;
use crate::similarity::names_similar;
use std::collections::{HashMap, HashSet};

/// Which strategy produced a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClusterOrigin {
    NameAndDob,
    Email,
}

impl ClusterOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterOrigin::NameAndDob => "name+dob",
            ClusterOrigin::Email => "email",
        }
    }
}

impl std::fmt::Display for ClusterOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two or more roster records suspected to be the same patient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateCluster {
    key: String,
    origin: ClusterOrigin,
    members: Vec<CandidateRecord>,
}

impl DuplicateCluster {
    /// `last|first|dob` for name clusters, the normalised email for email clusters.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn origin(&self) -> ClusterOrigin {
        self.origin
    }

    /// Members in roster order.
    pub fn members(&self) -> &[CandidateRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.members.iter().any(|m| m.id() == external_id)
    }
}

/// Group the roster into duplicate-candidate clusters.
///
/// Pure: no remote calls, no I/O. `placeholder_domains` lists email domains that must never be
/// used to cluster.
pub fn build_clusters<S: AsRef<str>>(
    roster: &[CandidateRecord],
    placeholder_domains: &[S],
) -> Vec<DuplicateCluster> {
    let mut assigned = vec![false; roster.len()];
    let mut clusters = name_and_dob_pass(roster, &mut assigned);

    let claimed: HashSet<&str> = clusters
        .iter()
        .flat_map(|c| c.members.iter().map(CandidateRecord::id))
        .collect();
    let email_clusters = email_pass(roster, &assigned, &claimed, placeholder_domains);
    clusters.extend(email_clusters);

    clusters
}

fn name_and_dob_pass(roster: &[CandidateRecord], assigned: &mut [bool]) -> Vec<DuplicateCluster> {
    let last_names: Vec<String> = roster
        .iter()
        .map(|r| normalize_name(r.last_name()))
        .collect();

    let mut clusters = Vec::new();

    for i in 0..roster.len() {
        if assigned[i] {
            continue;
        }
        let p1 = &roster[i];
        let Some(dob) = p1.dob() else {
            continue;
        };
        let last = &last_names[i];
        if last.is_empty() {
            continue;
        }

        let mut group = vec![i];
        for j in (i + 1)..roster.len() {
            if assigned[j] {
                continue;
            }
            let p2 = &roster[j];
            if p2.dob() == Some(dob)
                && last_names[j] == *last
                && names_similar(p1.first_name(), p2.first_name())
            {
                group.push(j);
            }
        }

        if group.len() < 2 {
            continue;
        }

        for &index in &group {
            assigned[index] = true;
        }
        let key = format!("{}|{}|{}", last, normalize_name(p1.first_name()), dob);
        tracing::debug!("name+dob cluster {} with {} members", key, group.len());
        clusters.push(DuplicateCluster {
            key,
            origin: ClusterOrigin::NameAndDob,
            members: group.into_iter().map(|k| roster[k].clone()).collect(),
        });
    }

    clusters
}

fn email_pass<S: AsRef<str>>(
    roster: &[CandidateRecord],
    assigned: &[bool],
    claimed: &HashSet<&str>,
    placeholder_domains: &[S],
) -> Vec<DuplicateCluster> {
    // Groups in order of first appearance in the roster.
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for (i, record) in roster.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        let email = normalize_email(record.email().unwrap_or(""), placeholder_domains);
        if email.is_empty() {
            continue;
        }
        match group_index.get(&email) {
            Some(&g) => groups[g].1.push(i),
            None => {
                group_index.insert(email.clone(), groups.len());
                groups.push((email, vec![i]));
            }
        }
    }

    let mut taken: HashSet<&str> = HashSet::new();
    let mut clusters = Vec::new();

    for (email, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let overlaps = members.iter().any(|&i| {
            let id = roster[i].id();
            claimed.contains(id) || taken.contains(id)
        });
        if overlaps {
            tracing::debug!("email group {} overlaps an existing cluster, skipping", email);
            continue;
        }

        taken.extend(members.iter().map(|&i| roster[i].id()));
        tracing::debug!("email cluster {} with {} members", email, members.len());
        clusters.push(DuplicateCluster {
            key: email,
            origin: ClusterOrigin::Email,
            members: members.into_iter().map(|i| roster[i].clone()).collect(),
        });
    }

    clusters
}
