//! Property-based tests for normalisation, similarity, clustering and the merge decision.
//!
//! Verifies invariants that must hold for every roster, not just the hand-picked scenarios:
//! - normalisation is idempotent
//! - name similarity is symmetric
//! - clusters partition the roster and have at least two members
//! - exactly one master per cluster, always a member of it
//! - a payment link is a hard veto whatever the other signals say

mod common;

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use dedup_core::{
    build_clusters, decide, names_similar, normalize_email, normalize_name, CandidateRecord,
    ClusterOrigin, Disposition, EnrichedCluster, EnrichedRecord, EnrichmentAttributes,
    SafetyGate, SafetyPolicy,
};
use emr_client::RichnessDetails;

const PLACEHOLDERS: &[&str] = &["placeholder-domain.example"];

// =============================================================================
// Proptest strategies
// =============================================================================

fn arb_policy() -> impl Strategy<Value = SafetyPolicy> {
    prop_oneof![
        Just(SafetyPolicy::ActiveOnly),
        Just(SafetyPolicy::GroupAware),
        Just(SafetyPolicy::StrictNoGroups),
    ]
}

/// Small vocabularies so that generated rosters actually contain duplicates.
fn arb_roster_entry() -> impl Strategy<Value = (String, String, Option<String>, Option<String>)> {
    (
        prop::sample::select(vec!["Greg", "Gregory", "Ann", "Anne", "Jon", "John", "", "Dr Mark"]),
        prop::sample::select(vec!["Smith", "Smyth", "Lee", "O'Neil", ""]),
        prop::option::of(prop::sample::select(vec![
            "a@example.com",
            "A@Example.com ",
            "b@example.com",
            "noreply@placeholder-domain.example",
        ])),
        prop::option::of(prop::sample::select(vec!["1980-01-01", "1980-01-02", "1990-05-01"])),
    )
        .prop_map(|(first, last, email, dob)| {
            (
                first.to_string(),
                last.to_string(),
                email.map(str::to_string),
                dob.map(str::to_string),
            )
        })
}

fn arb_roster() -> impl Strategy<Value = Vec<CandidateRecord>> {
    prop::collection::vec((arb_roster_entry(), 2000i32..2024), 0..40).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, ((first, last, email, dob), year))| {
                common::patient(
                    &format!("p{}", i),
                    &first,
                    &last,
                    email.as_deref(),
                    dob.as_deref(),
                    year,
                )
            })
            .collect()
    })
}

fn arb_member(id: String) -> impl Strategy<Value = EnrichedRecord> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::option::of("cus_[a-z0-9]{1,8}"),
        0u32..50,
        0u32..50,
        0u32..50,
        2000i32..2024,
    )
        .prop_map(move |(active, group, payment, documents, forms, meds, year)| EnrichedRecord {
            record: CandidateRecord::new(
                id.clone(),
                "Greg",
                "Smith",
                None,
                Some("1980-01-01".into()),
                Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            ),
            enrichment: EnrichmentAttributes {
                is_active: active,
                has_group: group,
                payment_link_id: payment,
                data_richness: RichnessDetails {
                    documents,
                    forms,
                    medications: meds,
                    ..Default::default()
                },
                enrichment_error: None,
            },
        })
}

fn arb_cluster() -> impl Strategy<Value = Vec<EnrichedRecord>> {
    (2usize..8).prop_flat_map(|size| {
        (0..size)
            .map(|i| arb_member(format!("m{}", i)))
            .collect::<Vec<_>>()
    })
}

// =============================================================================
// Normalisation and similarity
// =============================================================================

proptest! {
    #[test]
    fn test_normalize_name_is_idempotent(input in "\\PC{0,30}") {
        let once = normalize_name(&input);
        prop_assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_normalize_name_output_is_lowercase_ascii(input in "\\PC{0,30}") {
        prop_assert!(normalize_name(&input).chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_normalize_email_is_idempotent(input in "[ -~]{0,30}") {
        let once = normalize_email(&input, PLACEHOLDERS);
        prop_assert_eq!(normalize_email(&once, PLACEHOLDERS), once);
    }

    #[test]
    fn test_names_similar_is_symmetric(a in "[A-Za-z .'-]{0,12}", b in "[A-Za-z .'-]{0,12}") {
        prop_assert_eq!(names_similar(&a, &b), names_similar(&b, &a));
    }

    #[test]
    fn test_names_similar_is_reflexive(a in "[A-Za-z]{0,12}") {
        prop_assert!(names_similar(&a, &a));
    }
}

// =============================================================================
// Clustering
// =============================================================================

proptest! {
    #[test]
    fn test_clusters_partition_the_roster(roster in arb_roster()) {
        let clusters = build_clusters(&roster, PLACEHOLDERS);
        let mut seen = HashSet::new();
        for cluster in &clusters {
            for member in cluster.members() {
                let id = member.id().to_string();
                prop_assert!(seen.insert(id.clone()), "{} in two clusters", id);
            }
        }
    }

    #[test]
    fn test_clusters_have_at_least_two_members(roster in arb_roster()) {
        for cluster in build_clusters(&roster, PLACEHOLDERS) {
            prop_assert!(cluster.len() >= 2);
        }
    }

    #[test]
    fn test_clustering_is_deterministic(roster in arb_roster()) {
        prop_assert_eq!(
            build_clusters(&roster, PLACEHOLDERS),
            build_clusters(&roster, PLACEHOLDERS)
        );
    }

    #[test]
    fn test_placeholder_emails_never_form_clusters(roster in arb_roster()) {
        for cluster in build_clusters(&roster, PLACEHOLDERS) {
            if cluster.origin() == ClusterOrigin::Email {
                prop_assert!(!cluster.key().ends_with("placeholder-domain.example"));
            }
        }
    }

    #[test]
    fn test_name_clusters_share_exact_dob(roster in arb_roster()) {
        for cluster in build_clusters(&roster, PLACEHOLDERS) {
            if cluster.origin() == ClusterOrigin::NameAndDob {
                let dobs: HashSet<_> = cluster.members().iter().map(|m| m.dob()).collect();
                prop_assert_eq!(dobs.len(), 1);
                prop_assert!(!dobs.contains(&None));
            }
        }
    }
}

// =============================================================================
// Merge decision
// =============================================================================

proptest! {
    #[test]
    fn test_exactly_one_master_and_it_is_a_member(members in arb_cluster(), policy in arb_policy()) {
        let cluster = EnrichedCluster::new("k", ClusterOrigin::NameAndDob, members.clone())
            .expect("generated clusters have at least two members");
        let decision = decide(&cluster, &SafetyGate::new(policy)).expect("decide");

        prop_assert_eq!(decision.candidates.len() + 1, members.len());
        prop_assert!(members.iter().any(|m| m.id() == decision.master_id()));
        prop_assert!(decision.candidates.iter().all(|c| c.record.id() != decision.master_id()));

        let mut ids: Vec<&str> = decision.candidates.iter().map(|c| c.record.id()).collect();
        ids.push(decision.master_id());
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), members.len());
    }

    #[test]
    fn test_payment_link_is_a_hard_veto(members in arb_cluster(), policy in arb_policy()) {
        let cluster = EnrichedCluster::new("k", ClusterOrigin::NameAndDob, members)
            .expect("generated clusters have at least two members");
        let decision = decide(&cluster, &SafetyGate::new(policy)).expect("decide");

        for candidate in &decision.candidates {
            if candidate.record.enrichment.payment_link_id.is_some() {
                prop_assert_eq!(candidate.disposition, Disposition::SkipPaymentLinked);
            }
        }
    }

    #[test]
    fn test_only_active_unlinked_candidates_retire(members in arb_cluster(), policy in arb_policy()) {
        let cluster = EnrichedCluster::new("k", ClusterOrigin::NameAndDob, members)
            .expect("generated clusters have at least two members");
        let decision = decide(&cluster, &SafetyGate::new(policy)).expect("decide");

        for candidate in &decision.candidates {
            if candidate.disposition == Disposition::Retire {
                prop_assert!(candidate.record.enrichment.is_active);
                prop_assert!(candidate.record.enrichment.payment_link_id.is_none());
            }
        }
    }

    #[test]
    fn test_master_outranks_every_candidate(members in arb_cluster(), policy in arb_policy()) {
        let cluster = EnrichedCluster::new("k", ClusterOrigin::NameAndDob, members)
            .expect("generated clusters have at least two members");
        let decision = decide(&cluster, &SafetyGate::new(policy)).expect("decide");

        for candidate in &decision.candidates {
            prop_assert!(decision.master_rank > candidate.rank);
        }
    }
}
