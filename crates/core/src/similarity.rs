//! Boolean name similarity gate.
//!
//! Clustering uses a yes/no verdict rather than a continuous score so every grouping can be
//! explained as one of three rules: identical, one name contains the other, or a small edit
//! distance between sufficiently long names.

use crate::constants::{MAX_NAME_EDIT_DISTANCE, MIN_FUZZY_NAME_LEN};
use crate::normalize::normalize_name;

/// Which rule made two names similar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    /// One normalised name contains the other ("greg" / "gregory").
    Contained,
    /// Edit distance below the threshold on names longer than the minimum length.
    EditDistance(usize),
}

/// Whether two names plausibly refer to the same person.
///
/// Symmetric in its arguments.
pub fn names_similar(a: &str, b: &str) -> bool {
    name_match(a, b).is_some()
}

/// Explain why two names are similar, or `None` if they are not.
pub fn name_match(a: &str, b: &str) -> Option<NameMatch> {
    let a = normalize_name(a);
    let b = normalize_name(b);

    if a == b {
        return Some(NameMatch::Exact);
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    // An empty name carries no evidence and would otherwise be contained in everything.
    if !shorter.is_empty() && longer.contains(shorter.as_str()) {
        return Some(NameMatch::Contained);
    }

    if shorter.len() > MIN_FUZZY_NAME_LEN {
        let distance = strsim::levenshtein(&a, &b);
        if distance < MAX_NAME_EDIT_DISTANCE {
            return Some(NameMatch::EditDistance(distance));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names_are_similar() {
        assert_eq!(name_match("Gregory", " gregory "), Some(NameMatch::Exact));
    }

    #[test]
    fn test_shortened_names_are_similar() {
        assert_eq!(name_match("Greg", "Gregory"), Some(NameMatch::Contained));
        assert_eq!(name_match("Gregory", "Greg"), Some(NameMatch::Contained));
    }

    #[test]
    fn test_small_typos_on_long_names_are_similar() {
        assert_eq!(
            name_match("Katherine", "Katharine"),
            Some(NameMatch::EditDistance(1))
        );
        assert_eq!(name_match("Jonathan", "Jonathon"), Some(NameMatch::EditDistance(1)));
        assert!(names_similar("Stephen", "Stephan"));
    }

    #[test]
    fn test_short_names_require_exact_or_containment() {
        // distance 1, but the shorter name has only 3 letters
        assert!(!names_similar("Ann", "Amy"));
        assert!(!names_similar("Tom", "Tim"));
        // 4 letters is long enough
        assert!(names_similar("Jane", "June"));
    }

    #[test]
    fn test_distance_of_three_is_not_similar() {
        assert!(!names_similar("Michael", "Rachel"));
        assert!(!names_similar("Mark", "Mike"));
    }

    #[test]
    fn test_empty_names() {
        assert!(names_similar("", ""));
        assert!(!names_similar("", "Greg"));
        assert!(!names_similar("Greg", "  "));
    }

    #[test]
    fn test_similarity_is_symmetric_on_samples() {
        let names = ["Greg", "Gregory", "Ann", "Anne", "Katherine", "Kathryn", "", "Jo"];
        for a in names {
            for b in names {
                assert_eq!(names_similar(a, b), names_similar(b, a), "{:?} vs {:?}", a, b);
            }
        }
    }
}
