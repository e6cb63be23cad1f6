//! Canonical forms of names and email addresses used for comparison.
//!
//! Both functions are pure and idempotent: normalising an already normalised value returns it
//! unchanged.

use crate::constants::NAME_AFFIXES;

/// Canonicalise a personal name for comparison.
///
/// Lowercases, drops honorific and generational-suffix tokens ("Dr", "Jr", "III", ...) when at
/// least one other token remains, then removes every character outside `[a-z]`. The result is a
/// single token with no separators, so `"Mary-Jane O'Neil Jr."` becomes `"maryjaneoneil"`.
pub fn normalize_name(input: &str) -> String {
    let tokens: Vec<String> = input
        .split_whitespace()
        .map(|token| {
            token
                .to_lowercase()
                .chars()
                .filter(char::is_ascii_lowercase)
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .collect();

    let kept: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|token| !NAME_AFFIXES.contains(token))
        .collect();

    // A name made only of affixes ("Jr", "Dr") is kept as-is rather than erased.
    if kept.is_empty() {
        tokens.concat()
    } else {
        kept.concat()
    }
}

/// Canonicalise an email address for comparison.
///
/// Trims and lowercases. Addresses on a placeholder domain (or any subdomain of one) normalise to
/// the empty string so they never cluster records together.
pub fn normalize_email<S: AsRef<str>>(input: &str, placeholder_domains: &[S]) -> String {
    let email = input.trim().to_lowercase();
    if email.is_empty() || is_placeholder(&email, placeholder_domains) {
        return String::new();
    }
    email
}

fn is_placeholder<S: AsRef<str>>(email: &str, placeholder_domains: &[S]) -> bool {
    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    placeholder_domains.iter().any(|placeholder| {
        let placeholder = placeholder.as_ref().trim().to_lowercase();
        !placeholder.is_empty()
            && (domain == placeholder || domain.ends_with(&format!(".{}", placeholder)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDERS: &[&str] = &["placeholder-domain.example"];

    #[test]
    fn test_normalize_name_strips_case_and_punctuation() {
        assert_eq!(normalize_name("  Gregory "), "gregory");
        assert_eq!(normalize_name("O'Brien"), "obrien");
        assert_eq!(normalize_name("Mary-Jane"), "maryjane");
        assert_eq!(normalize_name("Anne Marie"), "annemarie");
    }

    #[test]
    fn test_normalize_name_empty_input() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("1234 !!"), "");
    }

    #[test]
    fn test_normalize_name_drops_titles_and_suffixes() {
        assert_eq!(normalize_name("Dr. Smith"), "smith");
        assert_eq!(normalize_name("Smith Jr."), "smith");
        assert_eq!(normalize_name("MRS Jones III"), "jones");
    }

    #[test]
    fn test_normalize_name_keeps_affix_only_names() {
        assert_eq!(normalize_name("Jr"), "jr");
        assert_eq!(normalize_name("Dr Jr"), "drjr");
    }

    #[test]
    fn test_normalize_name_drops_non_ascii_letters() {
        assert_eq!(normalize_name("José"), "jos");
    }

    #[test]
    fn test_normalize_name_is_idempotent_on_edge_cases() {
        for input in ["j r", "Dr Jr", "Smith Jr.", "  ", "O'Brien-Smith", "İlker"] {
            let once = normalize_name(input);
            assert_eq!(normalize_name(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Greg.Smith@Example.COM ", PLACEHOLDERS),
            "greg.smith@example.com"
        );
        assert_eq!(normalize_email("", PLACEHOLDERS), "");
    }

    #[test]
    fn test_normalize_email_blanks_placeholder_domains() {
        assert_eq!(
            normalize_email("noreply@placeholder-domain.example", PLACEHOLDERS),
            ""
        );
        assert_eq!(
            normalize_email("NoReply@Placeholder-Domain.Example", PLACEHOLDERS),
            ""
        );
        assert_eq!(
            normalize_email("x@mail.placeholder-domain.example", PLACEHOLDERS),
            ""
        );
    }

    #[test]
    fn test_normalize_email_keeps_lookalike_domains() {
        assert_eq!(
            normalize_email("a@notplaceholder-domain.example", PLACEHOLDERS),
            "a@notplaceholder-domain.example"
        );
    }
}
