//! Canonicalization of raw PII values before hashing.
//!
//! Blind indexes are deterministic, so equivalent raw inputs must hash
//! identically. Normalization is total (never fails on arbitrary input),
//! deterministic, and idempotent: `normalize(normalize(x)) == normalize(x)`.

/// The kind of PII field being normalized, which selects the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Email address: lowercased and trimmed.
    Email,
    /// Phone number: reduced to its digits.
    Phone,
    /// Person name: lowercased, punctuation-stripped, whitespace-collapsed.
    Name,
}

/// Canonicalizes a raw value according to its field kind.
///
/// Returns `None` when the input is empty or reduces to nothing, so that
/// empty values never produce a hash of the empty string: the field is
/// simply non-searchable and non-unique-checked.
///
/// # Example
///
/// ```
/// use blindex::normalize::{normalize, FieldKind};
///
/// assert_eq!(normalize(" Alice@Example.COM ", FieldKind::Email).as_deref(),
///            Some("alice@example.com"));
/// assert_eq!(normalize("+63 (2) 8888-1234", FieldKind::Phone).as_deref(),
///            Some("63288881234"));
/// assert_eq!(normalize("  Maria   Dela  Cruz ", FieldKind::Name).as_deref(),
///            Some("maria dela cruz"));
/// assert_eq!(normalize("   ", FieldKind::Name), None);
/// ```
#[must_use]
pub fn normalize(raw: &str, kind: FieldKind) -> Option<String> {
    let normalized = match kind {
        FieldKind::Email => raw.trim().to_lowercase(),
        FieldKind::Phone => raw.chars().filter(char::is_ascii_digit).collect(),
        FieldKind::Name => normalize_name(raw),
    };

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Lowercases, keeps only letters, digits, whitespace, hyphens and
/// apostrophes, then collapses whitespace runs.
///
/// Filtering happens before collapsing so that removing a character between
/// two spaces cannot reintroduce a double space, which keeps the function
/// idempotent.
fn normalize_name(raw: &str) -> String {
    let filtered: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '\'')
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_lowercase_and_trim() {
        assert_eq!(
            normalize("  Maria.DelaCruz@Example.COM ", FieldKind::Email).as_deref(),
            Some("maria.delacruz@example.com")
        );
    }

    #[test]
    fn test_email_empty_is_none() {
        assert_eq!(normalize("", FieldKind::Email), None);
        assert_eq!(normalize("   ", FieldKind::Email), None);
    }

    #[test]
    fn test_phone_strips_non_digits() {
        assert_eq!(normalize("+1 (555) 010-9999", FieldKind::Phone).as_deref(), Some("15550109999"));
    }

    #[test]
    fn test_phone_without_digits_is_none() {
        assert_eq!(normalize("ext. none", FieldKind::Phone), None);
    }

    #[test]
    fn test_name_collapses_whitespace() {
        assert_eq!(
            normalize("Maria\t  Dela   Cruz", FieldKind::Name).as_deref(),
            Some("maria dela cruz")
        );
    }

    #[test]
    fn test_name_keeps_hyphen_and_apostrophe() {
        assert_eq!(
            normalize("Anne-Marie O'Neill", FieldKind::Name).as_deref(),
            Some("anne-marie o'neill")
        );
    }

    #[test]
    fn test_name_strips_punctuation() {
        assert_eq!(normalize("J. R. R.", FieldKind::Name).as_deref(), Some("j r r"));
    }

    #[test]
    fn test_name_removal_does_not_leave_double_space() {
        // '@' sits between two spaces; removing it must not leave "a  b".
        assert_eq!(normalize("a @ b", FieldKind::Name).as_deref(), Some("a b"));
    }

    #[test]
    fn test_name_unicode_letters_survive() {
        assert_eq!(normalize("José Ñuñez", FieldKind::Name).as_deref(), Some("josé ñuñez"));
    }

    #[test]
    fn test_name_only_punctuation_is_none() {
        assert_eq!(normalize("!!!", FieldKind::Name), None);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in ".*", kind in prop_oneof![
            Just(FieldKind::Email),
            Just(FieldKind::Phone),
            Just(FieldKind::Name),
        ]) {
            if let Some(once) = normalize(&raw, kind) {
                let twice = normalize(&once, kind);
                prop_assert_eq!(twice.as_deref(), Some(once.as_str()));
            }
        }

        #[test]
        fn prop_normalize_never_yields_empty_string(raw in ".*", kind in prop_oneof![
            Just(FieldKind::Email),
            Just(FieldKind::Phone),
            Just(FieldKind::Name),
        ]) {
            if let Some(out) = normalize(&raw, kind) {
                prop_assert!(!out.is_empty());
            }
        }
    }
}
