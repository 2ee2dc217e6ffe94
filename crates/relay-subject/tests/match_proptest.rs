use proptest::prelude::*;
use relay_subject::{matches_pattern, validate};

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,6}"
}

fn subject(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(token(), 1..=max_len).prop_map(|v| v.join("."))
}

proptest! {
    #[test]
    fn valid_subjects_always_match_themselves(s in subject(16)) {
        prop_assume!(validate(&s).is_ok());
        prop_assert!(matches_pattern(&s, &s));
    }

    #[test]
    fn star_prefix_matches_any_same_length_subject(prefix in token(), rest in token()) {
        let subject = format!("{prefix}.{rest}");
        let pattern = format!("{prefix}.*");
        prop_assert!(matches_pattern(&subject, &pattern));
    }

    #[test]
    fn tail_pattern_matches_any_suffix(prefix in token(), tail in subject(10)) {
        let subject = format!("{prefix}.{tail}");
        let pattern = format!("{prefix}.>");
        prop_assert!(matches_pattern(&subject, &pattern));
    }

    #[test]
    fn validate_never_panics(s in ".*") {
        let _ = validate(&s);
    }
}
