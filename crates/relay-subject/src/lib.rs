// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Hierarchical dotted subjects with `*`/`>` wildcard matching.
//!
//! A subject is a non-empty, `.`-separated string of up to [`MAX_TOKENS`]
//! tokens. Literal tokens match `[A-Za-z0-9_-]+`. Patterns additionally allow
//! `*` (exactly one token) and `>` (one or more trailing tokens, must be
//! last). Endpoint subjects are always concrete — they never contain
//! wildcards; that invariant is enforced by callers (`relay-registry`), not
//! by this crate, since a bare subject and a 1-token pattern are
//! lexically identical.

use std::fmt;

/// Maximum number of dot-separated tokens a subject or pattern may contain.
pub const MAX_TOKENS: usize = 16;

/// Reason a subject or pattern failed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSubject {
    /// Human-readable description of the problem.
    pub message: String,
    /// The offending subject string.
    pub subject: String,
}

impl fmt::Display for InvalidSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.message, self.subject)
    }
}

impl std::error::Error for InvalidSubject {}

/// Validate a subject or pattern string.
///
/// Rejects: empty strings, more than [`MAX_TOKENS`] tokens, empty tokens
/// (consecutive or leading/trailing dots), tokens outside the literal
/// character class unless they are exactly `*` or `>`, and a `>` that is not
/// the final token.
///
/// This is a pure function — it never panics and never allocates beyond the
/// returned error.
///
/// # Examples
///
/// ```
/// use relay_subject::validate;
///
/// assert!(validate("relay.agent.s1").is_ok());
/// assert!(validate("relay.agent.>").is_ok());
/// assert!(validate("").is_err());
/// assert!(validate("relay..s1").is_err());
/// assert!(validate("relay.>.agent").is_err());
/// ```
pub fn validate(s: &str) -> Result<(), InvalidSubject> {
    if s.is_empty() {
        return Err(InvalidSubject {
            message: "subject must not be empty".into(),
            subject: s.into(),
        });
    }

    let tokens: Vec<&str> = s.split('.').collect();
    if tokens.len() > MAX_TOKENS {
        return Err(InvalidSubject {
            message: format!("subject has more than {MAX_TOKENS} tokens"),
            subject: s.into(),
        });
    }

    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_empty() {
            return Err(InvalidSubject {
                message: "subject tokens must not be empty".into(),
                subject: s.into(),
            });
        }
        if *tok == ">" {
            if i != tokens.len() - 1 {
                return Err(InvalidSubject {
                    message: "'>' wildcard must be the last token".into(),
                    subject: s.into(),
                });
            }
            continue;
        }
        if *tok == "*" {
            continue;
        }
        if !tok.bytes().all(is_literal_byte) {
            return Err(InvalidSubject {
                message: format!("token {tok:?} contains characters outside [A-Za-z0-9_-]"),
                subject: s.into(),
            });
        }
    }

    Ok(())
}

fn is_literal_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Tokenize a subject or pattern by `.`. An empty string normalizes to zero
/// tokens rather than one empty token.
fn tokens(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('.').collect()
    }
}

/// Test whether `subject` matches `pattern`.
///
/// Both arguments are assumed to have already passed [`validate`] — this
/// function does not re-validate. Recursion-free, single lockstep walk;
/// bounded by [`MAX_TOKENS`], so there is no stack-depth concern.
///
/// - `*` consumes exactly one subject token.
/// - `>` matches iff at least one subject token remains at its position, and
///   (being last) consumes the rest.
/// - A literal token must equal the subject token at that position exactly.
///
/// # Examples
///
/// ```
/// use relay_subject::matches_pattern;
///
/// assert!(matches_pattern("a.b.c", "a.>"));
/// assert!(!matches_pattern("a.b.c", "a.*"));
/// assert!(matches_pattern("a.b.c", "*.b.*"));
/// assert!(!matches_pattern("", ">"));
/// ```
#[must_use]
pub fn matches_pattern(subject: &str, pattern: &str) -> bool {
    let subj_toks = tokens(subject);
    let pat_toks = tokens(pattern);

    let mut si = 0usize;
    for (pi, ptok) in pat_toks.iter().enumerate() {
        if *ptok == ">" {
            // '>' is only valid as the last pattern token (enforced by
            // validate); matches iff at least one token remains.
            return si < subj_toks.len();
        }
        let Some(stok) = subj_toks.get(si) else {
            return false;
        };
        if *ptok == "*" {
            si += 1;
            continue;
        }
        if ptok != stok {
            return false;
        }
        si += 1;
        let _ = pi;
    }
    si == subj_toks.len()
}

/// Returns `true` if `subject` contains no `*` or `>` tokens, i.e. it is safe
/// to register as a concrete [`relay_subject`](crate) endpoint rather than a
/// subscriber pattern.
///
/// Assumes `subject` has already passed [`validate`].
#[must_use]
pub fn is_concrete(subject: &str) -> bool {
    tokens(subject).iter().all(|t| *t != "*" && *t != ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(validate("").is_err());
    }

    #[test]
    fn rejects_too_many_tokens() {
        let s = (0..17).map(|i| i.to_string()).collect::<Vec<_>>().join(".");
        assert!(validate(&s).is_err());
    }

    #[test]
    fn rejects_empty_token() {
        assert!(validate("a..b").is_err());
        assert!(validate(".a.b").is_err());
        assert!(validate("a.b.").is_err());
    }

    #[test]
    fn rejects_bad_chars() {
        assert!(validate("a.b c.d").is_err());
        assert!(validate("a.b!.d").is_err());
    }

    #[test]
    fn rejects_tail_not_last() {
        assert!(validate("a.>.b").is_err());
        assert!(validate(">").is_ok());
        assert!(validate("a.>").is_ok());
    }

    #[test]
    fn accepts_wildcards() {
        assert!(validate("a.*.b").is_ok());
        assert!(validate("a.*.>").is_ok());
    }

    #[test]
    fn match_examples_from_spec() {
        assert!(matches_pattern("a.b.c", "a.>"));
        assert!(!matches_pattern("a.b.c", "a.*"));
        assert!(matches_pattern("a.b.c", "*.b.*"));
        assert!(!matches_pattern("", ">"));
    }

    #[test]
    fn match_exact_literal() {
        assert!(matches_pattern("relay.agent.s1", "relay.agent.s1"));
        assert!(!matches_pattern("relay.agent.s1", "relay.agent.s2"));
    }

    #[test]
    fn match_pattern_longer_than_subject_fails() {
        assert!(!matches_pattern("a.b", "a.b.c"));
    }

    #[test]
    fn match_tail_requires_at_least_one_token() {
        assert!(matches_pattern("a", "a.>") == false);
        assert!(matches_pattern("a.b", "a.>"));
    }

    #[test]
    fn is_concrete_detects_wildcards() {
        assert!(is_concrete("relay.agent.s1"));
        assert!(!is_concrete("relay.agent.*"));
        assert!(!is_concrete("relay.agent.>"));
    }
}
