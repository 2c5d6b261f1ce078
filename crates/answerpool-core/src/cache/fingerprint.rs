//! Cache fingerprints.
//!
//! A fingerprint is the full hex digest of the normalized question combined
//! with the requested model (or `*` for any model), the question type and the
//! options block. Normalization trims, collapses internal whitespace and
//! case-folds so trivially different submissions share an entry.

use std::fmt;
use std::sync::Arc;

use answerpool_types::answer::AnswerRequest;

use crate::service::hash::ContentHasher;

/// Model marker used when the request has no model preference.
pub const ANY_MODEL: &str = "*";

/// Trim, collapse whitespace runs to one space, lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable cache key for one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes fingerprints with an injected digest.
#[derive(Clone)]
pub struct Fingerprinter {
    hasher: Arc<dyn ContentHasher>,
}

impl Fingerprinter {
    pub fn new(hasher: Arc<dyn ContentHasher>) -> Self {
        Self { hasher }
    }

    pub fn fingerprint(&self, request: &AnswerRequest) -> Fingerprint {
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(ANY_MODEL);
        let material = format!(
            "q={}\nm={}\nt={}\no={}",
            normalize(&request.question),
            model,
            request.question_type.as_deref().map(normalize).unwrap_or_default(),
            request.options.as_deref().map(normalize).unwrap_or_default(),
        );
        Fingerprint(self.hasher.compute_hash(&material))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Identity "hash" so tests can see the material.
    pub(crate) struct PlainHasher;

    impl ContentHasher for PlainHasher {
        fn compute_hash(&self, content: &str) -> String {
            content.to_string()
        }
    }

    fn fingerprinter() -> Fingerprinter {
        Fingerprinter::new(Arc::new(PlainHasher))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  What   is\tRust?\n"), "what is rust?");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_equivalent_questions_share_fingerprint() {
        let f = fingerprinter();
        let a = f.fingerprint(&AnswerRequest::new("What is 1+1?"));
        let b = f.fingerprint(&AnswerRequest::new("  what is   1+1? "));
        assert_eq!(a, b);
        assert!(a.as_str().contains("m=*"));
    }

    #[test]
    fn test_model_and_options_distinguish() {
        let f = fingerprinter();
        let base = AnswerRequest::new("q");
        let with_model = AnswerRequest::new("q").with_model("gpt-4o");
        let with_options = AnswerRequest::new("q").with_options("A. x\nB. y");
        let with_type = AnswerRequest::new("q").with_type("judge");

        let fps = [
            f.fingerprint(&base),
            f.fingerprint(&with_model),
            f.fingerprint(&with_options),
            f.fingerprint(&with_type),
        ];
        for i in 0..fps.len() {
            for j in (i + 1)..fps.len() {
                assert_ne!(fps[i], fps[j]);
            }
        }
    }

    #[test]
    fn test_blank_model_means_any() {
        let f = fingerprinter();
        assert_eq!(
            f.fingerprint(&AnswerRequest::new("q").with_model("  ")),
            f.fingerprint(&AnswerRequest::new("q"))
        );
    }
}
