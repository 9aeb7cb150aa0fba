//! Property-based tests for tag normalization and entity deduplication.

use proptest::prelude::*;

use ptm_core::normalize::{dedupe_values, normalize_tags};
use ptm_core::{TagVocabulary, VocabularyNamespace};
use std::collections::BTreeSet;

fn vocabulary() -> TagVocabulary {
    TagVocabulary::new()
        .with(VocabularyNamespace::Library, ["pytorch", "transformers"])
        .with(VocabularyNamespace::Language, ["en", "fr"])
        .with(VocabularyNamespace::License, ["mit"])
        .with(VocabularyNamespace::Dataset, ["squad"])
}

/// Free-text tags mixed with namespaced and vocabulary tags.
fn tag() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{0,12}",
        "(arxiv|license|dataset):[a-z0-9.]{1,8}",
        prop::sample::select(vec!["pytorch", "transformers", "en", "fr", "mit", "squad", ""])
            .prop_map(str::to_string),
    ]
}

proptest! {
    #[test]
    fn normalized_tags_exclude_namespaced_and_vocabulary(
        tags in prop::collection::vec(tag(), 0..20),
        extra in prop::collection::vec(tag(), 0..3),
    ) {
        let vocab = vocabulary();
        let normalized = normalize_tags(&tags, &vocab, &extra);
        for t in &normalized {
            prop_assert!(!t.is_empty());
            prop_assert!(!t.contains(':'));
            prop_assert!(!vocab.contains(t));
        }
    }

    #[test]
    fn normalization_is_idempotent(
        tags in prop::collection::vec(tag(), 0..20),
        extra in prop::collection::vec(tag(), 0..3),
    ) {
        let vocab = vocabulary();
        let once = normalize_tags(&tags, &vocab, &extra);
        let twice = normalize_tags(&once, &vocab, std::iter::empty::<&str>());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalization_ignores_order(tags in prop::collection::vec(tag(), 0..20)) {
        let vocab = vocabulary();
        let mut reversed = tags.clone();
        reversed.reverse();
        prop_assert_eq!(
            normalize_tags(&tags, &vocab, std::iter::empty::<&str>()),
            normalize_tags(&reversed, &vocab, std::iter::empty::<&str>())
        );
    }

    #[test]
    fn free_text_tags_survive(tags in prop::collection::vec("[a-z]{3,10}-[a-z]{2,6}", 1..10)) {
        let normalized = normalize_tags(&tags, &vocabulary(), std::iter::empty::<&str>());
        let expected: BTreeSet<String> = tags.into_iter().collect();
        prop_assert_eq!(normalized, expected);
    }

    #[test]
    fn dedupe_keeps_first_spelling(values in prop::collection::vec("[A-Za-z ]{0,8}", 0..20)) {
        let deduped = dedupe_values(values.clone());
        let unique: BTreeSet<&String> = deduped.iter().collect();
        prop_assert_eq!(unique.len(), deduped.len());
        for v in &deduped {
            prop_assert!(!v.is_empty());
            prop_assert_eq!(v.trim(), v.as_str());
        }
        // Every non-blank input is represented
        for v in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            prop_assert!(deduped.iter().any(|d| d == v));
        }
    }
}
