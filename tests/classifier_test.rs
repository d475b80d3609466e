// ABOUTME: Integration tests for the keyword topic classifier
// ABOUTME: Validates allow-list, block-list and length-threshold behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use codedsa_gateway::classifier::{
    KeywordClassifier, RejectionReason, TopicClassifier, REFUSAL_MESSAGE,
};

#[test]
fn test_dsa_questions_are_in_domain() {
    let classifier = KeywordClassifier::default();
    for text in [
        "What is the time complexity of merge sort?",
        "How does BFS differ from DFS on a graph?",
        "Explain dynamic programming with the knapsack problem",
        "Why is a hash map lookup O(1) on average?",
        "Reverse a linked list in place",
    ] {
        let result = classifier.classify(text);
        assert!(result.in_domain, "{text}");
        assert!(!result.is_rejected(), "{text}");
    }
}

#[test]
fn test_block_list_rejects_even_short_text() {
    let classifier = KeywordClassifier::default();
    let result = classifier.classify("tell me a joke");
    assert_eq!(result.rejected_reason, Some(RejectionReason::NonDsaTopic));
}

#[test]
fn test_block_list_wins_over_domain_terms() {
    let classifier = KeywordClassifier::default();
    let result = classifier.classify("Sort my favorite movie list by rating");
    assert!(result.in_domain);
    assert_eq!(result.rejected_reason, Some(RejectionReason::NonDsaTopic));
}

#[test]
fn test_long_keyword_free_text_is_rejected() {
    let classifier = KeywordClassifier::default();
    let result = classifier.classify("Could you tell me what you think about my new puppy?");
    assert!(!result.in_domain);
    assert_eq!(
        result.rejected_reason,
        Some(RejectionReason::OffTopicAndTooLong)
    );
}

#[test]
fn test_short_keyword_free_text_passes() {
    let classifier = KeywordClassifier::default();
    for text in ["hi", "thanks!", "ok, why?", "can you go on?"] {
        let result = classifier.classify(text);
        assert!(!result.is_rejected(), "{text}");
    }
}

#[test]
fn test_threshold_is_configurable() {
    let strict = KeywordClassifier::new(5);
    assert!(strict.classify("thanks again").is_rejected());
    assert_eq!(strict.max_ambiguous_len(), 5);

    let lenient = KeywordClassifier::new(200);
    assert!(!lenient
        .classify("Could you tell me what you think about my new puppy?")
        .is_rejected());
}

#[test]
fn test_dsa_words_containing_blocked_fragments_pass() {
    let classifier = KeywordClassifier::default();
    for text in [
        "How do I detect an unbalanced binary tree?",
        "Resolve a merge conflict between two sorted arrays",
        "Updating a segment tree lazily",
    ] {
        assert!(!classifier.classify(text).is_rejected(), "{text}");
    }
}

#[test]
fn test_refusal_message_suggests_rephrasings() {
    let classifier = KeywordClassifier::default();
    assert_eq!(classifier.refusal_message(), REFUSAL_MESSAGE);
    assert!(REFUSAL_MESSAGE.contains("binary search"));
}
