// ABOUTME: Heuristic topic classifier that keeps the tutor on data structures and algorithms
// ABOUTME: Allow-list and block-list substring matching with a length threshold for ambiguous text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Topic Classifier
//!
//! A cheap pre-filter run before any model call. It is not a guarantee: the
//! tutor system prompt restates the scope for the model itself.
//!
//! [`KeywordClassifier`] lower-cases the question and checks it against two
//! substring lists. A block-list hit always rejects. Text without any domain
//! term is rejected only when it is longer than `max_ambiguous_len`
//! characters, so short greetings and follow-ups pass through.

use serde::{Deserialize, Serialize};

use crate::constants::classifier::DEFAULT_MAX_AMBIGUOUS_LEN;

/// Reply sent instead of calling the model when a question is out of scope
pub const REFUSAL_MESSAGE: &str = "I'm the CodeDSA tutor, so I can only help with data structures, \
algorithms, complexity analysis and problem-solving on this platform.\n\n\
Try rephrasing your question, for example:\n\
- \"Explain how binary search works\"\n\
- \"What is the time complexity of merge sort?\"\n\
- \"Write a linked list reversal in Python\"";

/// Domain vocabulary; any substring hit marks the text as in domain
const DOMAIN_TERMS: &[&str] = &[
    // data structures
    "array", "list", "linked", "stack", "queue", "deque", "heap", "priority", "hash", "map",
    "set", "tree", "bst", "trie", "graph", "matrix", "string", "node", "pointer", "segment",
    "fenwick", "union find", "disjoint", "tuple", "vector", "bitmask",
    // algorithms
    "algorithm", "sort", "search", "binary", "bfs", "dfs", "breadth", "depth", "dijkstra",
    "bellman", "floyd", "kruskal", "prim", "topological", "traversal", "inorder", "preorder",
    "postorder", "recursion", "recursive", "iterat", "dynamic programming", "dp", "memoiz",
    "tabulation", "greedy", "backtrack", "divide and conquer", "two pointer", "sliding window",
    "prefix sum", "kadane", "knapsack", "permutation", "combination", "subsequence",
    "subarray", "palindrome", "anagram", "fibonacci", "shortest path", "spanning tree",
    "cycle", "merge", "partition", "pivot", "quick", "bubble", "insertion", "selection",
    "counting", "radix", "bucket", "rotate", "reverse", "hashing",
    // complexity
    "complexity", "big o", "big-o", "o(n", "o(1", "o(log", "time complexity",
    "space complexity", "runtime", "asymptotic", "amortized", "worst case", "best case",
    "average case", "optimal", "optimize", "efficient",
    // programming and practice
    "code", "implement", "function", "leetcode", "interview", "problem", "solution",
    "example", "snippet", "debug", "python", "java", "javascript", "c++", "rust", "golang",
    // platform
    "dsa", "codedsa", "visualiz", "topic", "practice", "tutor", "learn", "explain",
];

/// Vocabulary of unrelated domains; any substring hit rejects the text
const OFF_TOPIC_TERMS: &[&str] = &[
    "weather", "forecast", "temperature outside", "recipe", "cook", "bake", "restaurant",
    "movie", "film", "tv show", "netflix", "series episode", "celebrity", "song", "lyrics",
    "music", "concert", "football", "soccer", "basketball", "cricket", "politic",
    "election", "president", "horoscope", "zodiac", "astrology",
    "girlfriend", "boyfriend", "relationship advice", "stock price", "crypto price",
    "bitcoin price", "lottery", "vacation", "travel", "hotel", "flight", "fashion",
    "makeup", "diet", "workout", "joke", "poem", "medical", "symptom", "doctor",
];

/// Why a question was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    /// A block-list term was found
    NonDsaTopic,
    /// No domain term and longer than the ambiguity threshold
    OffTopicAndTooLong,
}

impl RejectionReason {
    /// Stable label for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NonDsaTopic => "non-dsa-topic",
            Self::OffTopicAndTooLong => "off-topic-and-too-long",
        }
    }
}

/// Outcome of classifying one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Whether any domain term was found
    pub in_domain: bool,
    /// Set when the question must not reach the model
    pub rejected_reason: Option<RejectionReason>,
}

impl ClassificationResult {
    /// Whether the question was rejected
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.rejected_reason.is_some()
    }
}

/// Pluggable topic classification strategy
pub trait TopicClassifier: Send + Sync {
    /// Classify the latest user question
    fn classify(&self, text: &str) -> ClassificationResult;

    /// Reply returned when a question is rejected
    fn refusal_message(&self) -> &str {
        REFUSAL_MESSAGE
    }
}

/// Allow-list / block-list substring classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    max_ambiguous_len: usize,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AMBIGUOUS_LEN)
    }
}

impl KeywordClassifier {
    /// Create a classifier with the given ambiguity threshold (in characters)
    #[must_use]
    pub const fn new(max_ambiguous_len: usize) -> Self {
        Self { max_ambiguous_len }
    }

    /// Longest keyword-free text that is still passed through
    #[must_use]
    pub const fn max_ambiguous_len(&self) -> usize {
        self.max_ambiguous_len
    }
}

impl TopicClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ClassificationResult {
        let lowered = text.to_lowercase();
        let in_domain = DOMAIN_TERMS.iter().any(|term| lowered.contains(term));
        let off_topic = OFF_TOPIC_TERMS.iter().any(|term| lowered.contains(term));

        let rejected_reason = if off_topic {
            Some(RejectionReason::NonDsaTopic)
        } else if !in_domain && lowered.trim().chars().count() > self.max_ambiguous_len {
            Some(RejectionReason::OffTopicAndTooLong)
        } else {
            None
        };

        ClassificationResult {
            in_domain,
            rejected_reason,
        }
    }
}
