// ABOUTME: Integration tests for the completion gateway state machine
// ABOUTME: Exercises quota bookkeeping around dispatch without the HTTP layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{init_test_logging, Script, ScriptedLlmProvider};
use codedsa_gateway::classifier::KeywordClassifier;
use codedsa_gateway::gateway::{ChatTurnRequest, CompletionGateway, DispatchSettings, GatewayReply};
use codedsa_gateway::llm::prompts::{CodeLanguage, PromptComposer};
use codedsa_gateway::llm::ChatMessage;
use codedsa_gateway::quota::{InMemoryQuotaStore, QuotaDecision, QuotaLimits, QuotaStore};

fn gateway(store: Arc<InMemoryQuotaStore>, provider: Arc<ScriptedLlmProvider>) -> CompletionGateway {
    init_test_logging();
    CompletionGateway::new(
        store,
        Arc::new(KeywordClassifier::default()),
        PromptComposer::new(CodeLanguage::Python).unwrap(),
        provider,
        DispatchSettings::default(),
    )
}

fn turn(text: &str, session: &str) -> ChatTurnRequest {
    ChatTurnRequest {
        messages: vec![ChatMessage::user(text)],
        session_id: Some(session.to_owned()),
    }
}

fn limits(session_cap: u32, daily_ip_cap: u32) -> QuotaLimits {
    QuotaLimits {
        session_cap,
        daily_ip_cap,
    }
}

#[tokio::test]
async fn test_answer_commits_one_question() {
    let store = Arc::new(InMemoryQuotaStore::new(limits(3, 3)));
    let provider = ScriptedLlmProvider::replying(&["answer"]);
    let gateway = gateway(store.clone(), provider);

    let reply = gateway
        .handle(turn("explain dijkstra", "g1"), "10.1.0.1")
        .await
        .unwrap();

    match reply {
        GatewayReply::Answer { snapshot, .. } => {
            assert_eq!(snapshot.session_used, 1);
            assert_eq!(snapshot.session_remaining, 2);
            assert_eq!(snapshot.ip_used, 1);
            assert_eq!(snapshot.ip_remaining, 2);
        }
        _ => panic!("expected a streamed answer"),
    }
}

#[tokio::test]
async fn test_dropped_request_releases_reservation() {
    let store = Arc::new(InMemoryQuotaStore::new(limits(1, 1)));
    let provider = ScriptedLlmProvider::new(Script::NeverDispatch);
    let gateway = gateway(store.clone(), provider.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        gateway.handle(turn("explain dijkstra", "g2"), "10.1.0.2"),
    )
    .await;
    assert!(outcome.is_err(), "dispatch should still be pending");
    assert_eq!(provider.calls(), 1);

    // The release runs on a spawned task
    tokio::time::sleep(Duration::from_millis(50)).await;

    let decision = store
        .check_and_reserve("g2", "10.1.0.2", Utc::now())
        .await
        .unwrap();
    assert!(matches!(decision, QuotaDecision::Allowed(_)));
}

#[tokio::test]
async fn test_rejection_reports_released_counters() {
    let store = Arc::new(InMemoryQuotaStore::new(limits(5, 5)));
    let provider = ScriptedLlmProvider::replying(&["answer"]);
    let gateway = gateway(store, provider.clone());

    let reply = gateway
        .handle(turn("what's the weather forecast for tomorrow?", "g3"), "10.1.0.3")
        .await
        .unwrap();

    match reply {
        GatewayReply::Rejected { snapshot, .. } => {
            assert_eq!(snapshot.session_used, 0);
            assert_eq!(snapshot.session_remaining, 5);
            assert_eq!(snapshot.ip_remaining, 5);
        }
        _ => panic!("expected a refusal"),
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_turns_never_exceed_session_cap() {
    let store = Arc::new(InMemoryQuotaStore::new(limits(3, 100)));
    let provider = ScriptedLlmProvider::replying(&["answer"]);
    let gateway = Arc::new(gateway(store, provider.clone()));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                gateway
                    .handle(turn("explain a hash map", "g4"), "10.1.0.4")
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut answered = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), GatewayReply::Answer { .. }) {
            answered += 1;
        }
    }

    assert_eq!(answered, 3);
    assert_eq!(provider.calls(), 3);
}
