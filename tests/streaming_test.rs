// ABOUTME: Integration tests for streaming replies and client disconnects
// ABOUTME: Verifies deltas arrive incrementally and a dropped body cancels the provider stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::time::Duration;

use common::{create_test_router, test_config, Script, ScriptedLlmProvider};
use futures_util::StreamExt;
use helpers::axum_test::AxumTestRequest;
use serde_json::json;

#[tokio::test]
async fn test_first_delta_arrives_before_stream_completes() {
    let provider = ScriptedLlmProvider::new(Script::Hang(vec!["A heap is ".into()]));
    let app = create_test_router(test_config(36, 15), provider.clone()).await;

    let response = AxumTestRequest::post("/api/chat")
        .json(&json!({
            "messages": [{ "role": "user", "content": "what is a heap?" }],
            "sessionId": "stream-1"
        }))
        .send_streaming(app)
        .await;
    assert_eq!(response.status(), 200);

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("first delta should arrive while the provider is still streaming")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"A heap is ");
    assert!(!provider.stream_dropped());

    drop(body);
    assert!(provider.stream_dropped());
}

#[tokio::test]
async fn test_completed_stream_releases_provider_stream() {
    let provider = ScriptedLlmProvider::replying(&["done"]);
    let app = create_test_router(test_config(36, 15), provider.clone()).await;

    let response = AxumTestRequest::post("/api/chat")
        .json(&json!({
            "messages": [{ "role": "user", "content": "what is a trie?" }],
            "sessionId": "stream-2"
        }))
        .send(app)
        .await;

    assert_eq!(response.text(), "done");
    assert!(provider.stream_dropped());
}
