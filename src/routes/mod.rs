// ABOUTME: HTTP route definitions for the chat gateway
// ABOUTME: Chat and health endpoints, each exposing a `routes(state)` constructor
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

/// Chat endpoint
pub mod chat;
/// Health endpoint
pub mod health;

pub use chat::ChatRoutes;
pub use health::{HealthResponse, HealthRoutes};
