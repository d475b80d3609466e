// ABOUTME: Completion gateway implementing the per-request chat state machine
// ABOUTME: Quota reservation, topic screening, prompt composition, dispatch and quota commit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Completion Gateway
//!
//! One call to [`CompletionGateway::handle`] serves one `POST /api/chat`:
//!
//! 1. Resolve the session key (client supplied, or `anonymous:<ip>`).
//! 2. Reserve a slot against the session cap, then the daily IP cap.
//! 3. Screen the latest user question with the [`TopicClassifier`].
//! 4. Compose the tutoring prompt.
//! 5. Dispatch a streaming completion request.
//! 6. Commit the reserved slot once the provider accepted the request.
//! 7. Hand the token stream to a [`ReplyStream`].
//!
//! Limit hits and refusals are replies, not errors. The reserved slot is
//! released whenever the request ends before step 6, including when the
//! request future itself is dropped.

use std::sync::Arc;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::{header, HeaderValue, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::classifier::{KeywordClassifier, TopicClassifier};
use crate::config::{LlmConfig, ServerConfig};
use crate::constants::quota::ANONYMOUS_SESSION_PREFIX;
use crate::errors::AppResult;
use crate::llm::prompts::PromptComposer;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, MessageRole};
use crate::middleware::{create_quota_headers, LimitKind, QuotaHeaderInfo};
use crate::quota::{QuotaDecision, QuotaLimits, QuotaSnapshot, QuotaStore, Reservation};
use crate::streaming::ReplyStream;

/// Reply to a conversation without any user question
pub const EMPTY_CONVERSATION_MESSAGE: &str =
    "Ask me anything about data structures or algorithms and I'll walk you through it.";

/// Longest session id accepted; longer ids fall back to the anonymous key
pub const MAX_SESSION_ID_CHARS: usize = 128;

/// Reply once a session has used all of its questions
#[must_use]
pub fn session_limit_message(session_cap: u32) -> String {
    format!(
        "You've used all {session_cap} questions for this chat session. \
         Start a new session to keep practicing."
    )
}

/// Reply once a client IP has used all of today's questions
#[must_use]
pub fn ip_limit_message(daily_ip_cap: u32) -> String {
    format!(
        "You've reached today's limit of {daily_ip_cap} questions. \
         Come back tomorrow to keep practicing."
    )
}

// ============================================================================
// Request
// ============================================================================

/// One chat turn as sent by the widget
///
/// Parsing never fails: a malformed body yields no messages and no session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTurnRequest {
    /// Conversation so far, `user` and `assistant` entries only
    pub messages: Vec<ChatMessage>,
    /// Client-generated session id
    pub session_id: Option<String>,
}

impl ChatTurnRequest {
    /// Parse a raw request body
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice::<Value>(body).map_or_else(
            |e| {
                debug!("Malformed chat request body: {}", e);
                Self::default()
            },
            |value| Self::from_value(&value),
        )
    }

    /// Extract the fields from a parsed JSON value
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let messages = value
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_message).collect())
            .unwrap_or_default();

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .filter(|id| {
                let fits = id.chars().count() <= MAX_SESSION_ID_CHARS;
                if !fits {
                    debug!(
                        "Ignoring session id longer than {} characters",
                        MAX_SESSION_ID_CHARS
                    );
                }
                fits
            })
            .map(str::to_owned);

        Self {
            messages,
            session_id,
        }
    }

    /// Session key used for quota accounting
    #[must_use]
    pub fn session_key(&self, client_ip: &str) -> String {
        self.session_id
            .clone()
            .unwrap_or_else(|| format!("{ANONYMOUS_SESSION_PREFIX}{client_ip}"))
    }

    /// Most recent user message with non-blank content
    #[must_use]
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
    }
}

fn parse_message(item: &Value) -> Option<ChatMessage> {
    let role = match item.get("role")?.as_str()? {
        "user" => MessageRole::User,
        "assistant" => MessageRole::Assistant,
        _ => return None,
    };
    let content = item.get("content")?.as_str()?;
    Some(ChatMessage::new(role, content))
}

// ============================================================================
// Reply
// ============================================================================

/// Outcome of one chat turn
pub enum GatewayReply {
    /// A quota cap stopped the request before any model call
    LimitReached {
        /// Cap that was hit
        limit: LimitKind,
        /// Explanation shown to the learner
        message: String,
        /// Session questions still available
        session_remaining: u32,
    },
    /// No model call was made: empty conversation or out-of-scope question
    Rejected {
        /// Reply text
        message: String,
        /// Counters after the reservation was released
        snapshot: QuotaSnapshot,
    },
    /// The streamed model answer
    Answer {
        /// Plain-text body
        body: ReplyStream,
        /// Counters after the question was committed
        snapshot: QuotaSnapshot,
    },
}

impl GatewayReply {
    /// HTTP status of the reply
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::LimitReached {
                limit: LimitKind::Ip,
                ..
            } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::OK,
        }
    }

    /// Values for the quota headers
    #[must_use]
    pub const fn header_info(&self) -> QuotaHeaderInfo {
        match self {
            Self::LimitReached {
                limit: LimitKind::Session,
                ..
            } => QuotaHeaderInfo {
                questions_remaining: 0,
                daily_remaining: None,
                question_number: None,
                limit_reached: Some(LimitKind::Session),
                rejected: false,
            },
            Self::LimitReached {
                limit: LimitKind::Ip,
                session_remaining,
                ..
            } => QuotaHeaderInfo {
                questions_remaining: *session_remaining,
                daily_remaining: Some(0),
                question_number: None,
                limit_reached: Some(LimitKind::Ip),
                rejected: false,
            },
            Self::Rejected { snapshot, .. } => QuotaHeaderInfo {
                questions_remaining: snapshot.session_remaining,
                daily_remaining: Some(snapshot.ip_remaining),
                question_number: None,
                limit_reached: None,
                rejected: true,
            },
            Self::Answer { snapshot, .. } => QuotaHeaderInfo {
                questions_remaining: snapshot.session_remaining,
                daily_remaining: Some(snapshot.ip_remaining),
                question_number: Some(snapshot.session_used),
                limit_reached: None,
                rejected: false,
            },
        }
    }
}

impl IntoResponse for GatewayReply {
    fn into_response(self) -> Response {
        let status = self.status();
        let quota_headers = create_quota_headers(&self.header_info());

        let body = match self {
            Self::LimitReached { message, .. } | Self::Rejected { message, .. } => {
                Body::from(message)
            }
            Self::Answer { body, .. } => Body::from_stream(body),
        };

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.extend(quota_headers);
        response
    }
}

// ============================================================================
// Reservation guard
// ============================================================================

/// Owns a pending quota slot until it is committed or released
///
/// Dropping an armed guard releases the slot on a spawned task.
struct ReservationGuard {
    store: Arc<dyn QuotaStore>,
    reservation: Reservation,
    armed: bool,
}

impl ReservationGuard {
    const fn new(store: Arc<dyn QuotaStore>, reservation: Reservation) -> Self {
        Self {
            store,
            reservation,
            armed: true,
        }
    }

    async fn commit(mut self) -> AppResult<QuotaSnapshot> {
        let snapshot = self.store.commit(&self.reservation).await?;
        self.armed = false;
        Ok(snapshot)
    }

    /// Release the slot; on backend failure the counters are estimated
    async fn release(mut self) -> QuotaSnapshot {
        let released = self.store.release(&self.reservation).await;
        self.armed = false;
        match released {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    session = %self.reservation.session_id,
                    "Failed to release quota reservation: {}",
                    e
                );
                released_estimate(self.store.limits(), &self.reservation)
            }
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                session = %self.reservation.session_id,
                "No runtime to release abandoned quota reservation"
            );
            return;
        };

        let store = Arc::clone(&self.store);
        let reservation = self.reservation.clone();
        handle.spawn(async move {
            match store.release(&reservation).await {
                Ok(_) => debug!(
                    session = %reservation.session_id,
                    "Released quota reservation of abandoned request"
                ),
                Err(e) => warn!(
                    session = %reservation.session_id,
                    "Failed to release abandoned quota reservation: {}",
                    e
                ),
            }
        });
    }
}

fn released_estimate(limits: QuotaLimits, reservation: &Reservation) -> QuotaSnapshot {
    let session_remaining = reservation
        .session_remaining
        .saturating_add(1)
        .min(limits.session_cap);
    let ip_remaining = reservation
        .ip_remaining
        .saturating_add(1)
        .min(limits.daily_ip_cap);
    QuotaSnapshot {
        session_used: limits.session_cap - session_remaining,
        session_remaining,
        ip_used: limits.daily_ip_cap - ip_remaining,
        ip_remaining,
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Parameters of every completion request
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token bound
    pub max_tokens: u32,
}

impl DispatchSettings {
    /// Settings from the provider configuration
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// Per-request chat state machine
pub struct CompletionGateway {
    quota: Arc<dyn QuotaStore>,
    classifier: Arc<dyn TopicClassifier>,
    composer: PromptComposer,
    provider: Arc<dyn LlmProvider>,
    settings: DispatchSettings,
}

impl CompletionGateway {
    /// Assemble a gateway from its parts
    #[must_use]
    pub fn new(
        quota: Arc<dyn QuotaStore>,
        classifier: Arc<dyn TopicClassifier>,
        composer: PromptComposer,
        provider: Arc<dyn LlmProvider>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            quota,
            classifier,
            composer,
            provider,
            settings,
        }
    }

    /// Build a gateway with the keyword classifier and configured composer
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt composer cannot be built
    pub fn from_config(
        config: &ServerConfig,
        quota: Arc<dyn QuotaStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        let classifier = Arc::new(KeywordClassifier::new(config.classifier.max_ambiguous_len));
        let composer = PromptComposer::new(config.prompt.default_code_language)?;
        Ok(Self::new(
            quota,
            classifier,
            composer,
            provider,
            DispatchSettings::from_config(&config.llm),
        ))
    }

    /// Quota backend in use
    #[must_use]
    pub fn quota_backend(&self) -> &'static str {
        self.quota.backend_name()
    }

    /// Whether the completion provider has credentials
    #[must_use]
    pub fn llm_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Serve one chat turn
    ///
    /// # Errors
    ///
    /// Returns an error if the quota backend fails or the provider rejects
    /// the completion request
    pub async fn handle(
        &self,
        request: ChatTurnRequest,
        client_ip: &str,
    ) -> AppResult<GatewayReply> {
        let session_id = request.session_key(client_ip);
        let limits = self.quota.limits();

        let decision = self
            .quota
            .check_and_reserve(&session_id, client_ip, Utc::now())
            .await?;

        let reservation = match decision {
            QuotaDecision::Allowed(reservation) => reservation,
            QuotaDecision::SessionLimitReached => {
                info!(
                    session = %session_id,
                    ip = %client_ip,
                    decision = "session_limit",
                    "Session question limit reached"
                );
                return Ok(GatewayReply::LimitReached {
                    limit: LimitKind::Session,
                    message: session_limit_message(limits.session_cap),
                    session_remaining: 0,
                });
            }
            QuotaDecision::IpLimitReached { session_remaining } => {
                info!(
                    session = %session_id,
                    ip = %client_ip,
                    decision = "ip_limit",
                    "Daily IP question limit reached"
                );
                return Ok(GatewayReply::LimitReached {
                    limit: LimitKind::Ip,
                    message: ip_limit_message(limits.daily_ip_cap),
                    session_remaining,
                });
            }
        };
        let guard = ReservationGuard::new(Arc::clone(&self.quota), reservation);

        let Some(question) = request.latest_user_text() else {
            debug!(
                session = %session_id,
                ip = %client_ip,
                decision = "empty",
                "Conversation has no user question"
            );
            let snapshot = guard.release().await;
            return Ok(GatewayReply::Rejected {
                message: EMPTY_CONVERSATION_MESSAGE.to_owned(),
                snapshot,
            });
        };

        let classification = self.classifier.classify(question);
        if let Some(reason) = classification.rejected_reason {
            info!(
                session = %session_id,
                ip = %client_ip,
                decision = "rejected",
                reason = reason.as_str(),
                "Question outside tutoring scope"
            );
            let snapshot = guard.release().await;
            return Ok(GatewayReply::Rejected {
                message: self.classifier.refusal_message().to_owned(),
                snapshot,
            });
        }

        let context = self.composer.compose(&request.messages, question);
        let chat_request = ChatRequest::new(context.to_messages())
            .with_model(self.settings.model.as_str())
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .with_streaming();

        let stream = match self.provider.complete_stream(&chat_request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(
                    session = %session_id,
                    ip = %client_ip,
                    decision = "dispatch_failed",
                    provider = self.provider.name(),
                    "Completion request failed: {}",
                    e
                );
                guard.release().await;
                return Err(e);
            }
        };

        let snapshot = guard.commit().await?;
        info!(
            session = %session_id,
            ip = %client_ip,
            decision = "answered",
            question_number = snapshot.session_used,
            language = %context.preferred_code_language,
            code_first = context.code_first,
            "Question accepted"
        );

        Ok(GatewayReply::Answer {
            body: ReplyStream::new(stream, session_id),
            snapshot,
        })
    }
}
