// ABOUTME: Quota bookkeeping headers attached to chat responses
// ABOUTME: Tells the widget how many questions remain and which limit was hit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Quota Headers
//!
//! Every `/api/chat` response carries `X-Questions-Remaining`. The other
//! headers appear only when they apply.

use http::{HeaderMap, HeaderValue};

/// HTTP header names for quota bookkeeping
pub mod headers {
    /// Session questions still available
    pub const X_QUESTIONS_REMAINING: &str = "x-questions-remaining";
    /// Questions still available to this client IP today
    pub const X_DAILY_QUESTIONS_REMAINING: &str = "x-daily-questions-remaining";
    /// Ordinal of the accepted question within its session
    pub const X_QUESTION_NUMBER: &str = "x-question-number";
    /// Which limit stopped the request: `session` or `ip`
    pub const X_LIMIT_REACHED: &str = "x-limit-reached";
    /// Present with `true` when the question was refused without a model call
    pub const X_REJECTED: &str = "x-rejected";

    /// Headers a cross-origin client may read
    pub const EXPOSED: [&str; 5] = [
        X_QUESTIONS_REMAINING,
        X_DAILY_QUESTIONS_REMAINING,
        X_QUESTION_NUMBER,
        X_LIMIT_REACHED,
        X_REJECTED,
    ];
}

/// Limit that ended a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Per-session cap
    Session,
    /// Per-IP daily cap
    Ip,
}

impl LimitKind {
    /// Header value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Ip => "ip",
        }
    }
}

/// Values for the quota headers of one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaHeaderInfo {
    /// Session questions still available
    pub questions_remaining: u32,
    /// IP questions still available today, when known
    pub daily_remaining: Option<u32>,
    /// Accepted question ordinal, only for answered questions
    pub question_number: Option<u32>,
    /// Limit hit, if any
    pub limit_reached: Option<LimitKind>,
    /// Whether the question was refused
    pub rejected: bool,
}

/// Create a `HeaderMap` with the quota headers
#[must_use]
pub fn create_quota_headers(info: &QuotaHeaderInfo) -> HeaderMap {
    let mut map = HeaderMap::new();

    map.insert(
        headers::X_QUESTIONS_REMAINING,
        HeaderValue::from(info.questions_remaining),
    );

    if let Some(daily) = info.daily_remaining {
        map.insert(headers::X_DAILY_QUESTIONS_REMAINING, HeaderValue::from(daily));
    }

    if let Some(number) = info.question_number {
        map.insert(headers::X_QUESTION_NUMBER, HeaderValue::from(number));
    }

    if let Some(limit) = info.limit_reached {
        map.insert(
            headers::X_LIMIT_REACHED,
            HeaderValue::from_static(limit.as_str()),
        );
    }

    if info.rejected {
        map.insert(headers::X_REJECTED, HeaderValue::from_static("true"));
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_remaining_is_always_present() {
        let map = create_quota_headers(&QuotaHeaderInfo {
            questions_remaining: 35,
            ..QuotaHeaderInfo::default()
        });
        assert_eq!(map.len(), 1);
        assert_eq!(map[headers::X_QUESTIONS_REMAINING], "35");
    }

    #[test]
    fn test_limit_and_rejected_flags() {
        let map = create_quota_headers(&QuotaHeaderInfo {
            questions_remaining: 4,
            daily_remaining: Some(0),
            limit_reached: Some(LimitKind::Ip),
            ..QuotaHeaderInfo::default()
        });
        assert_eq!(map[headers::X_LIMIT_REACHED], "ip");
        assert_eq!(map[headers::X_DAILY_QUESTIONS_REMAINING], "0");
        assert!(map.get(headers::X_REJECTED).is_none());

        let map = create_quota_headers(&QuotaHeaderInfo {
            rejected: true,
            ..QuotaHeaderInfo::default()
        });
        assert_eq!(map[headers::X_REJECTED], "true");
    }
}
