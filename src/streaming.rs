// ABOUTME: Response stream adapter from provider token chunks to HTTP body bytes
// ABOUTME: Ends cleanly on provider errors and cancels upstream when the client disconnects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Response Stream Adapter
//!
//! [`ReplyStream`] forwards every non-empty delta of a [`ChatStream`] as soon
//! as it arrives. The body never fails from the client's point of view: a
//! provider error mid-answer is logged and the stream simply ends.
//!
//! The provider stream is owned by the adapter, so when axum drops the
//! response body (client went away) the upstream HTTP response is dropped
//! with it and the request to the provider is aborted.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tracing::{debug, info, warn};

use crate::llm::ChatStream;

/// Plain-text body stream for one accepted question
pub struct ReplyStream {
    inner: ChatStream,
    session_id: String,
    finished: bool,
    bytes_sent: usize,
}

impl ReplyStream {
    /// Wrap a provider stream
    #[must_use]
    pub fn new(inner: ChatStream, session_id: impl Into<String>) -> Self {
        Self {
            inner,
            session_id: session_id.into(),
            finished: false,
            bytes_sent: 0,
        }
    }

    /// Whether the provider stream has ended
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes forwarded so far
    #[must_use]
    pub const fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    fn finish(&mut self) {
        self.finished = true;
        debug!(
            session = %self.session_id,
            bytes_sent = self.bytes_sent,
            "Reply stream completed"
        );
    }

    fn forward(&mut self, delta: String) -> Bytes {
        self.bytes_sent += delta.len();
        Bytes::from(delta)
    }
}

impl Stream for ReplyStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) if chunk.is_final => {
                    this.finish();
                    if chunk.delta.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(this.forward(chunk.delta))));
                }
                Some(Ok(chunk)) => {
                    if chunk.delta.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(this.forward(chunk.delta))));
                }
                Some(Err(e)) => {
                    warn!(
                        session = %this.session_id,
                        bytes_sent = this.bytes_sent,
                        "Provider stream failed mid-answer: {}",
                        e
                    );
                    this.finish();
                    return Poll::Ready(None);
                }
                None => {
                    this.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                session = %self.session_id,
                bytes_sent = self.bytes_sent,
                "Client disconnected before the reply completed; cancelling upstream request"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::llm::StreamChunk;
    use futures_util::StreamExt;

    fn stream_of(items: Vec<Result<StreamChunk, AppError>>) -> ChatStream {
        Box::pin(futures_util::stream::iter(items))
    }

    #[tokio::test]
    async fn test_forwards_non_empty_deltas_until_final() {
        let inner = stream_of(vec![
            Ok(StreamChunk::delta("Merge ")),
            Ok(StreamChunk::delta("")),
            Ok(StreamChunk::delta("sort")),
            Ok(StreamChunk::done("stop")),
            Ok(StreamChunk::delta("ignored")),
        ]);
        let mut reply = ReplyStream::new(inner, "s1");

        let mut out = Vec::new();
        while let Some(chunk) = reply.next().await {
            out.push(chunk.unwrap());
        }

        assert_eq!(out, vec![Bytes::from("Merge "), Bytes::from("sort")]);
        assert!(reply.is_finished());
        assert_eq!(reply.bytes_sent(), 10);
    }

    #[tokio::test]
    async fn test_mid_stream_error_ends_cleanly() {
        let inner = stream_of(vec![
            Ok(StreamChunk::delta("partial")),
            Err(AppError::internal("connection reset")),
            Ok(StreamChunk::delta("never sent")),
        ]);
        let reply = ReplyStream::new(inner, "s1");

        let collected: Vec<_> = reply.collect().await;
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].as_ref().unwrap(), &Bytes::from("partial"));
    }
}
