// ABOUTME: SSE (Server-Sent Events) line-buffering parser for streaming completion responses
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # SSE Stream Parser
//!
//! The hosted completion API answers streaming requests with a
//! `text/event-stream` body. TCP chunks do not line up with SSE events: one
//! chunk may carry several events, and a JSON payload may be split across two
//! chunks. [`SseLineBuffer`] accumulates bytes until a full line is available
//! and [`create_sse_stream`] turns the raw byte stream into [`StreamChunk`]s.

use std::mem;

use async_stream::stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Line-buffering SSE parser
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes, returning every event completed by them
    ///
    /// Bytes are buffered undecoded so a multi-byte UTF-8 character split
    /// across two chunks is decoded intact once its line completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not terminated by a newline
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&remaining))
            .into_iter()
            .collect()
    }
}

/// Parse one SSE line; non-data fields (`event:`, `id:`, `retry:`, comments) are ignored
fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    let data = trimmed.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if data.is_empty() {
        return None;
    }
    Some(SseEvent::Data(data.to_owned()))
}

/// Create a buffered SSE stream from a raw byte stream
///
/// `parse_data` converts one JSON payload into a chunk, or `None` to skip
/// events that carry no output. Empty non-final deltas are filtered out and
/// the stream ends after the first final chunk.
pub fn create_sse_stream<S, E, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let chunks = stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut parser = SseLineBuffer::new();

        'read: loop {
            let events = match byte_stream.next().await {
                Some(Ok(bytes)) => parser.feed(&bytes),
                Some(Err(e)) => {
                    yield Err(AppError::external_service(
                        provider_name,
                        format!("Stream read error: {e}"),
                    ));
                    break 'read;
                }
                None => {
                    for event in parser.flush() {
                        if let Some(item) = event_to_chunk(event, &parse_data) {
                            yield item;
                        }
                    }
                    break 'read;
                }
            };

            for event in events {
                if let Some(item) = event_to_chunk(event, &parse_data) {
                    let is_final = matches!(&item, Ok(chunk) if chunk.is_final);
                    yield item;
                    if is_final {
                        break 'read;
                    }
                }
            }
        }
    };

    let filtered = chunks.filter(|result| {
        futures_util::future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

fn event_to_chunk<F>(event: SseEvent, parse_data: &F) -> Option<Result<StreamChunk, AppError>>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    match event {
        SseEvent::Data(json_str) => parse_data(&json_str),
        SseEvent::Done => Some(Ok(StreamChunk::done("stop"))),
    }
}
