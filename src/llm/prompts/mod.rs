// ABOUTME: Tutor system prompt loaded at compile time and the per-request prompt composer
// ABOUTME: Re-exports the composer, prompt context and supported code languages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

//! # Prompts
//!
//! The fixed tutor instructions live in a markdown file so they can be edited
//! without touching code. [`PromptComposer`] combines them with the rolling
//! conversation and per-request directives.

mod composer;

pub use composer::{CodeLanguage, PromptComposer, PromptContext};

/// DSA tutor system prompt
///
/// Contains the persona, allowed scope, answer template and policies.
pub const TUTOR_SYSTEM_PROMPT: &str = include_str!("tutor_system.md");

/// Get the system prompt for the DSA tutor
#[must_use]
pub const fn get_tutor_system_prompt() -> &'static str {
    TUTOR_SYSTEM_PROMPT
}
