// ABOUTME: Builds the tutoring prompt from the conversation history and the latest question
// ABOUTME: Detects the requested code language and explicit code requests to add answer directives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 CodeDSA

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::get_tutor_system_prompt;
use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;

/// Programming languages the tutor can be asked to answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    /// Python
    #[default]
    Python,
    /// JavaScript
    JavaScript,
    /// TypeScript
    TypeScript,
    /// Java
    Java,
    /// C++
    Cpp,
    /// C#
    CSharp,
    /// Go
    Go,
    /// Rust
    Rust,
    /// Kotlin
    Kotlin,
    /// Swift
    Swift,
    /// C
    C,
}

/// Alias table, checked in order; the first alias found in the question wins
const LANGUAGE_ALIASES: &[(&str, CodeLanguage)] = &[
    ("python", CodeLanguage::Python),
    ("py", CodeLanguage::Python),
    ("javascript", CodeLanguage::JavaScript),
    ("js", CodeLanguage::JavaScript),
    ("typescript", CodeLanguage::TypeScript),
    ("ts", CodeLanguage::TypeScript),
    ("java", CodeLanguage::Java),
    ("c++", CodeLanguage::Cpp),
    ("cpp", CodeLanguage::Cpp),
    ("c#", CodeLanguage::CSharp),
    ("csharp", CodeLanguage::CSharp),
    ("golang", CodeLanguage::Go),
    ("go", CodeLanguage::Go),
    ("rust", CodeLanguage::Rust),
    ("kotlin", CodeLanguage::Kotlin),
    ("swift", CodeLanguage::Swift),
    ("c", CodeLanguage::C),
];

impl CodeLanguage {
    /// Tag used on fenced code blocks
    #[must_use]
    pub const fn fence_tag(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::C => "c",
        }
    }

    /// Human-readable language name
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Java => "Java",
            Self::Cpp => "C++",
            Self::CSharp => "C#",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::Kotlin => "Kotlin",
            Self::Swift => "Swift",
            Self::C => "C",
        }
    }

    /// Resolve an alias such as `js` or `c++`
    #[must_use]
    pub fn from_alias(alias: &str) -> Option<Self> {
        let alias = alias.trim().to_lowercase();
        LANGUAGE_ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, language)| *language)
    }

    /// Detect the language requested in a question
    ///
    /// A language counts as requested when one of its aliases appears as
    /// `in <alias>`, as `<alias> code`, or as the final word.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let tokens = tokenize(text);
        let last = tokens.last().map(String::as_str);

        LANGUAGE_ALIASES
            .iter()
            .find(|(alias, _)| {
                last == Some(*alias)
                    || tokens.windows(2).any(|pair| {
                        (pair[0] == "in" && pair[1] == *alias)
                            || (pair[0] == *alias && pair[1] == "code")
                    })
            })
            .map(|(_, language)| *language)
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fence_tag())
    }
}

impl FromStr for CodeLanguage {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s)
            .ok_or_else(|| AppError::config(format!("Unsupported code language: {s}")))
    }
}

/// Lower-case words with surrounding punctuation removed, keeping `+` and `#`
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Everything sent to the model for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// Fixed tutor instructions
    pub system_instructions: String,
    /// Transcript plus the final assistant-turn marker
    pub composed_prompt: String,
    /// Language used for fenced code in the answer
    pub preferred_code_language: CodeLanguage,
    /// Whether the learner explicitly asked for code
    pub code_first: bool,
}

impl PromptContext {
    /// Messages for a chat completion request
    #[must_use]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_instructions.clone()),
            ChatMessage::user(self.composed_prompt.clone()),
        ]
    }
}

/// Composes tutoring prompts
#[derive(Debug, Clone)]
pub struct PromptComposer {
    default_language: CodeLanguage,
    code_request: Regex,
}

impl PromptComposer {
    /// Create a composer that falls back to `default_language`
    ///
    /// # Errors
    ///
    /// Returns an error if the code-request pattern fails to compile
    pub fn new(default_language: CodeLanguage) -> AppResult<Self> {
        let code_request = Regex::new(r"(?i)\b(code|snippet|implement\w*|example|solve|write)\b")
            .map_err(|e| AppError::internal(format!("Invalid code request pattern: {e}")))?;
        Ok(Self {
            default_language,
            code_request,
        })
    }

    /// Language used when the question names none
    #[must_use]
    pub const fn default_language(&self) -> CodeLanguage {
        self.default_language
    }

    /// Whether the question explicitly asks for code
    #[must_use]
    pub fn is_code_request(&self, text: &str) -> bool {
        self.code_request.is_match(text)
    }

    /// Build the prompt context for one turn
    #[must_use]
    pub fn compose(&self, history: &[ChatMessage], latest_user_text: &str) -> PromptContext {
        let preferred_code_language =
            CodeLanguage::detect(latest_user_text).unwrap_or(self.default_language);
        let code_first = self.is_code_request(latest_user_text);

        let mut lines: Vec<String> = history
            .iter()
            .map(|message| format!("{}: {}", message.role.transcript_label(), message.content))
            .collect();
        lines.push(Self::assistant_marker(preferred_code_language, code_first));

        PromptContext {
            system_instructions: get_tutor_system_prompt().to_owned(),
            composed_prompt: lines.join("\n"),
            preferred_code_language,
            code_first,
        }
    }

    fn assistant_marker(language: CodeLanguage, code_first: bool) -> String {
        let fence = language.fence_tag();
        if code_first {
            format!(
                "Assistant (follow the tutor template; lead with a complete ```{fence} code block, \
                 then explain it; do not ask clarifying questions):"
            )
        } else {
            format!(
                "Assistant (follow the tutor template; if you include code, use ```{fence} fenced blocks):"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_plus_and_hash() {
        assert_eq!(tokenize("Show it in C++, please"), vec!["show", "it", "in", "c++", "please"]);
        assert_eq!(tokenize("(C#)"), vec!["c#"]);
    }

    #[test]
    fn test_from_alias() {
        assert_eq!(CodeLanguage::from_alias("JS"), Some(CodeLanguage::JavaScript));
        assert_eq!(CodeLanguage::from_alias("golang"), Some(CodeLanguage::Go));
        assert_eq!(CodeLanguage::from_alias("cobol"), None);
    }
}
