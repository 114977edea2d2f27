use std::fmt;

use anyhow::Result;
use regex::RegexSet;

use crate::platform::IncomingMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    TooLong,
    CodePattern,
    None,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::TooLong => write!(f, "too_long"),
            Reason::CodePattern => write!(f, "code_pattern"),
            Reason::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub should_paste: bool,
    pub reason: Reason,
}

impl ClassificationResult {
    fn paste(reason: Reason) -> Self {
        Self {
            should_paste: true,
            reason,
        }
    }

    fn skip() -> Self {
        Self {
            should_paste: false,
            reason: Reason::None,
        }
    }
}

/// Structural and keyword signals that mark a message as code.
/// Line-anchored where the same characters are common in prose or URLs.
const CODE_SIGNALS: &[&str] = &[
    // fenced code block
    r"```",
    // assignment: `x = 1`, `let x = 1`, `x := 1` (but not `==`)
    r"(?m)^\s*((let|const|var|val|mut)\s+)?[A-Za-z_][\w.]*\s*(:=|=([^=]|$))",
    // definition and import keywords
    r"(?m)^\s*#?\s*(def|function|func|import|require|include)\b",
    // paired brackets: `foo()`, `[]`, `{}`, or a line opening/closing a block
    r"\(\)|\[\]|\{\}",
    r"(?m)^\s*[{}\[\]]",
    // call with arguments: `print("hi")`, `console.log(user.name)`
    r"[A-Za-z_][\w.]*\([^()\n]*\)",
    // braced block holding a statement: `{ return a; }`
    r"\{[^{}]*;[^{}]*\}",
    // comment markers, leading or trailing code
    r"(?m)^\s*(//|#)",
    r"[;{}()\]]\s*//",
    r"(?s)/\*.*\*/",
];

/// Content-only paste decision. Chat kind is filtered before this runs.
#[derive(Debug)]
pub struct Qualifier {
    min_length: usize,
    signals: RegexSet,
}

impl Qualifier {
    pub fn new(min_length: usize) -> Result<Self> {
        Ok(Self {
            min_length,
            signals: RegexSet::new(CODE_SIGNALS)?,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn should_create_paste(&self, message: &IncomingMessage) -> ClassificationResult {
        let text = &message.text;

        if text.chars().count() > self.min_length {
            return ClassificationResult::paste(Reason::TooLong);
        }

        if self.signals.is_match(text) {
            return ClassificationResult::paste(Reason::CodePattern);
        }

        ClassificationResult::skip()
    }
}
