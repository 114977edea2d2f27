//! Heuristic language detection for paste contents.
//!
//! A [`LanguageTable`] is an ordered list of [`LanguagePattern`] groups. Each
//! group carries a set of signatures; the first group (by priority, then by
//! declaration order) with any matching signature decides the language.

use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;

/// Tag sent to the pasting service when nothing better is known
pub const PLAINTEXT: &str = "plaintext";

/// Outcome of a detection run. `Unknown` is not an error; the caller
/// resolves it against the languages the pasting service supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Detected(&'static str),
    Unknown,
}

impl Detection {
    pub fn tag(&self) -> Option<&'static str> {
        match *self {
            Detection::Detected(tag) => Some(tag),
            Detection::Unknown => None,
        }
    }
}

/// A single check against the raw content.
pub enum Signature {
    /// Case-sensitive substring
    Literal(&'static str),
    Pattern(Regex),
    /// Parse-based check for formats a regex can't judge
    Structural(fn(&str) -> bool),
}

impl Signature {
    fn matches(&self, content: &str) -> bool {
        match self {
            Signature::Literal(needle) => content.contains(needle),
            Signature::Pattern(re) => re.is_match(content),
            Signature::Structural(check) => check(content),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Literal(s) => write!(f, "Literal({:?})", s),
            Signature::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
            Signature::Structural(_) => write!(f, "Structural"),
        }
    }
}

#[derive(Debug)]
pub struct LanguagePattern {
    pub language_tag: &'static str,
    pub signatures: Vec<Signature>,
    pub priority: i32,
}

impl LanguagePattern {
    fn new(language_tag: &'static str, priority: i32) -> Self {
        Self {
            language_tag,
            signatures: Vec::new(),
            priority,
        }
    }

    fn literal(mut self, needle: &'static str) -> Self {
        self.signatures.push(Signature::Literal(needle));
        self
    }

    fn pattern(mut self, re: &str) -> Result<Self> {
        let compiled = Regex::new(re)
            .with_context(|| format!("Invalid {} signature: {}", self.language_tag, re))?;
        self.signatures.push(Signature::Pattern(compiled));
        Ok(self)
    }

    fn structural(mut self, check: fn(&str) -> bool) -> Self {
        self.signatures.push(Signature::Structural(check));
        self
    }

    fn matches(&self, content: &str) -> bool {
        self.signatures.iter().any(|s| s.matches(content))
    }
}

const DEFAULT_PRIORITY: i32 = 0;
/// `<?php` and `$this->` never show up in the other languages, while PHP
/// sources routinely contain `function` and `=>`.
const PHP_PRIORITY: i32 = 10;

/// Immutable, load-once signature table.
#[derive(Debug)]
pub struct LanguageTable {
    groups: Vec<LanguagePattern>,
}

impl LanguageTable {
    /// Builds a table from groups in declaration order. Groups are
    /// evaluated by descending priority; equal priorities keep their order.
    pub fn new(mut groups: Vec<LanguagePattern>) -> Self {
        groups.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { groups }
    }

    pub fn builtin() -> Result<Self> {
        let groups = vec![
            LanguagePattern::new("python", DEFAULT_PRIORITY)
                .literal("if __name__ ==")
                .pattern(r"(?m)^\s*def\s+\w+\s*\(")?
                .pattern(r"(?m)^\s*class\s+\w+(\([^)]*\))?\s*:\s*$")?
                .pattern(r"(?m)^\s*from\s+[\w.]+\s+import\s+\w")?
                .pattern(r"(?m)^\s*import\s+[\w.]+(\s+as\s+\w+)?\s*$")?
                .pattern(r"(?m)^\s*elif\s+.+:\s*$")?,
            LanguagePattern::new("javascript", DEFAULT_PRIORITY)
                .literal("console.log(")
                .literal("document.getElementById(")
                .pattern(r"(?m)^\s*(const|let|var)\s+[\w$]+\s*=")?
                .pattern(r"\bfunction\s*[\w$]*\s*\([^)]*\)\s*\{")?
                .pattern(r"\([^()]*\)\s*=>")?
                .pattern(r#"(?m)^\s*import\s+.+\s+from\s+['"]"#)?
                .pattern(r"(?m)^\s*export\s+(default|const|function|class)\b")?,
            LanguagePattern::new("html", DEFAULT_PRIORITY)
                .pattern(r"(?i)<!doctype\s+html")?
                .pattern(r"(?i)<html[\s>]")?
                .pattern(r"(?i)</(head|body|div|span|script|style|p|a|ul|li|table|form)>")?,
            LanguagePattern::new("css", DEFAULT_PRIORITY)
                .pattern(r"(?m)^\s*@media\s+[(\w]")?
                .pattern(r"(?m)^\s*@import\s+url\(")?
                .pattern(
                    r"(?m)^\s*(color|background(-color)?|margin|padding|font(-size|-family|-weight)?|display|position|width|height|border|text-align)\s*:\s*[^;{}\n]+;",
                )?,
            LanguagePattern::new("php", PHP_PRIORITY)
                .literal("<?php")
                .literal("<?=")
                .literal("$this->"),
            LanguagePattern::new("sql", DEFAULT_PRIORITY)
                .pattern(r"\bSELECT\s+.+\s+FROM\s+\w+")?
                .pattern(r"\bINSERT\s+INTO\s+\w+")?
                .pattern(r"\bUPDATE\s+\w+\s+SET\s")?
                .pattern(r"\bDELETE\s+FROM\s+\w+")?
                .pattern(r"\bCREATE\s+(TABLE|INDEX|VIEW|DATABASE)\b")?,
            LanguagePattern::new("java", DEFAULT_PRIORITY)
                .literal("System.out.print")
                .literal("public static void main")
                .pattern(r"(?m)^\s*import\s+java\.")?
                .pattern(r"(?m)^\s*package\s+[\w.]+;")?
                .pattern(r"\b(public|private|protected)\s+(static\s+)?(final\s+)?class\s+\w+")?,
            LanguagePattern::new("cpp", DEFAULT_PRIORITY)
                .literal("std::")
                .literal("using namespace std")
                .pattern(r"(?m)^\s*#include\s*<(iostream|vector|string|map|memory|algorithm)>")?
                .pattern(r"\bcout\s*<<")?
                .pattern(r"\btemplate\s*<")?,
            LanguagePattern::new("c", DEFAULT_PRIORITY)
                .literal("printf(")
                .literal("malloc(")
                .pattern(r"(?m)^\s*#include\s*<\w+\.h>")?
                .pattern(r"\bint\s+main\s*\(")?,
            LanguagePattern::new("bash", DEFAULT_PRIORITY)
                .literal("#!/bin/bash")
                .literal("#!/bin/sh")
                .pattern(r"(?m)^\s*if\s+\[\[?\s.*\]\]?\s*;\s*then\b")?
                .pattern(r"(?m)^\s*(fi|done|esac)\s*$")?
                .pattern(r"(?m)^\s*(sudo\s+)?(apt|apt-get|yum|brew|chmod|chown|mkdir|curl|wget|grep)\s+-")?,
            LanguagePattern::new("json", DEFAULT_PRIORITY).structural(looks_like_json),
            LanguagePattern::new("xml", DEFAULT_PRIORITY)
                .literal("<?xml")
                .pattern(r"<([A-Za-z][\w:.\-]*)[^<>]*>[^<]*</[A-Za-z][\w:.\-]*>")?
                .pattern(r"<[A-Za-z][\w:.\-]*(\s+[^<>]*)?/>")?,
            LanguagePattern::new("yaml", DEFAULT_PRIORITY)
                .pattern(r"(?m)^---\s*$")?
                .pattern(r"(?m)^[\w\-]+:\s*\n\s+[\w\-]+:\s")?
                .pattern(r"(?m)^\s*-\s+[\w\-]+:\s")?,
            LanguagePattern::new("markdown", DEFAULT_PRIORITY)
                .literal("```")
                .pattern(r"(?m)^#{1,6}\s+\S")?
                .pattern(r"\*\*[^*\n]+\*\*")?
                .pattern(r"\[[^\]\n]+\]\([^)\s]+\)")?,
        ];

        Ok(Self::new(groups))
    }

    /// Tags in evaluation order
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.groups.iter().map(|g| g.language_tag)
    }
}

/// A JSON document: an object or array that actually parses.
fn looks_like_json(content: &str) -> bool {
    let trimmed = content.trim();
    let bracketed = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    bracketed && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

/// Interpreter named by a `#!` first line, if any.
fn detect_shebang(content: &str) -> Option<&'static str> {
    let first = content.lines().next()?.trim();
    let interpreter = first.strip_prefix("#!")?;
    if interpreter.contains("python") {
        Some("python")
    } else if interpreter.contains("node") {
        Some("javascript")
    } else if interpreter.contains("bash") || interpreter.contains("sh") {
        Some("bash")
    } else {
        None
    }
}

/// Pure detector over a shared, immutable [`LanguageTable`].
#[derive(Debug)]
pub struct LanguageDetector {
    table: LanguageTable,
}

impl LanguageDetector {
    pub fn new(table: LanguageTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LanguageTable {
        &self.table
    }

    pub fn detect_language(&self, content: &str) -> Detection {
        if content.trim().is_empty() {
            return Detection::Unknown;
        }

        if let Some(tag) = detect_shebang(content) {
            return Detection::Detected(tag);
        }

        self.table
            .groups
            .iter()
            .find(|group| group.matches(content))
            .map(|group| Detection::Detected(group.language_tag))
            .unwrap_or(Detection::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> LanguageDetector {
        LanguageDetector::new(LanguageTable::builtin().unwrap())
    }

    fn detect(content: &str) -> Option<&'static str> {
        detector().detect_language(content).tag()
    }

    #[test]
    fn test_empty_is_unknown() {
        let d = detector();
        assert_eq!(d.detect_language(""), Detection::Unknown);
        assert_eq!(d.detect_language("   \n\t "), Detection::Unknown);
    }

    #[test]
    fn test_plain_prose_is_unknown() {
        let prose = "Had a great time at the meetup yesterday and wanted to say thanks \
                     to everyone who came along and brought snacks and good questions.";
        assert_eq!(detect(prose), None);
    }

    #[test]
    fn test_python_function() {
        assert_eq!(detect("def foo():\n    return 1"), Some("python"));
        assert_eq!(
            detect("from collections import OrderedDict\nx = OrderedDict()"),
            Some("python")
        );
    }

    #[test]
    fn test_php_beats_css_and_json() {
        assert_eq!(detect("<?php { }"), Some("php"));
        assert_eq!(
            detect("<?php\nfunction greet($name) {\n  echo \"hi $name\";\n}\n"),
            Some("php")
        );
    }

    #[test]
    fn test_javascript() {
        assert_eq!(detect("const x = 5;\nconsole.log(x);"), Some("javascript"));
        assert_eq!(detect("items.map((x) => x * 2)"), Some("javascript"));
    }

    #[test]
    fn test_html_and_xml() {
        assert_eq!(
            detect("<!DOCTYPE html>\n<html><body><div>hi</div></body></html>"),
            Some("html")
        );
        assert_eq!(
            detect("<?xml version=\"1.0\"?>\n<note><to>Tove</to></note>"),
            Some("xml")
        );
    }

    #[test]
    fn test_css() {
        assert_eq!(detect(".button {\n  color: red;\n  padding: 4px;\n}"), Some("css"));
    }

    #[test]
    fn test_sql_is_case_sensitive() {
        assert_eq!(detect("SELECT id, name FROM users WHERE id = 1"), Some("sql"));
        assert_eq!(detect("please select one from the list"), None);
    }

    #[test]
    fn test_java_cpp_c() {
        assert_eq!(
            detect("public class Main {\n  public static void main(String[] args) {}\n}"),
            Some("java")
        );
        assert_eq!(
            detect("#include <iostream>\nint main() { std::cout << 1; }"),
            Some("cpp")
        );
        assert_eq!(
            detect("#include <stdio.h>\nint main(void) { printf(\"hi\"); }"),
            Some("c")
        );
    }

    #[test]
    fn test_shebang_decides_first() {
        assert_eq!(detect("#!/usr/bin/env python3\nprint('x')"), Some("python"));
        assert_eq!(detect("#!/usr/bin/env node\nconst a = 1"), Some("javascript"));
        assert_eq!(detect("#!/bin/bash\necho hi"), Some("bash"));
    }

    #[test]
    fn test_bash_json_yaml_markdown() {
        assert_eq!(detect("if [ -f x ]; then\n  echo y\nfi"), Some("bash"));
        assert_eq!(detect("{\"name\": \"pastebot\", \"tags\": [1, 2]}"), Some("json"));
        assert_eq!(detect("services:\n  web:\n    image: nginx"), Some("yaml"));
        assert_eq!(detect("# Title\n\nSome **bold** text"), Some("markdown"));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let d = detector();
        let input = "let total = items.reduce((a, b) => a + b, 0);";
        let first = d.detect_language(input);
        for _ in 0..10 {
            assert_eq!(d.detect_language(input), first);
        }
    }

    #[test]
    fn test_arbitrary_input_does_not_panic() {
        let junk = String::from_utf8_lossy(&[0xff, 0x00, 0xfe, b'{', 0x80, b'<', b'?']).to_string();
        let _ = detector().detect_language(&junk);
    }

    #[test]
    fn test_priority_then_declaration_order() {
        let table = LanguageTable::new(vec![
            LanguagePattern::new("first", 0).literal("x"),
            LanguagePattern::new("second", 0).literal("x"),
            LanguagePattern::new("boosted", 5).literal("x"),
        ]);
        let tags: Vec<_> = table.tags().collect();
        assert_eq!(tags, vec!["boosted", "first", "second"]);
        assert_eq!(
            LanguageDetector::new(table).detect_language("x"),
            Detection::Detected("boosted")
        );
    }

    #[test]
    fn test_builtin_table_has_every_group() {
        let table = LanguageTable::builtin().unwrap();
        assert_eq!(table.tags().count(), 14);
        assert_eq!(table.tags().next(), Some("php"));
    }
}
