use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use ytx_core::YtxError;

/// How many `}` cut points the truncation pass tries, newest first.
const MAX_CUT_POINTS: usize = 32;

#[allow(clippy::expect_used)]
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

#[allow(clippy::expect_used)]
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma pattern is valid"));

/// The JSON container a caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// A top-level `[...]`.
    Array,
    /// A top-level `{...}`.
    Object,
}

impl Container {
    fn open(self) -> char {
        match self {
            Container::Array => '[',
            Container::Object => '{',
        }
    }

    fn close(self) -> char {
        match self {
            Container::Array => ']',
            Container::Object => '}',
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Container::Array => value.is_array(),
            Container::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Container::Array => "array",
            Container::Object => "object",
        }
    }
}

/// Why extraction failed.
///
/// Both variants are user-correctable: the usual remedy is to regenerate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The text contains no opening bracket of the requested kind.
    #[error("no JSON {0} found in model output")]
    NotFound(&'static str),

    /// A container was found but no repair produced valid JSON.
    /// Carries the error from the first, unrepaired parse.
    #[error("invalid JSON in model output: {0}")]
    Invalid(String),
}

impl From<ExtractError> for YtxError {
    fn from(err: ExtractError) -> Self {
        YtxError::Extraction(err.to_string())
    }
}

/// Recovers a JSON value of the requested container type from model text.
///
/// Attempts, first success wins: fence strip and bracket slice, direct
/// parse, trailing-comma removal, string re-escape, re-escape plus comma
/// removal, then truncation at successive `}` boundaries with the open
/// containers re-closed.
pub fn extract_json(text: &str, container: Container) -> Result<Value, ExtractError> {
    let unfenced = strip_fence(text);
    let body = slice_container(unfenced, container)
        .ok_or(ExtractError::NotFound(container.name()))?;

    let first_err = match parse(body, container) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    let no_commas = remove_trailing_commas(body);
    if let Ok(v) = parse(&no_commas, container) {
        debug!(stage = "trailing_commas", "recovered JSON");
        return Ok(v);
    }

    let escaped = reescape_strings(body);
    if let Ok(v) = parse(&escaped, container) {
        debug!(stage = "reescape", "recovered JSON");
        return Ok(v);
    }

    if let Ok(v) = parse(&remove_trailing_commas(&escaped), container) {
        debug!(stage = "reescape_trailing_commas", "recovered JSON");
        return Ok(v);
    }

    if let Some(v) = recover_truncated(body, container) {
        return Ok(v);
    }

    Err(ExtractError::Invalid(first_err))
}

/// Like [`extract_json`], then deserializes into `T`.
pub fn extract_as<T: DeserializeOwned>(text: &str, container: Container) -> Result<T, ExtractError> {
    let value = extract_json(text, container)?;
    serde_json::from_value(value).map_err(|e| ExtractError::Invalid(e.to_string()))
}

fn parse(candidate: &str, container: Container) -> Result<Value, String> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    if container.accepts(&value) {
        Ok(value)
    } else {
        Err(format!("expected a JSON {}", container.name()))
    }
}

fn strip_fence(text: &str) -> &str {
    if let Some(caps) = FENCE.captures(text) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str();
        }
    }
    // An unclosed fence means the output was cut off; drop the tag line.
    match text.find("```") {
        Some(idx) => {
            let after = &text[idx + 3..];
            match after.find('\n') {
                Some(nl) => &after[nl + 1..],
                None => after,
            }
        }
        None => text,
    }
}

/// First opening bracket up to the last closing one. Runs to the end of the
/// text when no closing bracket follows the opener.
fn slice_container(text: &str, container: Container) -> Option<&str> {
    let start = text.find(container.open())?;
    let rest = &text[start..];
    match rest.rfind(container.close()) {
        Some(end) => Some(&rest[..end + 1]),
        None => Some(rest),
    }
}

fn remove_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

/// Escapes raw control characters inside string literals and treats a quote
/// as embedded unless a structural character, whitespace, or the end of
/// input follows it.
///
/// Heuristic only: an embedded quote followed by a space or comma still
/// terminates the string.
fn reescape_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                let terminates = match chars.peek() {
                    None => true,
                    Some(&n) => n.is_whitespace() || matches!(n, ',' | '}' | ']' | ':'),
                };
                if terminates {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}

/// Brackets still open at the end of `text`, as the string that closes
/// them. `None` when the text ends inside a string literal.
fn pending_closers(text: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                stack.pop();
            }
            _ => {}
        }
    }

    if in_string {
        None
    } else {
        Some(stack.iter().rev().collect())
    }
}

fn close_and_parse(prefix: &str, container: Container) -> Option<Value> {
    let closers = pending_closers(prefix)?;
    let candidate = remove_trailing_commas(&format!("{prefix}{closers}"));
    parse(&candidate, container).ok()
}

/// Byte offsets of `}` characters where a truncated body may be cut,
/// newest first.
///
/// Inside an array only a `}` that closes a top-level element qualifies, so
/// a dangling element is dropped whole. Inside an object any `}` does: a
/// tree keeps its complete nested children.
fn cut_points(body: &str, container: Container) -> Vec<usize> {
    let mut cuts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '}' => {
                depth = depth.saturating_sub(1);
                if container == Container::Object || depth == 1 {
                    cuts.push(i);
                }
            }
            _ => {}
        }
    }

    cuts.reverse();
    cuts.truncate(MAX_CUT_POINTS);
    cuts
}

fn recover_truncated(body: &str, container: Container) -> Option<Value> {
    for cut in cut_points(body, container) {
        let prefix = &body[..=cut];
        if let Some(v) = close_and_parse(prefix, container) {
            debug!(stage = "truncation", cut, "recovered partial JSON");
            return Some(v);
        }
        if let Some(v) = close_and_parse(&reescape_strings(prefix), container) {
            debug!(stage = "truncation_reescape", cut, "recovered partial JSON");
            return Some(v);
        }
    }
    None
}
