//! Tool calls written into the answer text instead of sent natively.
//!
//! Two shapes are recognised:
//!
//! ```text
//! <tool_call>{"name": "get_rules", "arguments": {}}</tool_call>
//! ```
//!
//! and the code-fence form Gemini falls back to:
//!
//! ````text
//! ```tool_code
//! print(default_api.translate(text="hola", target='en'))
//! ```
//! ````

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::ToolCall;

/// Calls recovered from text, plus the text with the call syntax removed.
#[derive(Debug)]
pub(crate) struct ParsedCalls {
    pub(crate) calls: Vec<ToolCall>,
    pub(crate) remaining: String,
}

fn compile_regex(pattern: &str, label: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(pattern = label, error = %e, "Failed to compile fallback pattern");
            None
        }
    }
}

fn tool_call_block_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile_regex(
            r"(?is)<tool_call\b[^>]*>(?P<payload>.*?)</tool_call\s*>",
            "tool_call_block",
        )
    })
    .as_ref()
}

fn tool_code_fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"(?s)```tool_code[ \t]*\n?(?P<body>.*?)```", "tool_code"))
        .as_ref()
}

fn call_head_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile_regex(
            r"(?:default_api\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\(",
            "call_head",
        )
    })
    .as_ref()
}

/// Extract fallback tool calls from `text`. `None` when there are none.
pub(crate) fn extract(text: &str) -> Option<ParsedCalls> {
    let block = tool_call_block_regex()?;
    let fence = tool_code_fence_regex()?;
    let mut calls = Vec::new();

    for caps in block.captures_iter(text) {
        let payload = caps.name("payload").map_or("", |m| m.as_str()).trim();
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => calls.extend(call_from_object(&map)),
            Ok(Value::Array(items)) => calls.extend(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(call_from_object),
            ),
            _ => debug!(payload, "Unparseable <tool_call> block"),
        }
    }

    for caps in fence.captures_iter(text) {
        let body = caps.name("body").map_or("", |m| m.as_str());
        calls.extend(calls_from_code(body));
    }

    if calls.is_empty() {
        return None;
    }

    let stripped = block.replace_all(text, "");
    let stripped = fence.replace_all(&stripped, "");
    Some(ParsedCalls {
        calls,
        remaining: stripped.trim().to_string(),
    })
}

fn call_from_object(map: &Map<String, Value>) -> Option<ToolCall> {
    let name = map.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let arguments = match map.get("arguments").or_else(|| map.get("args")) {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|_| json!({})),
        Some(other) => other.clone(),
    };
    Some(ToolCall::new(name, arguments))
}

fn calls_from_code(body: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let Some(head) = call_head_regex() else {
        return calls;
    };
    let quoted = quoted_spans(body);
    let mut offset = 0;
    while let Some(caps) = head.captures(&body[offset..]) {
        let Some(whole) = caps.get(0) else { break };
        let start = offset + whole.start();
        if let Some(&(_, end)) = quoted.iter().find(|(s, e)| (*s..*e).contains(&start)) {
            offset = end;
            continue;
        }
        let name = caps.name("name").map_or("", |m| m.as_str());
        let open = offset + whole.end();
        if name == "print" {
            offset = open;
            continue;
        }
        let Some(close) = matching_paren(body, open) else {
            break;
        };
        calls.push(ToolCall::new(name, parse_kwargs(&body[open..close])));
        offset = close + 1;
    }
    calls
}

/// Byte ranges of string literals in `code`, quotes included. An unclosed
/// literal runs to the end.
fn quoted_spans(code: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<(char, usize)> = None;
    let mut escape = false;
    for (i, ch) in code.char_indices() {
        match open {
            Some((q, begin)) => {
                if escape {
                    escape = false;
                } else if ch == '\\' {
                    escape = true;
                } else if ch == q {
                    spans.push((begin, i + ch.len_utf8()));
                    open = None;
                }
            }
            None if ch == '"' || ch == '\'' => open = Some((ch, i)),
            None => {}
        }
    }
    if let Some((_, begin)) = open {
        spans.push((begin, code.len()));
    }
    spans
}

/// Index of the `)` closing the group that starts at `start`.
fn matching_paren(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escape = false;
    for (i, ch) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(start + i),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Split on commas outside quotes and brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escape = false;
    let mut begin = 0;
    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[begin..i]);
                begin = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[begin..]);
    parts
}

fn parse_kwargs(text: &str) -> Value {
    let mut args = Map::new();
    for part in split_top_level(text) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        args.insert(key.to_string(), parse_literal(value.trim()));
    }
    Value::Object(args)
}

fn parse_literal(text: &str) -> Value {
    match text {
        "True" | "true" => return Value::Bool(true),
        "False" | "false" => return Value::Bool(false),
        "None" | "null" => return Value::Null,
        _ => {}
    }
    if let Some(inner) = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
    {
        return Value::String(unescape(inner));
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
