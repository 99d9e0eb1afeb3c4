//! Template resolution for workflow step parameters.
//!
//! Step parameters may embed `{{expression}}` placeholders that are
//! resolved against the [`PipelineContext`] at execution time. Expressions
//! are dot paths into context values, with `[idx]` for array indexing:
//!
//! - `{{fetch}}` — the output stored under the `fetch` step id
//! - `{{fetch.items[0].name}}` — a nested field of that output
//!
//! A string that is exactly one placeholder resolves to the referenced
//! value with its JSON type preserved; placeholders embedded in a larger
//! string are stringified and spliced in.

use serde_json::{Map, Value};

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};

/// Resolve every template placeholder in `value` against the context.
pub fn resolve_value(value: &Value, ctx: &PipelineContext) -> Result<Value> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_value(item, ctx)?);
            }
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve every entry of a parameter map.
pub fn resolve_map(map: &Map<String, Value>, ctx: &PipelineContext) -> Result<Map<String, Value>> {
    let mut resolved = Map::with_capacity(map.len());
    for (key, value) in map {
        resolved.insert(key.clone(), resolve_value(value, ctx)?);
    }
    Ok(resolved)
}

fn resolve_string(s: &str, ctx: &PipelineContext) -> Result<Value> {
    // Sole-expression form keeps the referenced value's type
    if let Some(expr) = sole_expression(s) {
        return lookup(expr.trim(), ctx);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| PipelineError::Template(format!("Unclosed '{{{{' in '{s}'")))?;
        out.push_str(&rest[..start]);
        let resolved = lookup(after[..end].trim(), ctx)?;
        out.push_str(&stringify(&resolved));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// If the whole string is a single `{{expr}}`, return the inner expression.
fn sole_expression(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Look up a dot path (with optional `[idx]` segments) in the context.
fn lookup(expr: &str, ctx: &PipelineContext) -> Result<Value> {
    if expr.is_empty() {
        return Err(PipelineError::Template("Empty template expression".into()));
    }

    // Context keys may themselves contain dots ("left.result"), so try
    // the longest matching key first before walking segments.
    if let Some(value) = ctx.get(expr) {
        return Ok(value.clone());
    }

    let (root, path) = split_root(expr);
    let mut current = ctx
        .get(root)
        .ok_or_else(|| PipelineError::Template(format!("Unknown reference '{root}' in '{expr}'")))?
        .clone();

    for segment in path {
        current = match segment {
            Segment::Field(name) => current.get(name).cloned().ok_or_else(|| {
                PipelineError::Template(format!("No field '{name}' in '{expr}'"))
            })?,
            Segment::Index(idx) => current.get(idx).cloned().ok_or_else(|| {
                PipelineError::Template(format!("No index [{idx}] in '{expr}'"))
            })?,
        };
    }
    Ok(current)
}

enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

/// Split `a.b[0].c` into the root key `a` and its trailing segments.
fn split_root(expr: &str) -> (&str, Vec<Segment<'_>>) {
    let root_end = expr
        .find(['.', '['])
        .unwrap_or(expr.len());
    let (root, mut rest) = expr.split_at(root_end);

    let mut segments = Vec::new();
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('.') {
            let end = stripped.find(['.', '[']).unwrap_or(stripped.len());
            segments.push(Segment::Field(&stripped[..end]));
            rest = &stripped[end..];
        } else if let Some(stripped) = rest.strip_prefix('[') {
            match stripped.split_once(']') {
                Some((idx, tail)) => {
                    match idx.parse::<usize>() {
                        Ok(n) => segments.push(Segment::Index(n)),
                        // Non-numeric index never matches; surface it as a
                        // missing field instead of panicking downstream.
                        Err(_) => segments.push(Segment::Field(idx)),
                    }
                    rest = tail;
                }
                None => break,
            }
        } else {
            break;
        }
    }
    (root, segments)
}
