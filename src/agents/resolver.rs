//! Tool call repair
//!
//! Models frequently get tool names or argument nesting slightly wrong. The
//! resolver maps a raw candidate onto the tool registry using a fixed set of
//! heuristics and never fails: when nothing matches, the candidate passes
//! through with a canonicalized name.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::domain::{RawArguments, ResolvedToolCall, ToolCallCandidate, ToolDescriptor};

/// Lower-kebab ("spinal") case form of a name.
///
/// `SumTwoNumbers`, `sum_two_numbers` and `Sum Two.Numbers` all become
/// `sum-two-numbers`.
pub fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        } else {
            if ch.is_uppercase()
                && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
                && !out.ends_with('-')
            {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
        }
        prev = Some(ch);
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Parse raw arguments into a JSON object.
///
/// Anything that is not an object ends up wrapped as `{"raw": ...}`.
pub fn parse_arguments(raw: &RawArguments) -> Map<String, Value> {
    match raw {
        RawArguments::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            _ => raw_wrapper(Value::String(text.clone())),
        },
        RawArguments::Structured(Value::Object(map)) => map.clone(),
        RawArguments::Structured(other) => raw_wrapper(other.clone()),
    }
}

fn raw_wrapper(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("raw".to_string(), value);
    map
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pick a registry name for the candidate, or keep the canonical form
fn resolve_name(canonical: &str, arguments: &Map<String, Value>, registry: &[ToolDescriptor]) -> String {
    if registry.iter().any(|tool| tool.name == canonical) {
        return canonical.to_string();
    }

    for tool in registry {
        if tool.name.is_empty() {
            continue;
        }
        if canonical.contains(tool.name.as_str()) {
            return tool.name.clone();
        }
        for (key, value) in arguments {
            if canonicalize(key).contains(tool.name.as_str())
                || canonicalize(&stringify(value)).contains(tool.name.as_str())
            {
                return tool.name.clone();
            }
        }
    }

    canonical.to_string()
}

fn key_set(map: &Map<String, Value>) -> BTreeSet<&str> {
    map.keys().map(String::as_str).collect()
}

/// Arguments shaped for `tool`: the map itself or its first nested object
/// whose keys equal the declared ones.
fn match_arguments(tool: &ToolDescriptor, arguments: &Map<String, Value>) -> Option<Map<String, Value>> {
    let declared = tool.declared_keys()?;

    if key_set(arguments) == declared {
        return Some(arguments.clone());
    }

    arguments.values().find_map(|value| match value {
        Value::Object(inner) if key_set(inner) == declared => Some(inner.clone()),
        _ => None,
    })
}

/// Repair a raw tool call against the registry
pub fn resolve(candidate: &ToolCallCandidate, registry: &[ToolDescriptor]) -> ResolvedToolCall {
    let arguments = parse_arguments(&candidate.raw_arguments);
    let canonical = canonicalize(&candidate.raw_tool_name);
    let name = resolve_name(&canonical, &arguments, registry);

    let named_match = registry
        .iter()
        .filter(|tool| tool.name == name)
        .find_map(|tool| match_arguments(tool, &arguments).map(|args| (tool.name.clone(), args)));

    let (tool_name, arguments) = named_match
        .or_else(|| {
            registry
                .iter()
                .find_map(|tool| match_arguments(tool, &arguments).map(|args| (tool.name.clone(), args)))
        })
        .unwrap_or((name, arguments));

    ResolvedToolCall {
        call_id: candidate.call_id.clone(),
        tool_name,
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "sum-two-numbers",
                json!({"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}),
            ),
            ToolDescriptor::new(
                "generate-random",
                json!({"type": "object", "properties": {"min": {}, "max": {}}}),
            ),
        ]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("SumTwoNumbers"), "sum-two-numbers");
        assert_eq!(canonicalize("sum_two_numbers"), "sum-two-numbers");
        assert_eq!(canonicalize("  Sum Two.Numbers "), "sum-two-numbers");
        assert_eq!(canonicalize("tool2Run"), "tool2-run");
        assert_eq!(canonicalize("already-kebab"), "already-kebab");
        assert_eq!(canonicalize("__a__b__"), "a-b");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_camel_case_name_resolves() {
        let candidate = ToolCallCandidate::new("c1", "SumTwoNumbers", "{\"a\": 2, \"b\": 3}");
        let resolved = resolve(&candidate, &registry());

        assert_eq!(resolved.call_id, "c1");
        assert_eq!(resolved.tool_name, "sum-two-numbers");
        assert_eq!(resolved.arguments, args(json!({"a": 2, "b": 3})));
    }

    #[test]
    fn test_nested_arguments_are_unwrapped() {
        let candidate = ToolCallCandidate::new(
            "c2",
            "sum-two-numbers",
            json!({"input": {"a": 1, "b": 4}}),
        );
        let resolved = resolve(&candidate, &registry());

        assert_eq!(resolved.tool_name, "sum-two-numbers");
        assert_eq!(resolved.arguments, args(json!({"a": 1, "b": 4})));
    }

    #[test]
    fn test_invalid_json_kept_as_raw() {
        let candidate = ToolCallCandidate::new("c3", "unknown_tool", "not-json");
        let resolved = resolve(&candidate, &registry());

        assert_eq!(resolved.tool_name, "unknown-tool");
        assert_eq!(resolved.arguments, args(json!({"raw": "not-json"})));
    }

    #[test]
    fn test_non_object_arguments_wrapped() {
        let candidate = ToolCallCandidate::new("c4", "x", "[1, 2]");
        assert_eq!(resolve(&candidate, &[]).arguments, args(json!({"raw": "[1, 2]"})));

        let candidate = ToolCallCandidate::new("c5", "x", json!(42));
        assert_eq!(resolve(&candidate, &[]).arguments, args(json!({"raw": 42})));
    }

    #[test]
    fn test_name_found_as_substring() {
        let candidate = ToolCallCandidate::new("c6", "functions.sum_two_numbers_v2", "{\"x\": 1}");
        let resolved = resolve(&candidate, &registry());
        assert_eq!(resolved.tool_name, "sum-two-numbers");
    }

    #[test]
    fn test_name_found_in_argument_values() {
        let candidate = ToolCallCandidate::new(
            "c7",
            "call_tool",
            json!({"tool": "GenerateRandom", "options": {"seed": 1}}),
        );
        let resolved = resolve(&candidate, &registry());
        assert_eq!(resolved.tool_name, "generate-random");
    }

    #[test]
    fn test_key_sweep_overrides_name() {
        let candidate = ToolCallCandidate::new("c8", "calculator", json!({"a": 5, "b": 6}));
        let resolved = resolve(&candidate, &registry());

        assert_eq!(resolved.tool_name, "sum-two-numbers");
        assert_eq!(resolved.arguments, args(json!({"a": 5, "b": 6})));
    }

    #[test]
    fn test_sweep_unwraps_nested_match() {
        let candidate = ToolCallCandidate::new(
            "c9",
            "random",
            json!({"params": {"min": 1, "max": 10}}),
        );
        let resolved = resolve(&candidate, &registry());

        assert_eq!(resolved.tool_name, "generate-random");
        assert_eq!(resolved.arguments, args(json!({"min": 1, "max": 10})));
    }

    #[test]
    fn test_descriptor_without_properties_never_matches_keys() {
        let registry = vec![ToolDescriptor::new("ping", json!({"type": "object"}))];
        let candidate = ToolCallCandidate::new("c10", "other", "{}");
        let resolved = resolve(&candidate, &registry);

        assert_eq!(resolved.tool_name, "other");
        assert!(resolved.arguments.is_empty());
    }

    #[test]
    fn test_empty_registry_passes_through() {
        let candidate = ToolCallCandidate::new("c11", "DoThing", "{\"k\": \"v\"}");
        let resolved = resolve(&candidate, &[]);
        assert_eq!(resolved.tool_name, "do-thing");
        assert_eq!(resolved.arguments, args(json!({"k": "v"})));
    }
}
