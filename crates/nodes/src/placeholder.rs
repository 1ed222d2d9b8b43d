//! `{{ ... }}` placeholder substitution over JSON values.
//!
//! Node parameters may reference the outputs of upstream nodes:
//!
//! - `{{0.user.name}}`: field `user.name` of the first input.
//! - `{{1.items.2}}`:   third element of `items` in the second input.
//! - `{{user.name}}`:   shorthand for `{{0.user.name}}`, only valid when the
//!   node has exactly one input.
//!
//! A string that is *exactly* one placeholder is replaced by the referenced
//! value with its JSON type intact. Placeholders embedded in other text are
//! rendered as text. Resolution never fails: missing data becomes `null`
//! (or an empty string when embedded), and references that cannot be tied to
//! a single input are left exactly as written.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").expect("placeholder pattern is valid"))
}

/// A reference split into the input it selects and the path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    pub index: usize,
    pub path: Vec<&'a str>,
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Split a placeholder body such as `0.items.1.name`.
///
/// Returns `None` when the reference is ambiguous: no leading index and
/// `input_count != 1`.
pub fn parse_reference(token: &str, input_count: usize) -> Option<Reference<'_>> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if is_index(parts[0]) {
        // An index too large for usize can never select an input.
        let index = parts[0].parse().unwrap_or(usize::MAX);
        return Some(Reference {
            index,
            path: parts[1..].to_vec(),
        });
    }
    if input_count == 1 {
        return Some(Reference { index: 0, path: parts });
    }
    None
}

/// Walk `path` through `value`.
///
/// Numeric segments index arrays, any segment looks up an object key.
/// Every other combination yields `None`.
pub fn lookup_path<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Array(items) if is_index(segment) => {
            segment.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        Value::Object(map) => map.get(*segment),
        _ => None,
    })
}

/// Resolve a single placeholder body against `inputs`.
///
/// `None` means the reference was ambiguous; absent data resolves to
/// `Some(Value::Null)`.
pub fn resolve_reference(token: &str, inputs: &[Value]) -> Option<Value> {
    let reference = parse_reference(token, inputs.len())?;
    let value = inputs
        .get(reference.index)
        .and_then(|input| lookup_path(input, &reference.path))
        .cloned()
        .unwrap_or(Value::Null);
    Some(value)
}

/// Text form of a value when spliced into a larger string.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursively substitute placeholders in `value`.
pub fn resolve(value: &Value, inputs: &[Value]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, inputs)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, inputs)).collect()),
        Value::String(s) => resolve_str(s, inputs),
        other => other.clone(),
    }
}

/// Substitute placeholders in a single string.
pub fn resolve_str(text: &str, inputs: &[Value]) -> Value {
    let re = placeholder_re();
    let mut matches = re.captures_iter(text);
    let Some(first) = matches.next() else {
        return Value::String(text.to_owned());
    };

    let whole = first.get(0).map(|m| m.range());
    if matches.next().is_none() && whole == Some(0..text.len()) {
        return resolve_reference(&first[1], inputs).unwrap_or_else(|| Value::String(text.to_owned()));
    }

    let rendered = re.replace_all(text, |caps: &Captures<'_>| {
        match resolve_reference(&caps[1], inputs) {
            Some(value) => display_string(&value),
            None => caps[0].to_owned(),
        }
    });
    Value::String(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_string_keeps_native_type() {
        assert_eq!(resolve(&json!("{{0}}"), &[json!([1, 2, 3])]), json!([1, 2, 3]));
        assert_eq!(resolve(&json!("{{ 0.n }}"), &[json!({ "n": 7 })]), json!(7));
        assert_eq!(resolve(&json!("{{0.ok}}"), &[json!({ "ok": false })]), json!(false));
    }

    #[test]
    fn embedded_placeholder_renders_text() {
        let out = resolve(&json!("Hello {{0.name}}!"), &[json!({ "name": "Ada" })]);
        assert_eq!(out, json!("Hello Ada!"));
    }

    #[test]
    fn embedded_missing_segment_renders_empty() {
        let out = resolve(&json!("id=[{{0.missing}}]"), &[json!({ "name": "Ada" })]);
        assert_eq!(out, json!("id=[]"));
    }

    #[test]
    fn embedded_non_string_values_render_as_json() {
        let inputs = [json!({ "n": 3, "flag": true, "tags": ["a", "b"] })];
        let out = resolve(&json!("{{0.n}}/{{0.flag}}/{{0.tags}}"), &inputs);
        assert_eq!(out, json!(r#"3/true/["a","b"]"#));
    }

    #[test]
    fn whole_string_missing_resolves_to_null() {
        assert_eq!(resolve(&json!("{{0.nope}}"), &[json!({})]), Value::Null);
        assert_eq!(resolve(&json!("{{3}}"), &[json!(1)]), Value::Null);
    }

    #[test]
    fn single_input_allows_bare_path() {
        let inputs = [json!({ "user": { "id": 42 } })];
        assert_eq!(resolve(&json!("{{user.id}}"), &inputs), json!(42));
    }

    #[test]
    fn ambiguous_reference_is_left_untouched() {
        let inputs = [json!({ "a": 1 }), json!({ "a": 2 })];
        assert_eq!(resolve(&json!("{{a}}"), &inputs), json!("{{a}}"));
        assert_eq!(
            resolve(&json!("x={{a}} y={{1.a}}"), &inputs),
            json!("x={{a}} y=2")
        );
        // No inputs at all is ambiguous too.
        assert_eq!(resolve(&json!("{{ name }}"), &[]), json!("{{ name }}"));
    }

    #[test]
    fn array_indices_and_object_keys_navigate() {
        let inputs = [json!({ "items": [{ "id": "a" }, { "id": "b" }], "0": "zero" })];
        assert_eq!(resolve(&json!("{{0.items.1.id}}"), &inputs), json!("b"));
        assert_eq!(resolve(&json!("{{0.0}}"), &inputs), json!("zero"));
        assert_eq!(resolve(&json!("{{0.items.x}}"), &inputs), Value::Null);
        assert_eq!(resolve(&json!("{{0.items.9}}"), &inputs), Value::Null);
    }

    #[test]
    fn scalars_are_not_navigable() {
        assert_eq!(resolve(&json!("{{0.len}}"), &[json!("text")]), Value::Null);
    }

    #[test]
    fn recursion_preserves_structure() {
        let inputs = [json!({ "id": 9, "name": "x" })];
        let params = json!({
            "query": { "id": "{{0.id}}", "label": "item-{{0.name}}" },
            "list": ["{{0.name}}", 5, null, true],
        });
        assert_eq!(
            resolve(&params, &inputs),
            json!({
                "query": { "id": 9, "label": "item-x" },
                "list": ["x", 5, null, true],
            })
        );
    }

    #[test]
    fn strings_without_placeholders_pass_through() {
        assert_eq!(resolve(&json!("plain {text}"), &[]), json!("plain {text}"));
        assert_eq!(resolve(&json!(12.5), &[]), json!(12.5));
    }

    #[test]
    fn oversized_index_is_absent() {
        let token = "99999999999999999999999999";
        assert_eq!(resolve_reference(token, &[json!(1)]), Some(Value::Null));
    }
}
