//! Macro substitution engine for templates

use serde_json::{Map, Value};

/// Macro values keyed by name, as received from the caller
pub type Macros = Map<String, Value>;

/// Render a macro value as the text injected into a template.
///
/// Strings are used as-is; every other value is serialized to compact JSON so
/// the same value always yields the same text.
pub fn macro_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

/// Substitute `{{$key}}` placeholders in `text`.
///
/// Each placeholder is replaced by its macro text in a single left-to-right
/// scan. Inserted text is never rescanned, and placeholders whose key is not
/// in `macros` are left verbatim.
pub fn substitute(text: &str, macros: &Macros) -> String {
    const OPEN: &str = "{{$";
    const CLOSE: &str = "}}";

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let value = after_open
            .find(CLOSE)
            .and_then(|end| macros.get(&after_open[..end]).map(|value| (end, value)));

        match value {
            Some((end, value)) => {
                result.push_str(&macro_text(value));
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                // Not a known placeholder: keep the opener and rescan after it
                result.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn macros(value: Value) -> Macros {
        match value {
            Value::Object(map) => map,
            _ => panic!("macros must be an object"),
        }
    }

    #[test]
    fn test_substitute_simple() {
        let result = substitute("Hello, {{$name}}!", &macros(json!({"name": "World"})));
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_substitute_multiple() {
        let result = substitute(
            "Job {{$job_id}} renewed for {{$company}}. Ref {{$job_id}}",
            &macros(json!({"job_id": "J-9", "company": "Acme"})),
        );
        assert_eq!(result, "Job J-9 renewed for Acme. Ref J-9");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let result = substitute("Hi {{$name}}, see {{$link}}", &macros(json!({"name": "Ann"})));
        assert_eq!(result, "Hi Ann, see {{$link}}");
    }

    #[test]
    fn test_non_string_values_use_json_text() {
        let result = substitute(
            "{{$count}} / {{$flag}} / {{$items}} / {{$nothing}}",
            &macros(json!({"count": 42, "flag": true, "items": [1, 2], "nothing": null})),
        );
        assert_eq!(result, "42 / true / [1,2] / null");
    }

    #[test]
    fn test_single_pass_does_not_recurse() {
        let result = substitute(
            "{{$a}}",
            &macros(json!({"a": "{{$b}}", "b": "nested"})),
        );
        assert_eq!(result, "{{$b}}");
    }

    #[test]
    fn test_idempotent_when_values_have_no_placeholders() {
        let m = macros(json!({"name": "Ann", "amount": 12.5}));
        let text = "Dear {{$name}}, you owe {{$amount}} ({{$missing}})";

        let once = substitute(text, &m);
        assert_eq!(substitute(&once, &m), once);
    }

    #[test]
    fn test_unterminated_placeholder() {
        let result = substitute("Broken {{$name", &macros(json!({"name": "Ann"})));
        assert_eq!(result, "Broken {{$name");
    }

    #[test]
    fn test_plain_mustache_is_not_a_macro() {
        let result = substitute("{{name}}", &macros(json!({"name": "Ann"})));
        assert_eq!(result, "{{name}}");
    }

    #[test]
    fn test_stray_opener_does_not_hide_later_placeholder() {
        let result = substitute(
            "Price {{$ 5 off, Hi {{$name}}",
            &macros(json!({"name": "Ann"})),
        );
        assert_eq!(result, "Price {{$ 5 off, Hi Ann");
    }

    #[test]
    fn test_unknown_key_spanning_placeholder_is_rescanned() {
        let result = substitute(
            "{{$a {{$b}} {{$a}}",
            &macros(json!({"a": "x", "b": "y"})),
        );
        assert_eq!(result, "{{$a y x");
    }
}
