//! Validation pipeline: checks and coerces raw property values against rules.
//!
//! Validation never fails as an error. Every call yields a
//! [`ValidationResponse`] whose `parsed` value is safe to feed into
//! evaluation, even when `is_valid` is false.

mod rules;

pub use rules::{
    ArrayParams, BooleanParams, FunctionParams, KeyRule, NestedObjectArrayParams, NumberParams,
    ObjectParams, TextParams, ValidationRule, ValidatorFn,
};

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of validating one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub is_valid: bool,
    pub parsed: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResponse {
    pub fn valid(parsed: Value) -> Self {
        Self {
            is_valid: true,
            parsed,
            message: None,
        }
    }

    pub fn invalid(parsed: Value, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            parsed,
            message: Some(message.into()),
        }
    }
}

/// Validate `value` against `rule`. `Value::Null` stands for `undefined`.
pub fn validate(value: &Value, rule: &ValidationRule) -> ValidationResponse {
    match rule {
        ValidationRule::Text(params) => validate_text(value, params),
        ValidationRule::Number(params) => validate_number(value, params),
        ValidationRule::Boolean(params) => validate_boolean(value, params),
        ValidationRule::Regex => validate_regex(value),
        ValidationRule::Array(params) => validate_array(value, params),
        ValidationRule::Object(params) => validate_object(value, params),
        ValidationRule::NestedObjectArray(params) => validate_nested_object_array(value, params),
        ValidationRule::Function(params) => (params.validator)(value),
    }
}

/// Validate every property that has a rule. Missing properties validate as `undefined`.
pub fn validate_properties(
    rules: &IndexMap<String, ValidationRule>,
    properties: &IndexMap<String, Value>,
) -> IndexMap<String, ValidationResponse> {
    rules
        .iter()
        .map(|(name, rule)| {
            let value = properties.get(name).unwrap_or(&Value::Null);
            (name.clone(), validate(value, rule))
        })
        .collect()
}

/// Coerce a raw list input into its elements.
///
/// Strings are first parsed as a JSON array; when that fails they are split
/// on commas and trimmed. Arrays are deduplicated by value, keeping the first
/// occurrence. `undefined` is the empty list. Other values are not lists.
pub fn parse_value_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(raw) => {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
                return Some(items);
            }
            if raw.is_empty() {
                return Some(Vec::new());
            }
            Some(
                raw.split(',')
                    .map(|part| Value::String(part.trim().to_string()))
                    .collect(),
            )
        }
        Value::Array(items) => {
            let mut unique: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !unique.contains(item) {
                    unique.push(item.clone());
                }
            }
            Some(unique)
        }
        _ => None,
    }
}

/// Compile a pattern written bare or as `/pattern/flags`.
///
/// Flags `i`, `m` and `s` map onto regex options; `g`, `u` and `y` are
/// accepted and ignored. A trailing segment that is not a valid flag set
/// makes the whole input the pattern.
///
/// The `regex` engine has no lookaround and no backreferences, so patterns
/// using `(?=`, `(?!`, `(?<=`, `(?<!` or `\1` fail to compile here even
/// though a browser would accept them.
pub fn compile_pattern(raw: &str) -> Result<Regex, regex::Error> {
    let (pattern, flags) = split_pattern(raw);
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
}

fn split_pattern(raw: &str) -> (&str, &str) {
    if let Some(rest) = raw.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            let (pattern, flags) = (&rest[..end], &rest[end + 1..]);
            if !pattern.is_empty() && is_flag_set(flags) {
                return (pattern, flags);
            }
        }
    }
    (raw, "")
}

fn is_flag_set(flags: &str) -> bool {
    let mut seen = String::new();
    for flag in flags.chars() {
        if !"gimsuy".contains(flag) || seen.contains(flag) {
            return false;
        }
        seen.push(flag);
    }
    true
}

/// JSON number for `n`, integral when it has no fractional part.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn validate_text(value: &Value, params: &TextParams) -> ValidationResponse {
    let default = Value::String(params.default.clone().unwrap_or_default());
    let text = match value {
        Value::Null => {
            return if params.required {
                ValidationResponse::invalid(default, "This value is required")
            } else {
                ValidationResponse::valid(default)
            };
        }
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            return ValidationResponse::invalid(
                Value::String(value.to_string()),
                "This value does not evaluate to type string",
            );
        }
    };
    if params.required && text.is_empty() {
        return ValidationResponse::invalid(default, "This value is required");
    }
    if !params.allowed_values.is_empty() && !params.allowed_values.contains(&text) {
        return ValidationResponse::invalid(default, format!("Disallowed value: {text}"));
    }
    ValidationResponse::valid(Value::String(text))
}

fn validate_number(value: &Value, params: &NumberParams) -> ValidationResponse {
    let default = params.default.map_or(Value::Null, number_value);
    let number = match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Number(n) => match n.as_f64() {
            Some(n) => Some(n),
            None => {
                return ValidationResponse::invalid(
                    default,
                    "This value does not evaluate to type number",
                );
            }
        },
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                return ValidationResponse::invalid(
                    default,
                    "This value does not evaluate to type number",
                );
            }
        },
        _ => {
            return ValidationResponse::invalid(
                default,
                "This value does not evaluate to type number",
            );
        }
    };

    let Some(n) = number else {
        return if params.required {
            ValidationResponse::invalid(default, "This value is required")
        } else {
            ValidationResponse::valid(default)
        };
    };
    if params.natural && (n < 0.0 || n.fract() != 0.0) {
        return ValidationResponse::invalid(default, "This value should be a natural number");
    }
    if let Some(min) = params.min {
        if n < min {
            return ValidationResponse::invalid(default, format!("Minimum allowed value: {min}"));
        }
    }
    if let Some(max) = params.max {
        if n > max {
            return ValidationResponse::invalid(default, format!("Maximum allowed value: {max}"));
        }
    }
    ValidationResponse::valid(number_value(n))
}

fn validate_boolean(value: &Value, params: &BooleanParams) -> ValidationResponse {
    let default = Value::Bool(params.default);
    match value {
        Value::Null => ValidationResponse::valid(default),
        Value::Bool(b) => ValidationResponse::valid(Value::Bool(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => ValidationResponse::valid(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => ValidationResponse::valid(Value::Bool(false)),
        _ => ValidationResponse::invalid(default, "This value does not evaluate to type boolean"),
    }
}

fn validate_regex(value: &Value) -> ValidationResponse {
    match value {
        Value::Null => ValidationResponse::valid(Value::String(String::new())),
        Value::String(raw) => match compile_pattern(raw) {
            Ok(_) => ValidationResponse::valid(value.clone()),
            Err(e) => ValidationResponse::invalid(value.clone(), format!("Invalid regex: {e}")),
        },
        _ => ValidationResponse::invalid(
            Value::String(String::new()),
            "This value does not evaluate to type regex",
        ),
    }
}

fn validate_array(value: &Value, params: &ArrayParams) -> ValidationResponse {
    if value.is_null() {
        return ValidationResponse::valid(Value::Array(params.default.clone()));
    }
    let Some(items) = parse_value_list(value) else {
        return ValidationResponse::invalid(
            Value::Array(params.default.clone()),
            "This value does not evaluate to type Array",
        );
    };
    let Some(child_rule) = params.children.as_deref() else {
        return ValidationResponse::valid(Value::Array(items));
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let response = validate(item, child_rule);
        if !response.is_valid {
            let message = response.message.unwrap_or_default();
            return ValidationResponse::invalid(
                Value::Array(items.clone()),
                format!("Invalid entry at index: {index}. {message}"),
            );
        }
        parsed.push(response.parsed);
    }
    ValidationResponse::valid(Value::Array(parsed))
}

fn validate_object(value: &Value, params: &ObjectParams) -> ValidationResponse {
    let object = match value {
        Value::Object(map) => map.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => return not_an_object(),
        },
        _ => return not_an_object(),
    };

    let mut parsed = object.clone();
    for key in &params.allowed_keys {
        let raw = match object.get(&key.name) {
            Some(raw) => raw,
            None if key.required => &Value::Null,
            None => continue,
        };
        let response = validate(raw, &key.rule);
        if !response.is_valid {
            let message = response.message.unwrap_or_default();
            return ValidationResponse::invalid(
                Value::Object(object),
                format!("Value of key: {} is invalid: {message}", key.name),
            );
        }
        parsed.insert(key.name.clone(), response.parsed);
    }
    ValidationResponse::valid(Value::Object(parsed))
}

fn not_an_object() -> ValidationResponse {
    ValidationResponse::invalid(
        Value::Object(Map::new()),
        "This value does not evaluate to type Object",
    )
}

fn validate_nested_object_array(
    value: &Value,
    params: &NestedObjectArrayParams,
) -> ValidationResponse {
    let default = Value::Array(params.default.clone());
    let items = match value {
        Value::Null => return ValidationResponse::valid(default),
        Value::Array(items) => items.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            _ => {
                return ValidationResponse::invalid(
                    default,
                    "This value does not evaluate to type Array<Object>",
                );
            }
        },
        _ => {
            return ValidationResponse::invalid(
                default,
                "This value does not evaluate to type Array<Object>",
            );
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let response = validate(item, &params.children);
        if !response.is_valid {
            let message = response.message.unwrap_or_default();
            return ValidationResponse::invalid(
                Value::Array(items.clone()),
                format!("Invalid entry at index: {index}. {message}"),
            );
        }
        parsed.push(response.parsed);
    }

    // Uniqueness is checked among these siblings only; nested lists carry their own rules.
    for key in &params.unique {
        let mut seen: Vec<&Value> = Vec::new();
        for item in &parsed {
            if let Some(v) = item.get(key) {
                if seen.contains(&v) {
                    return ValidationResponse::invalid(
                        Value::Array(parsed.clone()),
                        format!(
                            "Duplicate values found for the following properties, in the array entries, that must be unique -- {key}."
                        ),
                    );
                }
                seen.push(v);
            }
        }
    }
    ValidationResponse::valid(Value::Array(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn option_rule() -> ValidationRule {
        let leaf = ValidationRule::Object(ObjectParams {
            allowed_keys: vec![
                KeyRule::new(
                    "label",
                    ValidationRule::Text(TextParams {
                        required: true,
                        ..Default::default()
                    }),
                )
                .required(),
                KeyRule::new("value", ValidationRule::text()),
            ],
        });
        ValidationRule::NestedObjectArray(NestedObjectArrayParams {
            children: Box::new(ValidationRule::Object(ObjectParams {
                allowed_keys: vec![
                    KeyRule::new(
                        "label",
                        ValidationRule::Text(TextParams {
                            required: true,
                            ..Default::default()
                        }),
                    )
                    .required(),
                    KeyRule::new("value", ValidationRule::text()),
                    KeyRule::new(
                        "children",
                        ValidationRule::Array(ArrayParams {
                            children: Some(Box::new(leaf)),
                            default: Vec::new(),
                        }),
                    ),
                ],
            })),
            unique: vec!["value".to_string()],
            default: Vec::new(),
        })
    }

    #[test]
    fn test_malformed_regex_is_invalid() {
        let response = validate(&json!("(unterminated"), &ValidationRule::Regex);
        assert!(!response.is_valid);
        assert!(response.message.is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_lookaround_and_backreference_unsupported() {
        for pattern in ["^(?=.*\\d).+$", "/(a)\\1/"] {
            let response = validate(&json!(pattern), &ValidationRule::Regex);
            assert!(!response.is_valid);
            assert!(response.message.is_some_and(|m| m.starts_with("Invalid regex")));
        }
    }

    #[test]
    fn test_regex_with_flags() {
        let response = validate(&json!("/^abc$/i"), &ValidationRule::Regex);
        assert!(response.is_valid);
        let re = compile_pattern("/^abc$/i").unwrap();
        assert!(re.is_match("ABC"));
        // Unknown flags make the whole string the pattern.
        let re = compile_pattern("/a/zz").unwrap();
        assert!(re.is_match("/a/zz"));
    }

    #[test]
    fn test_text_coercion() {
        let rule = ValidationRule::text();
        assert_eq!(validate(&json!(42), &rule).parsed, json!("42"));
        assert_eq!(validate(&json!(true), &rule).parsed, json!("true"));
        assert!(validate(&Value::Null, &rule).is_valid);
        assert!(!validate(&json!({"a": 1}), &rule).is_valid);

        let required = ValidationRule::Text(TextParams {
            required: true,
            ..Default::default()
        });
        assert!(!validate(&json!(""), &required).is_valid);
        assert!(!validate(&Value::Null, &required).is_valid);
    }

    #[test]
    fn test_text_allowed_values() {
        let rule = ValidationRule::Text(TextParams {
            default: Some("SHOW_ALL".to_string()),
            allowed_values: vec!["SHOW_ALL".to_string(), "SHOW_PARENT".to_string()],
            ..Default::default()
        });
        assert!(validate(&json!("SHOW_PARENT"), &rule).is_valid);
        let response = validate(&json!("SHOW_NONE"), &rule);
        assert!(!response.is_valid);
        assert_eq!(response.parsed, json!("SHOW_ALL"));
    }

    #[test]
    fn test_number_rules() {
        let natural = ValidationRule::Number(NumberParams {
            natural: true,
            ..Default::default()
        });
        assert_eq!(validate(&json!("12"), &natural).parsed, json!(12));
        assert!(!validate(&json!(-1), &natural).is_valid);
        assert!(!validate(&json!(1.5), &natural).is_valid);
        assert!(!validate(&json!("abc"), &natural).is_valid);

        let bounded = ValidationRule::Number(NumberParams {
            min: Some(1.0),
            max: Some(10.0),
            ..Default::default()
        });
        assert!(validate(&json!(5.5), &bounded).is_valid);
        assert!(!validate(&json!(11), &bounded).is_valid);
        assert!(validate(&Value::Null, &bounded).is_valid);
    }

    #[test]
    fn test_boolean_coercion() {
        let rule = ValidationRule::boolean();
        assert_eq!(validate(&json!("true"), &rule).parsed, json!(true));
        assert_eq!(validate(&Value::Null, &rule).parsed, json!(false));
        assert!(!validate(&json!(3), &rule).is_valid);
    }

    #[test]
    fn test_parse_value_list() {
        assert_eq!(
            parse_value_list(&json!(r#"["b", "a"]"#)),
            Some(vec![json!("b"), json!("a")])
        );
        assert_eq!(
            parse_value_list(&json!("green, red ,blue")),
            Some(vec![json!("green"), json!("red"), json!("blue")])
        );
        assert_eq!(parse_value_list(&json!("")), Some(vec![]));
        assert_eq!(
            parse_value_list(&json!(["x", "y", "x", 1, 1])),
            Some(vec![json!("x"), json!("y"), json!(1)])
        );
        assert_eq!(parse_value_list(&json!({"a": 1})), None);
    }

    #[test]
    fn test_array_children() {
        let rule = ValidationRule::Array(ArrayParams {
            children: Some(Box::new(ValidationRule::number())),
            default: Vec::new(),
        });
        assert_eq!(validate(&json!("1, 2"), &rule).parsed, json!([1, 2]));
        let response = validate(&json!(["1", "x"]), &rule);
        assert!(!response.is_valid);
        assert!(response.message.unwrap().contains("index: 1"));
    }

    #[test]
    fn test_object_required_key() {
        let rule = ValidationRule::Object(ObjectParams {
            allowed_keys: vec![KeyRule::new("label", ValidationRule::text()).required()],
        });
        assert!(validate(&json!({"label": "A", "extra": 1}), &rule).is_valid);
        assert!(validate(&json!(r#"{"label": "A"}"#), &rule).is_valid);
        assert!(!validate(&json!([1]), &rule).is_valid);
    }

    #[test]
    fn test_nested_unique_among_siblings() {
        let rule = option_rule();
        let duplicate_siblings = json!([
            {"label": "A", "value": "a"},
            {"label": "B", "value": "a"}
        ]);
        let response = validate(&duplicate_siblings, &rule);
        assert!(!response.is_valid);
        assert!(response.message.unwrap().contains("value"));

        // The same value at a different nesting level is not a sibling duplicate.
        let across_levels = json!([
            {"label": "A", "value": "a", "children": [{"label": "A1", "value": "a"}]},
            {"label": "B", "value": "b"}
        ]);
        assert!(validate(&across_levels, &rule).is_valid);
    }

    #[test]
    fn test_nested_missing_label() {
        let response = validate(&json!([{"value": "a"}]), &option_rule());
        assert!(!response.is_valid);
        assert!(response.message.unwrap().contains("index: 0"));
    }

    #[test]
    fn test_function_rule() {
        let rule = ValidationRule::function("Array of values", |value| {
            ValidationResponse::valid(Value::Array(parse_value_list(value).unwrap_or_default()))
        });
        assert_eq!(validate(&json!("a,b"), &rule).parsed, json!(["a", "b"]));
    }

    #[test]
    fn test_validate_properties() {
        let mut rules = IndexMap::new();
        rules.insert("isRequired".to_string(), ValidationRule::boolean());
        rules.insert("regex".to_string(), ValidationRule::Regex);
        let mut properties = IndexMap::new();
        properties.insert("regex".to_string(), json!("(bad"));
        let results = validate_properties(&rules, &properties);
        assert!(results["isRequired"].is_valid);
        assert!(!results["regex"].is_valid);
    }
}
