//! Single-line input widget.

use super::RenderDescriptor;
use crate::action::{EventBinding, EventType};
use crate::error::EvalError;
use crate::expression::{Expression, Scope};
use crate::schema::WidgetSchema;
use crate::validation::{BooleanParams, NumberParams, TextParams, ValidationRule, compile_pattern};
use crate::widget::WidgetInstance;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

pub const WIDGET_TYPE: &str = "INPUT_WIDGET";

pub const INPUT_TYPES: [&str; 4] = ["TEXT", "NUMBER", "PASSWORD", "EMAIL"];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?-u:\w)+([\.-]?(?-u:\w)+)*@(?-u:\w)+([\.-]?(?-u:\w)+)*(\.(?-u:\w){2,3})+$").expect("static pattern is valid")
});

pub(super) fn render_descriptor() -> RenderDescriptor {
    RenderDescriptor {
        component: "InputComponent",
        default_rows: 7,
        default_columns: 20,
    }
}

pub(super) fn schema() -> WidgetSchema {
    WidgetSchema::new(WIDGET_TYPE)
        .with_validation(
            "inputType",
            ValidationRule::Text(TextParams {
                default: Some("TEXT".to_string()),
                required: false,
                allowed_values: INPUT_TYPES.iter().map(|t| t.to_string()).collect(),
            }),
        )
        .with_validation("defaultText", ValidationRule::text())
        .with_validation("placeholderText", ValidationRule::text())
        .with_validation("regex", ValidationRule::Regex)
        .with_validation("errorMessage", ValidationRule::text())
        .with_validation("isRequired", ValidationRule::boolean())
        .with_validation("isVisible", ValidationRule::Boolean(BooleanParams { default: true }))
        .with_validation("isDisabled", ValidationRule::boolean())
        .with_validation(
            "maxChars",
            ValidationRule::Number(NumberParams {
                natural: true,
                ..Default::default()
            }),
        )
        .with_validation("minNum", ValidationRule::number())
        .with_validation("maxNum", ValidationRule::number())
        .with_validation("label", ValidationRule::text())
        .with_trigger("onTextChanged")
        .with_meta("text", Value::Null)
        .with_meta("isFocused", json!(false))
        .with_default("text", "defaultText")
        .with_derived(
            "isValid",
            Expression::native(
                "{{ this.inputType === 'EMAIL' ? isEmail(this.text) : this.inputType === 'NUMBER' \
                 ? !isNaN(this.text) : this.isRequired ? !!this.text && matches(this.regex, this.text) \
                 : matches(this.regex, this.text) }}",
                is_valid,
            ),
        )
        .with_derived("value", Expression::reference("text"))
}

/// Text typed so far. `undefined` has no text.
fn text_of(scope: &Scope<'_>) -> Option<String> {
    match scope.get("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn is_valid(scope: &Scope<'_>) -> Result<Option<Value>, EvalError> {
    let text = text_of(scope);
    let valid = match scope.str("inputType") {
        Some("EMAIL") => text.as_deref().is_some_and(|t| EMAIL.is_match(t)),
        Some("NUMBER") => text.as_deref().is_some_and(|t| {
            let trimmed = t.trim();
            trimmed.is_empty() || trimmed.parse::<f64>().is_ok()
        }),
        _ => {
            let pattern = match scope.str("regex").filter(|r| !r.is_empty()) {
                Some(raw) => Some(compile_pattern(raw).map_err(|e| EvalError::Failed(e.to_string()))?),
                None => None,
            };
            let text = text.unwrap_or_default();
            if scope.truthy("isRequired") && text.is_empty() {
                false
            } else {
                pattern.is_none_or(|p| p.is_match(&text))
            }
        }
    };
    Ok(Some(Value::Bool(valid)))
}

/// The `onTextChanged` binding, when one is configured.
pub(super) fn text_binding(instance: &WidgetInstance) -> Option<EventBinding> {
    instance
        .property("onTextChanged")
        .and_then(Value::as_str)
        .filter(|expression| !expression.is_empty())
        .map(|expression| EventBinding::new("onTextChanged", expression, EventType::OnTextChange))
}
