//! Multi-select tree widget.
//!
//! The selected values and their labels live in meta state. They are
//! materialized from the option forest on mount and whenever the forest or
//! the selection changes without a user edit.

use super::{MetaEdit, RenderDescriptor};
use crate::action::{EventBinding, EventType};
use crate::error::EvalError;
use crate::expression::{Expression, Scope};
use crate::options::{CheckedStrategy, OptionNode, contains_value, find_node, options_differ, options_from_value, resolve_selection};
use crate::schema::WidgetSchema;
use crate::validation::{
    ArrayParams, KeyRule, NestedObjectArrayParams, ObjectParams, TextParams, ValidationResponse, ValidationRule,
    parse_value_list,
};
use crate::widget::WidgetInstance;
use serde_json::{Value, json};

pub const WIDGET_TYPE: &str = "MULTI_SELECT_TREE_WIDGET";

const SELECTED_VALUES: &str = "selectedOptionValueArr";
const SELECTED_LABELS: &str = "selectedLabel";

pub(super) fn render_descriptor() -> RenderDescriptor {
    RenderDescriptor {
        component: "MultiTreeSelectComponent",
        default_rows: 7,
        default_columns: 20,
    }
}

fn label_and_value() -> Vec<KeyRule> {
    vec![
        KeyRule::new(
            "label",
            ValidationRule::Text(TextParams {
                default: Some(String::new()),
                required: true,
                ..Default::default()
            }),
        )
        .required(),
        KeyRule::new(
            "value",
            ValidationRule::Text(TextParams {
                default: Some(String::new()),
                ..Default::default()
            }),
        ),
    ]
}

fn options_rule() -> ValidationRule {
    let mut top_keys = label_and_value();
    top_keys.push(KeyRule::new(
        "children",
        ValidationRule::Array(ArrayParams {
            children: Some(Box::new(ValidationRule::Object(ObjectParams {
                allowed_keys: label_and_value(),
            }))),
            default: Vec::new(),
        }),
    ));
    ValidationRule::NestedObjectArray(NestedObjectArrayParams {
        children: Box::new(ValidationRule::Object(ObjectParams { allowed_keys: top_keys })),
        unique: vec!["value".to_string()],
        default: Vec::new(),
    })
}

fn default_option_value(value: &Value) -> ValidationResponse {
    let values = match value {
        Value::String(_) | Value::Array(_) => parse_value_list(value).unwrap_or_default(),
        _ => Vec::new(),
    };
    ValidationResponse::valid(Value::Array(values))
}

pub(super) fn schema() -> WidgetSchema {
    WidgetSchema::new(WIDGET_TYPE)
        .with_validation(
            "mode",
            ValidationRule::Text(TextParams {
                default: Some("SHOW_ALL".to_string()),
                required: false,
                allowed_values: ["SHOW_PARENT", "SHOW_CHILD", "SHOW_ALL"]
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            }),
        )
        .with_validation("options", options_rule())
        .with_validation(
            "defaultOptionValue",
            ValidationRule::function("Array of values", default_option_value),
        )
        .with_validation("placeholderText", ValidationRule::text())
        .with_validation("isRequired", ValidationRule::boolean())
        .with_validation(
            "isVisible",
            ValidationRule::Boolean(crate::validation::BooleanParams { default: true }),
        )
        .with_validation("isDisabled", ValidationRule::boolean())
        .with_validation("allowClear", ValidationRule::boolean())
        .with_validation("expandAll", ValidationRule::boolean())
        .with_validation("labelText", ValidationRule::text())
        .with_trigger("onOptionChange")
        .with_meta(SELECTED_VALUES, Value::Null)
        .with_meta(SELECTED_LABELS, json!([]))
        .with_default(SELECTED_VALUES, "defaultOptionValue")
        .with_default(SELECTED_LABELS, "defaultOptionValue")
        .with_derived("selectedOptionLabels", Expression::reference(SELECTED_LABELS))
        .with_derived(
            "selectedOptionValues",
            Expression::native(
                "{{ this.selectedOptionValueArr.filter((v) => treeHasValue(this.options, v)) }}",
                selected_option_values,
            ),
        )
        .with_derived(
            "isValid",
            Expression::native(
                "{{ this.isRequired ? this.selectedOptionValues?.length > 0 : true }}",
                |scope| {
                    let valid = !scope.truthy("isRequired") || !scope.array("selectedOptionValues").is_empty();
                    Ok(Some(Value::Bool(valid)))
                },
            ),
        )
        .with_derived("value", Expression::reference("selectedOptionValues"))
}

fn selected_option_values(scope: &Scope<'_>) -> Result<Option<Value>, EvalError> {
    let forest = match scope.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(options @ Value::Array(_)) => options_from_value(options).unwrap_or_default(),
        Some(_) => return Err(type_mismatch("options")),
    };
    let selected = match scope.get(SELECTED_VALUES) {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(values)) => values.as_slice(),
        Some(_) => return Err(type_mismatch(SELECTED_VALUES)),
    };
    let kept: Vec<Value> = selected
        .iter()
        .filter(|value| contains_value(&forest, value))
        .cloned()
        .collect();
    Ok(Some(Value::Array(kept)))
}

fn type_mismatch(property: &str) -> EvalError {
    EvalError::TypeMismatch {
        property: property.to_string(),
        expected: "array".to_string(),
    }
}

/// The forest the widget renders: empty unless `options` validated cleanly.
fn forest(instance: &WidgetInstance) -> Vec<OptionNode> {
    if !instance.is_property_valid("options") {
        return Vec::new();
    }
    instance
        .property("options")
        .and_then(options_from_value)
        .unwrap_or_default()
}

fn mode(instance: &WidgetInstance) -> CheckedStrategy {
    instance
        .property("mode")
        .and_then(|mode| serde_json::from_value(mode.clone()).ok())
        .unwrap_or_default()
}

/// Resolve the current selection into label and value meta writes.
pub(super) fn materialize(instance: &WidgetInstance) -> Vec<MetaEdit> {
    let targets: Vec<Value> = match instance.meta_value(SELECTED_VALUES) {
        Some(Value::Array(values)) => values.clone(),
        _ => Vec::new(),
    };
    let resolved = resolve_selection(&forest(instance), &targets, mode(instance));
    let labels = resolved.labels.into_iter().map(Value::String).collect();
    vec![
        MetaEdit::new(SELECTED_LABELS, Value::Array(labels)),
        MetaEdit::new(SELECTED_VALUES, Value::Array(resolved.values)),
    ]
}

/// React to a persisted-property change. `previous` is the parsed value
/// before the change.
pub(super) fn on_property_changed(instance: &WidgetInstance, name: &str, previous: Option<&Value>) -> Vec<MetaEdit> {
    if name != "options" || instance.is_dirty() {
        return Vec::new();
    }
    let before = previous.and_then(options_from_value).unwrap_or_default();
    if options_differ(&before, &forest(instance)) {
        materialize(instance)
    } else {
        Vec::new()
    }
}

/// React to a runtime write of a meta property.
pub(super) fn on_meta_written(instance: &WidgetInstance, key: &str) -> Vec<MetaEdit> {
    if key == SELECTED_VALUES && !instance.is_dirty() {
        materialize(instance)
    } else {
        Vec::new()
    }
}

/// The edits a user's option pick produces: values first, then labels with
/// the `onOptionChange` binding.
pub(super) fn option_change(instance: &WidgetInstance, values: &[Value]) -> Vec<MetaEdit> {
    let forest = forest(instance);
    let labels: Vec<Value> = values
        .iter()
        .filter_map(|value| find_node(&forest, value))
        .map(|node| Value::String(node.label.clone()))
        .collect();
    let binding = instance
        .property("onOptionChange")
        .and_then(Value::as_str)
        .filter(|expression| !expression.is_empty())
        .map(|expression| EventBinding::new("onOptionChange", expression, EventType::OnOptionChange));
    vec![
        MetaEdit::new(SELECTED_VALUES, Value::Array(values.to_vec())),
        MetaEdit {
            binding,
            ..MetaEdit::new(SELECTED_LABELS, Value::Array(labels))
        },
    ]
}
