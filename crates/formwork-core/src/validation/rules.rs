//! Validation rule declarations.

use super::ValidationResponse;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A pure validator supplied by a widget schema.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> ValidationResponse + Send + Sync>;

/// How a raw property value is checked and coerced.
#[derive(Debug, Clone)]
pub enum ValidationRule {
    Text(TextParams),
    Number(NumberParams),
    Boolean(BooleanParams),
    /// A regular expression, bare or in `/pattern/flags` form.
    Regex,
    Array(ArrayParams),
    Object(ObjectParams),
    /// An array of objects validated element-wise, with sibling uniqueness.
    NestedObjectArray(NestedObjectArrayParams),
    Function(FunctionParams),
}

impl ValidationRule {
    /// Plain optional text.
    pub fn text() -> Self {
        Self::Text(TextParams::default())
    }

    /// Plain optional number.
    pub fn number() -> Self {
        Self::Number(NumberParams::default())
    }

    /// Boolean defaulting to `false`.
    pub fn boolean() -> Self {
        Self::Boolean(BooleanParams::default())
    }

    /// Run `validator` and report `expected` as the accepted shape.
    pub fn function<F>(expected: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> ValidationResponse + Send + Sync + 'static,
    {
        Self::Function(FunctionParams {
            validator: Arc::new(validator),
            expected: expected.into(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextParams {
    pub default: Option<String>,
    pub required: bool,
    /// When non-empty, the only accepted values.
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NumberParams {
    pub default: Option<f64>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Non-negative integers only.
    pub natural: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BooleanParams {
    pub default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayParams {
    /// Rule applied to every element.
    pub children: Option<Box<ValidationRule>>,
    pub default: Vec<Value>,
}

/// One declared key of an object rule.
#[derive(Debug, Clone)]
pub struct KeyRule {
    pub name: String,
    pub rule: ValidationRule,
    /// Missing keys are validated as `undefined` instead of being skipped.
    pub required: bool,
}

impl KeyRule {
    pub fn new(name: impl Into<String>, rule: ValidationRule) -> Self {
        Self {
            name: name.into(),
            rule,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectParams {
    pub allowed_keys: Vec<KeyRule>,
}

#[derive(Debug, Clone)]
pub struct NestedObjectArrayParams {
    /// Rule for each element, normally an [`ValidationRule::Object`].
    pub children: Box<ValidationRule>,
    /// Keys whose values must be unique among sibling elements.
    pub unique: Vec<String>,
    pub default: Vec<Value>,
}

#[derive(Clone)]
pub struct FunctionParams {
    pub validator: ValidatorFn,
    /// Human readable description of the accepted shape.
    pub expected: String,
}

impl fmt::Debug for FunctionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionParams")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}
