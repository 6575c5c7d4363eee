//! Derived-property expressions and the read-only scope they evaluate against.
//!
//! An [`Expression`] keeps its template source (`{{ this.text }}`) next to a
//! tagged body. The names it reads under `this.` are extracted once, when the
//! expression is built, and drive the schema's dependency graph. Evaluation
//! only ever sees a [`Scope`]: a snapshot of one instance's persisted,
//! meta and already-resolved derived values.

use crate::error::EvalError;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, LazyLock};

static THIS_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bthis\.([A-Za-z_$][A-Za-z0-9_$]*)").expect("static pattern is valid")
});

/// Rust implementation of an expression body.
pub type NativeFn = Arc<dyn Fn(&Scope<'_>) -> Result<Option<Value>, EvalError> + Send + Sync>;

/// How an expression is evaluated.
#[derive(Clone)]
pub enum ExpressionBody {
    /// Pass-through of a single property: `{{this.name}}`.
    Reference(String),
    /// Body implemented in Rust against the scope.
    Native(NativeFn),
    /// Opaque template, only an external sandbox can evaluate it.
    Script,
}

/// A derived-property expression with its statically extracted dependencies.
#[derive(Clone)]
pub struct Expression {
    source: String,
    body: ExpressionBody,
    dependencies: Vec<String>,
}

impl Expression {
    /// `{{this.<name>}}`.
    pub fn reference(name: impl Into<String>) -> Self {
        let name = name.into();
        let source = format!("{{{{this.{name}}}}}");
        Self::build(source, ExpressionBody::Reference(name))
    }

    /// A template whose body is implemented by `body`.
    ///
    /// Dependencies still come from `source`, so the template must mention
    /// every property the closure reads.
    pub fn native<F>(source: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Option<Value>, EvalError> + Send + Sync + 'static,
    {
        Self::build(source.into(), ExpressionBody::Native(Arc::new(body)))
    }

    /// An opaque template for an external evaluator.
    pub fn script(source: impl Into<String>) -> Self {
        Self::build(source.into(), ExpressionBody::Script)
    }

    fn build(source: String, body: ExpressionBody) -> Self {
        let dependencies = extract_dependencies(&source);
        Self {
            source,
            body,
            dependencies,
        }
    }

    /// The template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The evaluation body.
    pub fn body(&self) -> &ExpressionBody {
        &self.body
    }

    /// Names read under `this.`, in first-mention order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            ExpressionBody::Reference(_) => "Reference",
            ExpressionBody::Native(_) => "Native",
            ExpressionBody::Script => "Script",
        };
        f.debug_struct("Expression")
            .field("kind", &kind)
            .field("source", &self.source)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Extract every `this.<name>` reference from a template, deduplicated.
pub fn extract_dependencies(source: &str) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    for capture in THIS_REFERENCE.captures_iter(source) {
        let name = &capture[1];
        if !deps.iter().any(|d| d == name) {
            deps.push(name.to_string());
        }
    }
    deps
}

/// Read-only view of one widget instance during evaluation.
///
/// `this.<name>` resolves against derived values first, then meta values,
/// then the dirty flag, then persisted properties.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    properties: &'a IndexMap<String, Value>,
    meta: &'a IndexMap<String, Value>,
    derived: &'a IndexMap<String, Option<Value>>,
    is_dirty: &'a Value,
}

const DIRTY_KEY: &str = "isDirty";

impl<'a> Scope<'a> {
    /// Build a scope over an instance snapshot. `is_dirty` must be a JSON boolean.
    pub fn new(
        properties: &'a IndexMap<String, Value>,
        meta: &'a IndexMap<String, Value>,
        derived: &'a IndexMap<String, Option<Value>>,
        is_dirty: &'a Value,
    ) -> Self {
        Self {
            properties,
            meta,
            derived,
            is_dirty,
        }
    }

    /// Look up `this.<name>`. `None` is `undefined`.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        if let Some(value) = self.derived.get(name) {
            return value.as_ref();
        }
        if let Some(value) = self.meta.get(name) {
            return Some(value);
        }
        if name == DIRTY_KEY {
            return Some(self.is_dirty);
        }
        self.properties.get(name)
    }

    /// JavaScript-style truthiness of `this.<name>`.
    pub fn truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(is_truthy)
    }

    /// `this.<name>` as a string slice, if it is a string.
    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    /// `this.<name>` as an array; anything else reads as empty.
    pub fn array(&self, name: &str) -> &'a [Value] {
        match self.get(name) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

/// JavaScript truthiness for a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The sandboxed evaluation capability.
///
/// Implementations must be pure over the scope: no ambient or global state.
pub trait ExpressionEvaluator {
    /// Evaluate `expression`; `Ok(None)` is `undefined`.
    fn evaluate(&self, expression: &Expression, scope: &Scope<'_>)
    -> Result<Option<Value>, EvalError>;
}

/// Evaluates reference and native bodies; rejects opaque scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEvaluator;

impl ExpressionEvaluator for NativeEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, EvalError> {
        match expression.body() {
            ExpressionBody::Reference(name) => Ok(scope.get(name).cloned()),
            ExpressionBody::Native(body) => body(scope),
            ExpressionBody::Script => Err(EvalError::Unsupported(expression.source().to_string())),
        }
    }
}
