//! Option forests for tree-selection widgets.
//!
//! All searches are depth-first, pre-order, in sibling order. When a value
//! occurs more than once in a forest, the first node in pre-order wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a selected parent node expands into selected entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckedStrategy {
    /// Only the matched node.
    ShowParent,
    /// The matched node's leaves, or the node itself when it is a leaf.
    ShowChild,
    /// The matched node and all of its descendants.
    #[default]
    ShowAll,
}

/// A selectable node with ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionNode {
    pub label: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OptionNode>,
}

impl OptionNode {
    pub fn leaf(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OptionNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn entry(&self) -> OptionEntry {
        OptionEntry {
            label: self.label.clone(),
            value: self.value.clone(),
        }
    }
}

/// A flattened `{label, value}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub label: String,
    pub value: Value,
}

/// Result of [`find_subtree`]. A miss is `found: false` with no entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtreeSearch {
    pub entries: Vec<OptionEntry>,
    pub found: bool,
}

/// Labels and values of a resolved selection, each deduplicated on its own.
///
/// The two lists are not index-aligned once duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedSelection {
    pub labels: Vec<String>,
    pub values: Vec<Value>,
}

/// Option values compare equal when identical, or when both are scalars
/// with the same textual form (`1` matches `"1"`).
pub fn values_match(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First node in pre-order whose value matches `target`.
pub fn find_node<'a>(forest: &'a [OptionNode], target: &Value) -> Option<&'a OptionNode> {
    for node in forest {
        if values_match(&node.value, target) {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, target) {
            return Some(found);
        }
    }
    None
}

/// Locate `target` and expand it according to `mode`.
pub fn find_subtree(forest: &[OptionNode], target: &Value, mode: CheckedStrategy) -> SubtreeSearch {
    let Some(node) = find_node(forest, target) else {
        log::debug!("Option value {} not found", target);
        return SubtreeSearch::default();
    };
    let mut entries = Vec::new();
    match mode {
        CheckedStrategy::ShowParent => entries.push(node.entry()),
        CheckedStrategy::ShowChild => collect_leaves(node, &mut entries),
        CheckedStrategy::ShowAll => collect_all(node, &mut entries),
    }
    SubtreeSearch {
        entries,
        found: true,
    }
}

fn collect_leaves(node: &OptionNode, out: &mut Vec<OptionEntry>) {
    if node.is_leaf() {
        out.push(node.entry());
        return;
    }
    for child in &node.children {
        collect_leaves(child, out);
    }
}

fn collect_all(node: &OptionNode, out: &mut Vec<OptionEntry>) {
    out.push(node.entry());
    for child in &node.children {
        collect_all(child, out);
    }
}

/// Expand each target in order and deduplicate labels and values independently.
pub fn resolve_selection(forest: &[OptionNode], targets: &[Value], mode: CheckedStrategy) -> ResolvedSelection {
    let mut resolved = ResolvedSelection::default();
    for target in targets {
        for entry in find_subtree(forest, target, mode).entries {
            if !resolved.labels.contains(&entry.label) {
                resolved.labels.push(entry.label);
            }
            if !resolved.values.contains(&entry.value) {
                resolved.values.push(entry.value);
            }
        }
    }
    resolved
}

/// Every node of the forest as a pair, pre-order.
pub fn flatten_options(forest: &[OptionNode]) -> Vec<OptionEntry> {
    let mut out = Vec::new();
    for node in forest {
        collect_all(node, &mut out);
    }
    out
}

/// Whether two forests differ as flattened sets of pairs.
pub fn options_differ(a: &[OptionNode], b: &[OptionNode]) -> bool {
    let flat_a = flatten_options(a);
    let flat_b = flatten_options(b);
    flat_a.iter().any(|entry| !flat_b.contains(entry)) || flat_b.iter().any(|entry| !flat_a.contains(entry))
}

/// Whether `value` occurs anywhere in the forest.
pub fn contains_value(forest: &[OptionNode], value: &Value) -> bool {
    find_node(forest, value).is_some()
}

/// Read a forest from a property value. Anything that is not a well-formed
/// array of nodes yields `None`.
pub fn options_from_value(value: &Value) -> Option<Vec<OptionNode>> {
    match value {
        Value::Array(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fruit() -> Vec<OptionNode> {
        vec![
            OptionNode::leaf("Fruit", "fruit").with_children(vec![
                OptionNode::leaf("Apple", "apple"),
                OptionNode::leaf("Banana", "banana"),
            ]),
        ]
    }

    fn entries(pairs: &[(&str, &str)]) -> Vec<OptionEntry> {
        pairs
            .iter()
            .map(|(label, value)| OptionEntry {
                label: label.to_string(),
                value: json!(value),
            })
            .collect()
    }

    #[test]
    fn test_show_child_returns_leaves() {
        let result = find_subtree(&fruit(), &json!("fruit"), CheckedStrategy::ShowChild);
        assert!(result.found);
        assert_eq!(result.entries, entries(&[("Apple", "apple"), ("Banana", "banana")]));
    }

    #[test]
    fn test_show_child_on_leaf_returns_leaf() {
        let result = find_subtree(&fruit(), &json!("apple"), CheckedStrategy::ShowChild);
        assert_eq!(result.entries, entries(&[("Apple", "apple")]));
    }

    #[test]
    fn test_show_parent_and_show_all() {
        let parent = find_subtree(&fruit(), &json!("fruit"), CheckedStrategy::ShowParent);
        assert_eq!(parent.entries, entries(&[("Fruit", "fruit")]));
        let all = find_subtree(&fruit(), &json!("fruit"), CheckedStrategy::ShowAll);
        assert_eq!(
            all.entries,
            entries(&[("Fruit", "fruit"), ("Apple", "apple"), ("Banana", "banana")])
        );
    }

    #[test]
    fn test_miss_is_empty() {
        let result = find_subtree(&fruit(), &json!("kiwi"), CheckedStrategy::ShowAll);
        assert!(!result.found);
        assert!(result.entries.is_empty());
    }

    #[test]
    fn test_duplicate_value_first_preorder_wins() {
        let forest = vec![
            OptionNode::leaf("A", "a").with_children(vec![OptionNode::leaf("First", "dup")]),
            OptionNode::leaf("Second", "dup"),
        ];
        let result = find_subtree(&forest, &json!("dup"), CheckedStrategy::ShowParent);
        assert_eq!(result.entries, entries(&[("First", "dup")]));
    }

    #[test]
    fn test_resolve_selection_dedups_labels() {
        let forest = vec![
            OptionNode::leaf("Red", "red").with_children(vec![OptionNode::leaf("Shared", "s1")]),
            OptionNode::leaf("Blue", "blue").with_children(vec![OptionNode::leaf("Shared", "s2")]),
        ];
        let resolved = resolve_selection(&forest, &[json!("red"), json!("blue")], CheckedStrategy::ShowChild);
        assert_eq!(resolved.labels, vec!["Shared".to_string()]);
        assert_eq!(resolved.values, vec![json!("s1"), json!("s2")]);
    }

    #[test]
    fn test_resolve_selection_is_idempotent() {
        let targets = [json!("banana"), json!("fruit")];
        let first = resolve_selection(&fruit(), &targets, CheckedStrategy::ShowAll);
        let second = resolve_selection(&fruit(), &targets, CheckedStrategy::ShowAll);
        assert_eq!(first, second);
        assert_eq!(first.labels, vec!["Banana", "Fruit", "Apple"]);
    }

    #[test]
    fn test_scalar_values_match_textually() {
        let forest = vec![OptionNode::leaf("One", 1)];
        assert!(contains_value(&forest, &json!("1")));
        assert!(!contains_value(&forest, &json!("2")));
    }

    #[test]
    fn test_options_differ() {
        let mut changed = fruit();
        assert!(!options_differ(&fruit(), &changed));
        changed[0].children.push(OptionNode::leaf("Cherry", "cherry"));
        assert!(options_differ(&fruit(), &changed));
    }

    #[test]
    fn test_options_from_value() {
        let forest = options_from_value(&json!([
            { "label": "Fruit", "value": "fruit", "children": [{ "label": "Apple", "value": "apple" }] }
        ]))
        .unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children, vec![OptionNode::leaf("Apple", "apple")]);
        assert!(options_from_value(&json!([{ "value": "no-label" }])).is_none());
        assert!(options_from_value(&json!("nope")).is_none());
    }
}
