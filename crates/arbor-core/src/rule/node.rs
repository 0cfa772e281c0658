//! Rule node definitions

use super::options::EvalOptions;
use crate::types::{Schema, Value, ValueType};
use serde::{Deserialize, Serialize};

/// A node of a rule tree
///
/// Nodes are built and owned by the caller. Compilation only reads them;
/// derived artifacts live in the compiled tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleNode {
    /// Rule ID, unique among siblings
    pub id: String,

    /// Expression text; `None` or blank for aggregator nodes
    #[serde(default)]
    pub expression: Option<String>,

    /// Own schema; when absent the nearest ancestor's schema applies
    #[serde(default)]
    pub schema: Option<Schema>,

    /// Declared result type of the expression
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub result_type: Option<ValueType>,

    /// Value bound to `self` for this node's expression only
    #[serde(default)]
    pub self_value: Option<Value>,

    #[serde(default)]
    pub options: EvalOptions,

    /// Child rules in declaration order
    #[serde(default)]
    pub children: Vec<RuleNode>,
}

impl RuleNode {
    /// Create a new rule node
    pub fn new(id: impl Into<String>) -> Self {
        RuleNode {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the expression
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Set the schema
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the declared result type
    pub fn with_result_type(mut self, result_type: ValueType) -> Self {
        self.result_type = Some(result_type);
        self
    }

    /// Set the value bound to `self`
    pub fn with_self_value(mut self, value: impl Into<Value>) -> Self {
        self.self_value = Some(value.into());
        self
    }

    /// Set evaluation options
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a child
    pub fn add_child(mut self, child: RuleNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add multiple children
    pub fn with_children(mut self, children: impl IntoIterator<Item = RuleNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// The expression text, if it is non-blank
    pub fn expression_text(&self) -> Option<&str> {
        self.expression
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Number of nodes in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(RuleNode::size).sum::<usize>()
    }
}
