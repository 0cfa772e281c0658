//! Evaluation result types

use crate::diagnostics::Diagnostic;
use arbor_core::Value;
use serde::{Deserialize, Serialize};

/// Result of evaluating one rule node
///
/// Mirrors the visited part of the rule tree. A fresh tree is produced by
/// every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultNode {
    /// Rule ID
    pub id: String,

    /// Whether the rule passed
    pub pass: bool,

    /// Expression result, `true` for rules without an expression
    pub value: Value,

    /// Results of the kept children, in visiting order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResultNode>,

    /// Explanation of the expression result, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostic>,

    /// Rules visited in this subtree, including this one and discarded children
    pub rules_evaluated: usize,
}

impl ResultNode {
    /// Create a leaf result
    pub fn new(id: impl Into<String>, pass: bool, value: Value) -> Self {
        Self {
            id: id.into(),
            pass,
            value,
            children: Vec::new(),
            diagnostics: None,
            rules_evaluated: 1,
        }
    }

    /// Get a kept child by id
    pub fn child(&self, id: &str) -> Option<&ResultNode> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Find a result by dotted id path starting at this node's id
    pub fn find(&self, path: &str) -> Option<&ResultNode> {
        let mut segments = path.split('.');
        if segments.next() != Some(self.id.as_str()) {
            return None;
        }
        segments.try_fold(self, |node, id| node.child(id))
    }

    /// Dotted paths of every passing node in this subtree, in pre-order
    pub fn passed_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_passed(&self.id, &mut ids);
        ids
    }

    fn collect_passed(&self, path: &str, ids: &mut Vec<String>) {
        if self.pass {
            ids.push(path.to_string());
        }
        for child in &self.children {
            child.collect_passed(&format!("{}.{}", path, child.id), ids);
        }
    }

    /// Number of results in this subtree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ResultNode::size).sum::<usize>()
    }
}
