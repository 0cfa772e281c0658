//! Per-node evaluation policies

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// How failing children are reported in the result tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardFail {
    /// Unset; behaves as `KeepAll`
    #[default]
    None,
    /// Omit children whose `pass` is false
    Discard,
    /// Keep every visited child
    KeepAll,
}

/// Deterministic total order over sibling rule ids
#[derive(Clone)]
pub struct SortFunc(Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>);

impl SortFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        SortFunc(Arc::new(f))
    }

    /// Ascending order of ids
    pub fn by_id() -> Self {
        SortFunc::new(|a, b| a.cmp(b))
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        (self.0)(a, b)
    }
}

impl fmt::Debug for SortFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SortFunc(..)")
    }
}

/// Evaluation policies of a rule node
///
/// Visiting policies (`stop_if_parent_negative`, `stop_first_positive_child`,
/// `discard_fail`, `sort`) apply to the node's children; `true_if_any`
/// applies to the node's own pass value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Skip children when this node's own result is negative
    pub stop_if_parent_negative: bool,

    /// Stop visiting children after the first one that passes
    pub stop_first_positive_child: bool,

    pub discard_fail: DiscardFail,

    /// Pass is the logical OR of the children's pass values
    pub true_if_any: bool,

    #[serde(skip)]
    pub sort: Option<SortFunc>,
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_if_parent_negative(mut self, enable: bool) -> Self {
        self.stop_if_parent_negative = enable;
        self
    }

    pub fn stop_first_positive_child(mut self, enable: bool) -> Self {
        self.stop_first_positive_child = enable;
        self
    }

    pub fn discard_fail(mut self, policy: DiscardFail) -> Self {
        self.discard_fail = policy;
        self
    }

    pub fn true_if_any(mut self, enable: bool) -> Self {
        self.true_if_any = enable;
        self
    }

    pub fn with_sort(mut self, sort: SortFunc) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Whether failing children are dropped from the result tree
    pub fn discards_failures(&self) -> bool {
        matches!(self.discard_fail, DiscardFail::Discard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_everything() {
        let opts = EvalOptions::default();
        assert!(!opts.stop_if_parent_negative);
        assert!(!opts.stop_first_positive_child);
        assert!(!opts.true_if_any);
        assert_eq!(opts.discard_fail, DiscardFail::None);
        assert!(!opts.discards_failures());
        assert!(opts.sort.is_none());
    }

    #[test]
    fn test_sort_func_reverse() {
        let sort = SortFunc::new(|a, b| b.cmp(a));
        let mut ids = vec!["a", "c", "b"];
        ids.sort_by(|a, b| sort.compare(a, b));
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_options_yaml() {
        let yaml = "stop_first_positive_child: true\ndiscard_fail: discard\n";
        let opts: EvalOptions = serde_yaml::from_str(yaml).unwrap();
        assert!(opts.stop_first_positive_child);
        assert!(opts.discards_failures());
        assert!(!opts.true_if_any);
    }
}
