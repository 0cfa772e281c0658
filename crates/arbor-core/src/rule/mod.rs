//! Rule tree definitions

pub mod node;
pub mod options;

pub use node::RuleNode;
pub use options::{DiscardFail, EvalOptions, SortFunc};
