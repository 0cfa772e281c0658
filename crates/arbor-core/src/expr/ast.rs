//! Engine-neutral syntax tree, source positions and value trace
//!
//! Every node carries an id; the source-position table, the checker's type
//! map and the evaluation trace are all keyed by it.

use super::types::ExprType;
use super::value::ExprValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Syntax tree node identifier
pub type ExprId = i64;

/// Literal constant
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Literal {
    /// The runtime value of this literal
    pub fn to_value(&self) -> ExprValue {
        match self {
            Literal::Null => ExprValue::Null,
            Literal::Bool(b) => ExprValue::Bool(*b),
            Literal::Int(i) => ExprValue::Int(*i),
            Literal::Uint(u) => ExprValue::Uint(*u),
            Literal::Double(d) => ExprValue::Double(*d),
            Literal::String(s) => ExprValue::String(s.clone()),
            Literal::Bytes(b) => ExprValue::Bytes(b.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Uint(u) => write!(f, "{}u", u),
            Literal::Double(d) => write!(f, "{:?}", d),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
        }
    }
}

/// Syntax tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

/// Syntax tree node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal constant
    Literal(Literal),

    /// Variable reference
    Ident(String),

    /// Field selection (`operand.field`); `test_only` for presence tests
    Select {
        operand: Box<Expr>,
        field: String,
        test_only: bool,
    },

    /// Function or operator call, optionally in receiver style
    Call {
        function: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },

    /// List construction
    List(Vec<Expr>),

    /// Map construction
    Map(Vec<(Expr, Expr)>),

    /// Fold over a list or map, produced by macro expansion
    Comprehension(Box<Comprehension>),
}

/// A fold over a range
///
/// Evaluation binds `accu_var` to `accu_init`, then for each element of
/// `iter_range` (bound to `iter_var`) evaluates `loop_step` into the
/// accumulator while `loop_condition` holds, and finally yields `result`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub iter_var: String,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Expr { id, kind }
    }

    /// Name of the identifier at the root of a select chain (`a` in `a.b.c`)
    pub fn select_root(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Select { operand, .. } => operand.select_root(),
            _ => None,
        }
    }

    /// Returns true if this is a call to `function`
    pub fn is_call_to(&self, function: &str) -> bool {
        matches!(&self.kind, ExprKind::Call { function: f, .. } if f == function)
    }
}

/// Operator function names and their surface syntax
pub mod operators {
    pub const CONDITIONAL: &str = "_?_:_";
    pub const LOGICAL_AND: &str = "_&&_";
    pub const LOGICAL_OR: &str = "_||_";
    pub const LOGICAL_NOT: &str = "!_";
    pub const NEGATE: &str = "-_";
    pub const EQUALS: &str = "_==_";
    pub const NOT_EQUALS: &str = "_!=_";
    pub const LESS: &str = "_<_";
    pub const LESS_EQUALS: &str = "_<=_";
    pub const GREATER: &str = "_>_";
    pub const GREATER_EQUALS: &str = "_>=_";
    pub const ADD: &str = "_+_";
    pub const SUBTRACT: &str = "_-_";
    pub const MULTIPLY: &str = "_*_";
    pub const DIVIDE: &str = "_/_";
    pub const MODULO: &str = "_%_";
    pub const INDEX: &str = "_[_]";
    pub const IN: &str = "@in";

    /// Surface symbol and precedence (higher binds tighter) of a binary operator
    pub fn binary(function: &str) -> Option<(&'static str, u8)> {
        let found = match function {
            LOGICAL_OR => ("||", 1),
            LOGICAL_AND => ("&&", 2),
            EQUALS => ("==", 3),
            NOT_EQUALS => ("!=", 3),
            LESS => ("<", 3),
            LESS_EQUALS => ("<=", 3),
            GREATER => (">", 3),
            GREATER_EQUALS => (">=", 3),
            IN => ("in", 3),
            ADD => ("+", 4),
            SUBTRACT => ("-", 4),
            MULTIPLY => ("*", 5),
            DIVIDE => ("/", 5),
            MODULO => ("%", 5),
            _ => return None,
        };
        Some(found)
    }

    /// Surface symbol of a unary operator
    pub fn unary(function: &str) -> Option<&'static str> {
        match function {
            LOGICAL_NOT => Some("!"),
            NEGATE => Some("-"),
            _ => None,
        }
    }

    /// Returns true if this is a comparison operator
    pub fn is_comparison(function: &str) -> bool {
        matches!(binary(function), Some((_, 3)))
    }

    /// Returns true if this is a logical operator
    pub fn is_logical(function: &str) -> bool {
        matches!(function, LOGICAL_AND | LOGICAL_OR | LOGICAL_NOT)
    }
}

/// Location of a syntax tree node in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Character offset from the start of the source
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

/// Source-position table of a parsed expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfo {
    /// Character offset at which each line starts; the first is always 0
    pub line_starts: Vec<usize>,

    /// Character offset of each node
    pub positions: HashMap<ExprId, usize>,

    /// Original macro call of each node produced by macro expansion
    pub macro_calls: HashMap<ExprId, Expr>,
}

impl SourceInfo {
    /// Create an empty table for `source`
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, c) in source.chars().enumerate() {
            if c == '\n' {
                line_starts.push(offset + 1);
            }
        }
        SourceInfo {
            line_starts,
            positions: HashMap::new(),
            macro_calls: HashMap::new(),
        }
    }

    /// Line and column of a node
    pub fn position(&self, id: ExprId) -> Option<SourcePosition> {
        self.positions.get(&id).map(|&offset| self.locate(offset))
    }

    /// Line and column of a character offset
    pub fn locate(&self, offset: usize) -> SourcePosition {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        SourcePosition {
            offset,
            line: line_index + 1,
            column: offset - line_start + 1,
        }
    }
}

/// A checked syntax tree retained for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub source: String,
    pub expr: Expr,
    pub source_info: SourceInfo,

    /// Checked type of each node
    pub type_map: HashMap<ExprId, ExprType>,
}

impl SyntaxTree {
    pub fn type_of(&self, id: ExprId) -> Option<&ExprType> {
        self.type_map.get(&id)
    }
}

/// Values of the sub-expressions evaluated in one run
///
/// Sparse: sub-expressions skipped by short-circuiting have no entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalTrace {
    values: HashMap<ExprId, ExprValue>,
}

impl EvalTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value of a node
    pub fn record(&mut self, id: ExprId, value: ExprValue) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprValue> {
        self.values.get(&id)
    }

    pub fn contains(&self, id: ExprId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
