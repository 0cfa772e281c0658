//! Type checker
//!
//! Infers the type of every node of a parsed expression against a set of
//! declarations and validates operator and function use. Dynamic types
//! defer checking to runtime.

use super::builtins;
use crate::error::CheckError;
use arbor_core::expr::ast::operators;
use arbor_core::expr::{
    Comprehension, Decl, Declarations, Expr, ExprId, ExprKind, ExprType, Literal, Overload,
};
use std::collections::HashMap;

type CheckResult<T> = std::result::Result<T, CheckError>;

/// Result of checking an expression
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedExpression {
    /// Type of the whole expression
    pub result_type: ExprType,

    /// Type of every node
    pub type_map: HashMap<ExprId, ExprType>,
}

/// Type checker
pub struct TypeChecker<'a> {
    declarations: &'a Declarations,
    /// Comprehension variables, innermost last
    scopes: Vec<HashMap<String, ExprType>>,
    type_map: HashMap<ExprId, ExprType>,
}

impl<'a> TypeChecker<'a> {
    /// Create a new type checker over `declarations`
    pub fn new(declarations: &'a Declarations) -> Self {
        Self {
            declarations,
            scopes: Vec::new(),
            type_map: HashMap::new(),
        }
    }

    /// Infer and validate the type of an expression
    pub fn check(mut self, expr: &Expr) -> CheckResult<CheckedExpression> {
        let result_type = self.check_expr(expr)?;
        Ok(CheckedExpression {
            result_type,
            type_map: self.type_map,
        })
    }

    fn check_expr(&mut self, expr: &Expr) -> CheckResult<ExprType> {
        let ty = match &expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Ident(name) => self.resolve_ident(name)?,
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => self.check_select(operand, field, *test_only)?,
            ExprKind::Call {
                function,
                target,
                args,
            } => self.check_call(function, target.as_deref(), args)?,
            ExprKind::List(items) => {
                let mut element = None;
                for item in items {
                    let item_ty = self.check_expr(item)?;
                    element = Some(join_elements(element, item_ty));
                }
                ExprType::list(element.unwrap_or(ExprType::Dyn))
            }
            ExprKind::Map(entries) => {
                let mut key = None;
                let mut value = None;
                for (k, v) in entries {
                    let key_ty = self.check_expr(k)?;
                    if !is_valid_key(&key_ty) {
                        return Err(CheckError::TypeError(format!(
                            "unsupported map key type {}",
                            key_ty
                        )));
                    }
                    key = Some(join_elements(key, key_ty));
                    let value_ty = self.check_expr(v)?;
                    value = Some(join_elements(value, value_ty));
                }
                ExprType::map(
                    key.unwrap_or(ExprType::Dyn),
                    value.unwrap_or(ExprType::Dyn),
                )
            }
            ExprKind::Comprehension(comprehension) => self.check_comprehension(comprehension)?,
        };
        self.type_map.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn resolve_ident(&self, name: &str) -> CheckResult<ExprType> {
        if let Some(ty) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return Ok(ty.clone());
        }
        match self.declarations.get(name) {
            Some(Decl::Ident { ty, .. }) => Ok(ty.clone()),
            Some(Decl::Function { .. }) => Err(CheckError::TypeError(format!(
                "function '{}' cannot be used as a value",
                name
            ))),
            None => Err(CheckError::UndeclaredReference(name.to_string())),
        }
    }

    fn check_select(&mut self, operand: &Expr, field: &str, test_only: bool) -> CheckResult<ExprType> {
        let operand_ty = self.check_expr(operand)?;
        let field_ty = match &operand_ty {
            ExprType::Message(name) => self
                .declarations
                .message(name)
                .and_then(|message| message.fields.get(field))
                .cloned()
                .ok_or_else(|| CheckError::UndefinedField {
                    type_name: name.clone(),
                    field: field.to_string(),
                })?,
            ExprType::Map(key, value) if key.is_assignable_from(&ExprType::STRING) => {
                (**value).clone()
            }
            ty if ty.is_dynamic() => ExprType::Dyn,
            other => {
                return Err(CheckError::TypeError(format!(
                    "type {} does not support field selection",
                    other
                )))
            }
        };
        Ok(if test_only { ExprType::BOOL } else { field_ty })
    }

    fn check_call(&mut self, function: &str, target: Option<&Expr>, args: &[Expr]) -> CheckResult<ExprType> {
        let target_ty = target.map(|t| self.check_expr(t)).transpose()?;
        let arg_tys = args
            .iter()
            .map(|arg| self.check_expr(arg))
            .collect::<CheckResult<Vec<_>>>()?;

        if target.is_none() {
            if let Some(Decl::Function { overloads, .. }) = self.declarations.get(function) {
                return resolve_overload(function, overloads, &arg_tys);
            }
        }

        match target_ty {
            Some(target_ty) => check_method(function, &target_ty, &arg_tys),
            None => check_global(function, &arg_tys),
        }
    }

    fn check_comprehension(&mut self, comprehension: &Comprehension) -> CheckResult<ExprType> {
        let range_ty = self.check_expr(&comprehension.iter_range)?;
        let var_ty = match &range_ty {
            ExprType::List(element) => (**element).clone(),
            ExprType::Map(key, _) => (**key).clone(),
            ty if ty.is_dynamic() => ExprType::Dyn,
            other => {
                return Err(CheckError::TypeError(format!(
                    "cannot iterate over {}",
                    other
                )))
            }
        };
        let init_ty = self.check_expr(&comprehension.accu_init)?;

        let mut scope = HashMap::new();
        scope.insert(comprehension.accu_var.clone(), init_ty.clone());
        scope.insert(comprehension.iter_var.clone(), var_ty);
        self.scopes.push(scope);
        let outcome = self.check_loop(comprehension, init_ty);
        self.scopes.pop();
        outcome
    }

    fn check_loop(&mut self, comprehension: &Comprehension, init_ty: ExprType) -> CheckResult<ExprType> {
        let condition_ty = self.check_expr(&comprehension.loop_condition)?;
        if !ExprType::BOOL.is_assignable_from(&condition_ty) {
            return Err(CheckError::TypeError(format!(
                "loop condition must be bool, got {}",
                condition_ty
            )));
        }

        let step_ty = self.check_expr(&comprehension.loop_step)?;
        if !init_ty.is_assignable_from(&step_ty) {
            return Err(CheckError::TypeError(format!(
                "accumulator of type {} cannot hold {}",
                init_ty, step_ty
            )));
        }

        // The step refines a partially dynamic initial value, e.g. `[]`
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(comprehension.accu_var.clone(), step_ty);
        }
        self.check_expr(&comprehension.result)
    }
}

fn literal_type(literal: &Literal) -> ExprType {
    match literal {
        Literal::Null => ExprType::Null,
        Literal::Bool(_) => ExprType::BOOL,
        Literal::Int(_) => ExprType::INT,
        Literal::Uint(_) => ExprType::UINT,
        Literal::Double(_) => ExprType::DOUBLE,
        Literal::String(_) => ExprType::STRING,
        Literal::Bytes(_) => ExprType::BYTES,
    }
}

/// Common type of list elements or map keys and values
fn join_elements(current: Option<ExprType>, next: ExprType) -> ExprType {
    match current {
        None => next,
        Some(current) if current == next => current,
        Some(_) => ExprType::Dyn,
    }
}

/// Element type of a list concatenation
fn join_list(a: &ExprType, b: &ExprType) -> ExprType {
    if a.is_dynamic() {
        b.clone()
    } else if b.is_dynamic() || a == b {
        a.clone()
    } else {
        ExprType::Dyn
    }
}

/// Result type of the two branches of a conditional
fn join_branches(a: &ExprType, b: &ExprType) -> Option<ExprType> {
    if a == b {
        Some(a.clone())
    } else if a.is_dynamic() || b.is_dynamic() {
        Some(ExprType::Dyn)
    } else if *a == ExprType::Null {
        Some(b.clone())
    } else if *b == ExprType::Null {
        Some(a.clone())
    } else if a.is_assignable_from(b) {
        Some(a.clone())
    } else if b.is_assignable_from(a) {
        Some(b.clone())
    } else {
        None
    }
}

fn is_valid_key(ty: &ExprType) -> bool {
    ty.is_dynamic() || matches!(ty, &ExprType::BOOL | &ExprType::INT | &ExprType::UINT | &ExprType::STRING)
}

fn no_overload(function: &str, args: &[&ExprType]) -> CheckError {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    CheckError::NoMatchingOverload {
        function: function.to_string(),
        args: args.join(", "),
    }
}

fn resolve_overload(function: &str, overloads: &[Overload], args: &[ExprType]) -> CheckResult<ExprType> {
    overloads
        .iter()
        .find(|overload| {
            overload.params.len() == args.len()
                && overload
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| param.is_assignable_from(arg))
        })
        .map(|overload| overload.result.clone())
        .ok_or_else(|| no_overload(function, &args.iter().collect::<Vec<_>>()))
}

/// `ty` is `expected` or dynamic
fn is(ty: &ExprType, expected: &ExprType) -> bool {
    ty.is_dynamic() || ty == expected
}

fn check_global(function: &str, args: &[ExprType]) -> CheckResult<ExprType> {
    let fail = || no_overload(function, &args.iter().collect::<Vec<_>>());

    match (function, args) {
        (operators::LOGICAL_AND | operators::LOGICAL_OR, [a, b]) => {
            if is(a, &ExprType::BOOL) && is(b, &ExprType::BOOL) {
                Ok(ExprType::BOOL)
            } else {
                Err(fail())
            }
        }
        (operators::LOGICAL_NOT, [a]) if is(a, &ExprType::BOOL) => Ok(ExprType::BOOL),
        (operators::NEGATE, [a]) => match a {
            a if a.is_dynamic() => Ok(ExprType::Dyn),
            &ExprType::INT | &ExprType::DOUBLE => Ok(a.clone()),
            _ => Err(fail()),
        },
        (operators::CONDITIONAL, [condition, then, otherwise]) => {
            if !is(condition, &ExprType::BOOL) {
                return Err(CheckError::TypeError(format!(
                    "conditional requires a bool condition, got {}",
                    condition
                )));
            }
            join_branches(then, otherwise).ok_or_else(|| {
                CheckError::TypeError(format!(
                    "conditional branches have incompatible types {} and {}",
                    then, otherwise
                ))
            })
        }
        (operators::EQUALS | operators::NOT_EQUALS, [a, b]) => {
            let comparable = a.is_assignable_from(b)
                || b.is_assignable_from(a)
                || (a.is_numeric() && b.is_numeric())
                || *a == ExprType::Null
                || *b == ExprType::Null;
            if comparable {
                Ok(ExprType::BOOL)
            } else {
                Err(fail())
            }
        }
        (
            operators::LESS | operators::LESS_EQUALS | operators::GREATER | operators::GREATER_EQUALS,
            [a, b],
        ) => {
            let ordered = a.is_dynamic()
                || b.is_dynamic()
                || (a.is_numeric() && b.is_numeric())
                || (a == b
                    && matches!(
                        a,
                        &ExprType::STRING
                            | &ExprType::BYTES
                            | &ExprType::BOOL
                            | &ExprType::DURATION
                            | &ExprType::TIMESTAMP
                    ));
            if ordered {
                Ok(ExprType::BOOL)
            } else {
                Err(fail())
            }
        }
        (
            operators::ADD | operators::SUBTRACT | operators::MULTIPLY | operators::DIVIDE
            | operators::MODULO,
            [a, b],
        ) => arithmetic(function, a, b).ok_or_else(fail),
        (operators::INDEX, [container, index]) => match container {
            ExprType::List(element) if is(index, &ExprType::INT) || *index == ExprType::UINT => {
                Ok((**element).clone())
            }
            ExprType::Map(key, value) if key.is_assignable_from(index) => Ok((**value).clone()),
            ty if ty.is_dynamic() => Ok(ExprType::Dyn),
            _ => Err(fail()),
        },
        (operators::IN, [element, container]) => match container {
            ExprType::List(item) if item.is_assignable_from(element) => Ok(ExprType::BOOL),
            ExprType::Map(key, _) if key.is_assignable_from(element) => Ok(ExprType::BOOL),
            ty if ty.is_dynamic() => Ok(ExprType::BOOL),
            _ => Err(fail()),
        },
        (builtins::SIZE, [a]) => size_of(a).ok_or_else(fail),
        (builtins::MATCHES, [a, b]) if is(a, &ExprType::STRING) && is(b, &ExprType::STRING) => {
            Ok(ExprType::BOOL)
        }
        (builtins::INT, [a]) => match a {
            a if a.is_dynamic() => Ok(ExprType::INT),
            &ExprType::INT | &ExprType::UINT | &ExprType::DOUBLE | &ExprType::STRING
            | &ExprType::TIMESTAMP => Ok(ExprType::INT),
            _ => Err(fail()),
        },
        (builtins::DOUBLE, [a]) => match a {
            a if a.is_dynamic() => Ok(ExprType::DOUBLE),
            &ExprType::INT | &ExprType::UINT | &ExprType::DOUBLE | &ExprType::STRING => {
                Ok(ExprType::DOUBLE)
            }
            _ => Err(fail()),
        },
        (builtins::STRING, [a]) => match a {
            a if a.is_dynamic() => Ok(ExprType::STRING),
            ExprType::Primitive(_) | ExprType::WellKnown(_) => Ok(ExprType::STRING),
            _ => Err(fail()),
        },
        (builtins::DURATION, [a]) if is(a, &ExprType::STRING) => Ok(ExprType::DURATION),
        (builtins::TIMESTAMP, [a]) if is(a, &ExprType::STRING) || *a == ExprType::INT => {
            Ok(ExprType::TIMESTAMP)
        }
        (name, _) if builtins::is_builtin(name) || is_operator(name) => Err(fail()),
        (name, _) => Err(CheckError::UndeclaredReference(name.to_string())),
    }
}

fn check_method(function: &str, target: &ExprType, args: &[ExprType]) -> CheckResult<ExprType> {
    let mut all: Vec<&ExprType> = vec![target];
    all.extend(args);
    let fail = || no_overload(function, &all);

    match (function, args) {
        (builtins::SIZE, []) => size_of(target).ok_or_else(fail),
        (
            builtins::CONTAINS | builtins::STARTS_WITH | builtins::ENDS_WITH | builtins::MATCHES,
            [arg],
        ) if is(target, &ExprType::STRING) && is(arg, &ExprType::STRING) => Ok(ExprType::BOOL),
        (name, _) if builtins::is_builtin(name) => Err(fail()),
        (name, _) => Err(CheckError::UndeclaredReference(name.to_string())),
    }
}

fn is_operator(function: &str) -> bool {
    operators::binary(function).is_some()
        || operators::unary(function).is_some()
        || matches!(function, operators::CONDITIONAL | operators::INDEX)
}

fn size_of(ty: &ExprType) -> Option<ExprType> {
    match ty {
        ty if ty.is_dynamic() => Some(ExprType::INT),
        &ExprType::STRING | &ExprType::BYTES | ExprType::List(_) | ExprType::Map(..) => {
            Some(ExprType::INT)
        }
        _ => None,
    }
}

/// Result type of an arithmetic operator, `None` when undefined
fn arithmetic(function: &str, a: &ExprType, b: &ExprType) -> Option<ExprType> {
    if a.is_dynamic() || b.is_dynamic() {
        return Some(ExprType::Dyn);
    }
    if a.is_numeric() && b.is_numeric() {
        if function == operators::MODULO && (*a == ExprType::DOUBLE || *b == ExprType::DOUBLE) {
            return None;
        }
        // Mixed numeric operands are promoted to double
        return Some(if a == b { a.clone() } else { ExprType::DOUBLE });
    }

    match (function, a, b) {
        (operators::ADD, &ExprType::STRING, &ExprType::STRING) => Some(ExprType::STRING),
        (operators::ADD, &ExprType::BYTES, &ExprType::BYTES) => Some(ExprType::BYTES),
        (operators::ADD, ExprType::List(x), ExprType::List(y)) => Some(ExprType::list(join_list(x, y))),
        (operators::ADD | operators::SUBTRACT, &ExprType::DURATION, &ExprType::DURATION) => {
            Some(ExprType::DURATION)
        }
        (operators::ADD, &ExprType::TIMESTAMP, &ExprType::DURATION)
        | (operators::ADD, &ExprType::DURATION, &ExprType::TIMESTAMP)
        | (operators::SUBTRACT, &ExprType::TIMESTAMP, &ExprType::DURATION) => {
            Some(ExprType::TIMESTAMP)
        }
        (operators::SUBTRACT, &ExprType::TIMESTAMP, &ExprType::TIMESTAMP) => Some(ExprType::DURATION),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::expr::MessageType;
    use arbor_parser::ExpressionParser;
    use std::collections::BTreeMap;

    fn declarations() -> Declarations {
        let mut decls = Declarations::default();
        decls.declare(Decl::ident("amount", ExprType::DOUBLE));
        decls.declare(Decl::ident("count", ExprType::INT));
        decls.declare(Decl::ident("country", ExprType::STRING));
        decls.declare(Decl::ident("tags", ExprType::list(ExprType::STRING)));
        decls.declare(Decl::ident("limits", ExprType::map(ExprType::STRING, ExprType::INT)));
        decls.declare(Decl::ident("order", ExprType::Message("acme.Order".into())));
        decls.declare(Decl::ident("seen", ExprType::TIMESTAMP));
        decls.declare(Decl::ident("extra", ExprType::Dyn));
        decls.declare(Decl::function("risk", vec![ExprType::STRING], ExprType::INT));
        decls.messages.insert(
            "acme.Order".into(),
            MessageType {
                full_name: "acme.Order".into(),
                fields: BTreeMap::from([
                    ("total".to_string(), ExprType::DOUBLE),
                    ("items".to_string(), ExprType::list(ExprType::STRING)),
                ]),
            },
        );
        decls
    }

    fn check(source: &str) -> CheckResult<ExprType> {
        let decls = declarations();
        let parsed = ExpressionParser::parse(source).unwrap();
        TypeChecker::new(&decls).check(&parsed.expr).map(|c| c.result_type)
    }

    #[test]
    fn test_check_literals() {
        assert_eq!(check("42").unwrap(), ExprType::INT);
        assert_eq!(check("4.2").unwrap(), ExprType::DOUBLE);
        assert_eq!(check("'x'").unwrap(), ExprType::STRING);
        assert_eq!(check("null").unwrap(), ExprType::Null);
        assert_eq!(check("[1, 2]").unwrap(), ExprType::list(ExprType::INT));
        assert_eq!(check("[]").unwrap(), ExprType::list(ExprType::Dyn));
    }

    #[test]
    fn test_check_comparisons() {
        assert_eq!(check("amount > 1000").unwrap(), ExprType::BOOL);
        assert_eq!(check("country == 'US' && count < 3").unwrap(), ExprType::BOOL);
        assert!(check("country > 1").is_err());
    }

    #[test]
    fn test_check_arithmetic() {
        assert_eq!(check("count + 1").unwrap(), ExprType::INT);
        assert_eq!(check("amount * 2").unwrap(), ExprType::DOUBLE);
        assert_eq!(check("country + '!'").unwrap(), ExprType::STRING);
        assert!(check("country + 1").is_err());
        assert!(check("amount % 2").is_err());
    }

    #[test]
    fn test_check_selection() {
        assert_eq!(check("order.total").unwrap(), ExprType::DOUBLE);
        assert_eq!(check("limits.eu").unwrap(), ExprType::INT);
        assert_eq!(check("extra.anything").unwrap(), ExprType::Dyn);
        assert_eq!(check("has(order.total)").unwrap(), ExprType::BOOL);
        assert!(matches!(
            check("order.missing"),
            Err(CheckError::UndefinedField { .. })
        ));
        assert!(check("count.field").is_err());
    }

    #[test]
    fn test_check_undeclared() {
        assert_eq!(
            check("unknown > 1"),
            Err(CheckError::UndeclaredReference("unknown".into()))
        );
        assert!(matches!(check("nope(1)"), Err(CheckError::UndeclaredReference(_))));
    }

    #[test]
    fn test_check_functions() {
        assert_eq!(check("size(tags)").unwrap(), ExprType::INT);
        assert_eq!(check("tags.size()").unwrap(), ExprType::INT);
        assert_eq!(check("country.startsWith('U')").unwrap(), ExprType::BOOL);
        assert_eq!(check("country.matches('^U')").unwrap(), ExprType::BOOL);
        assert_eq!(check("int(amount)").unwrap(), ExprType::INT);
        assert_eq!(check("timestamp('2024-01-01T00:00:00Z')").unwrap(), ExprType::TIMESTAMP);
        assert_eq!(check("seen - duration('1h')").unwrap(), ExprType::TIMESTAMP);
        assert!(matches!(
            check("size(count)"),
            Err(CheckError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn test_check_host_function() {
        assert_eq!(check("risk(country) > 50").unwrap(), ExprType::BOOL);
        assert!(matches!(check("risk(1)"), Err(CheckError::NoMatchingOverload { .. })));
        assert!(check("risk").is_err());
    }

    #[test]
    fn test_check_index_and_in() {
        assert_eq!(check("tags[0]").unwrap(), ExprType::STRING);
        assert_eq!(check("limits['eu']").unwrap(), ExprType::INT);
        assert_eq!(check("country in tags").unwrap(), ExprType::BOOL);
        assert_eq!(check("'eu' in limits").unwrap(), ExprType::BOOL);
        assert!(check("count in tags").is_err());
    }

    #[test]
    fn test_check_conditional() {
        assert_eq!(check("count > 1 ? 'a' : 'b'").unwrap(), ExprType::STRING);
        assert!(check("count ? 'a' : 'b'").is_err());
        assert!(check("count > 1 ? 'a' : 1").is_err());
    }

    #[test]
    fn test_check_comprehensions() {
        assert_eq!(check("tags.all(t, t != '')").unwrap(), ExprType::BOOL);
        assert_eq!(check("tags.exists_one(t, t == 'vip')").unwrap(), ExprType::BOOL);
        assert_eq!(
            check("tags.map(t, size(t))").unwrap(),
            ExprType::list(ExprType::INT)
        );
        assert_eq!(
            check("tags.filter(t, t.startsWith('a'))").unwrap(),
            ExprType::list(ExprType::STRING)
        );
        assert_eq!(check("limits.exists(k, k == 'eu')").unwrap(), ExprType::BOOL);
        assert!(check("count.all(x, x > 0)").is_err());
        // Comprehension variables do not leak
        assert!(check("tags.all(t, true) && t == ''").is_err());
    }

    #[test]
    fn test_type_map_covers_every_node() {
        let decls = declarations();
        let parsed = ExpressionParser::parse("amount > 10.0 && country == 'US'").unwrap();
        let checked = TypeChecker::new(&decls).check(&parsed.expr).unwrap();
        assert_eq!(checked.type_map.len(), parsed.source_info.positions.len());
        assert_eq!(checked.type_map.get(&parsed.expr.id), Some(&ExprType::BOOL));
    }
}
