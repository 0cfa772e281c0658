//! Tree-walking interpreter for the standard engine

use super::functions::{self, HostFunction};
use super::operators::{execute_binary_op, execute_unary_op, map_lookup, values_equal};
use arbor_core::expr::ast::operators;
use arbor_core::expr::{
    Activation, Comprehension, EngineError, EngineResult, EvalTrace, Expr, ExprId, ExprKind,
    ExprValue,
};
use regex::Regex;
use std::collections::HashMap;

/// Evaluates one syntax tree against an activation
pub(crate) struct Interpreter<'a> {
    activation: &'a Activation,
    functions: &'a HashMap<String, HostFunction>,
    patterns: &'a HashMap<ExprId, Regex>,
    /// Comprehension variables, innermost last
    scopes: Vec<(String, ExprValue)>,
    trace: Option<EvalTrace>,
    /// Nesting depth of comprehension loops; nothing is traced inside one
    loop_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        activation: &'a Activation,
        functions: &'a HashMap<String, HostFunction>,
        patterns: &'a HashMap<ExprId, Regex>,
        trace: bool,
    ) -> Self {
        Self {
            activation,
            functions,
            patterns,
            scopes: Vec::new(),
            trace: trace.then(EvalTrace::new),
            loop_depth: 0,
        }
    }

    /// Evaluate `expr`, returning its value and the trace if one was kept
    pub(crate) fn run(mut self, expr: &Expr) -> EngineResult<(ExprValue, Option<EvalTrace>)> {
        let value = self.eval(expr)?;
        Ok((value, self.trace))
    }

    fn eval(&mut self, expr: &Expr) -> EngineResult<ExprValue> {
        let value = match &expr.kind {
            ExprKind::Literal(literal) => literal.to_value(),
            ExprKind::Ident(name) => self.resolve(name)?,
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                let operand = self.eval(operand)?;
                select(&operand, field, *test_only)?
            }
            ExprKind::Call {
                function,
                target,
                args,
            } => self.call(expr.id, function, target.as_deref(), args)?,
            ExprKind::List(items) => ExprValue::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EngineResult<_>>()?,
            ),
            ExprKind::Map(entries) => self.build_map(entries)?,
            ExprKind::Comprehension(comprehension) => self.fold(comprehension)?,
        };

        if self.loop_depth == 0 {
            if let Some(trace) = self.trace.as_mut() {
                trace.record(expr.id, value.clone());
            }
        }
        Ok(value)
    }

    fn resolve(&self, name: &str) -> EngineResult<ExprValue> {
        if let Some((_, value)) = self.scopes.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        self.activation
            .resolve(name)
            .cloned()
            .ok_or_else(|| EngineError::UnboundIdentifier(name.to_string()))
    }

    fn call(
        &mut self,
        id: ExprId,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> EngineResult<ExprValue> {
        match (function, args) {
            (operators::LOGICAL_AND, [left, right]) => {
                if !self.eval_bool(left)? {
                    return Ok(ExprValue::Bool(false));
                }
                return self.eval_bool(right).map(ExprValue::Bool);
            }
            (operators::LOGICAL_OR, [left, right]) => {
                if self.eval_bool(left)? {
                    return Ok(ExprValue::Bool(true));
                }
                return self.eval_bool(right).map(ExprValue::Bool);
            }
            (operators::CONDITIONAL, [condition, then, otherwise]) => {
                return if self.eval_bool(condition)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                };
            }
            _ => {}
        }

        let target = target.map(|t| self.eval(t)).transpose()?;
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EngineResult<Vec<_>>>()?;
        let pattern = self.patterns.get(&id);

        match target {
            Some(target) => functions::call_method(function, &target, &args, pattern),
            None => {
                if let Some(host) = self.functions.get(function) {
                    return host(&args).map_err(|message| {
                        EngineError::Runtime(format!("{}: {}", function, message))
                    });
                }
                match args.as_slice() {
                    [operand] if operators::unary(function).is_some() => {
                        execute_unary_op(function, operand)
                    }
                    [left, right] if operators::binary(function).is_some() || function == operators::INDEX => {
                        execute_binary_op(function, left, right)
                    }
                    _ => functions::call_global(function, &args, pattern),
                }
            }
        }
    }

    fn eval_bool(&mut self, expr: &Expr) -> EngineResult<bool> {
        match self.eval(expr)? {
            ExprValue::Bool(b) => Ok(b),
            other => Err(EngineError::Runtime(format!(
                "expected bool, got {}",
                other.type_name()
            ))),
        }
    }

    fn build_map(&mut self, entries: &[(Expr, Expr)]) -> EngineResult<ExprValue> {
        let mut map: Vec<(ExprValue, ExprValue)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.eval(key)?;
            if !matches!(
                key,
                ExprValue::Bool(_) | ExprValue::Int(_) | ExprValue::Uint(_) | ExprValue::String(_)
            ) {
                return Err(EngineError::Runtime(format!(
                    "unsupported map key type {}",
                    key.type_name()
                )));
            }
            let value = self.eval(value)?;
            if map.iter().any(|(existing, _)| values_equal(existing, &key)) {
                return Err(EngineError::Runtime(format!("duplicate map key {}", key)));
            }
            map.push((key, value));
        }
        Ok(ExprValue::Map(map))
    }

    fn fold(&mut self, comprehension: &Comprehension) -> EngineResult<ExprValue> {
        let range = match self.eval(&comprehension.iter_range)? {
            ExprValue::List(items) => items,
            ExprValue::Map(entries) => entries.into_iter().map(|(k, _)| k).collect(),
            other => {
                return Err(EngineError::Runtime(format!(
                    "cannot iterate over {}",
                    other.type_name()
                )))
            }
        };

        self.loop_depth += 1;
        let scope_base = self.scopes.len();
        let outcome = self.run_loop(comprehension, range);
        self.scopes.truncate(scope_base);
        self.loop_depth -= 1;
        outcome
    }

    fn run_loop(&mut self, comprehension: &Comprehension, range: Vec<ExprValue>) -> EngineResult<ExprValue> {
        let init = self.eval(&comprehension.accu_init)?;
        self.scopes.push((comprehension.accu_var.clone(), init));
        let accu_slot = self.scopes.len() - 1;

        for item in range {
            self.scopes.push((comprehension.iter_var.clone(), item));
            if !self.eval_bool(&comprehension.loop_condition)? {
                break;
            }
            let step = self.eval(&comprehension.loop_step)?;
            self.scopes.pop();
            self.scopes[accu_slot].1 = step;
        }
        self.scopes.truncate(accu_slot + 1);
        self.eval(&comprehension.result)
    }
}

fn select(operand: &ExprValue, field: &str, test_only: bool) -> EngineResult<ExprValue> {
    let found = match operand {
        ExprValue::Message { fields, .. } => fields.get(field),
        ExprValue::Map(_) => map_lookup(operand, &ExprValue::String(field.to_string())),
        other => {
            return Err(EngineError::Runtime(format!(
                "type {} does not support field selection",
                other.type_name()
            )))
        }
    };

    match (found, test_only) {
        (found, true) => Ok(ExprValue::Bool(found.is_some())),
        (Some(value), false) => Ok(value.clone()),
        (None, false) => Err(EngineError::Runtime(format!("no such field '{}'", field))),
    }
}
