//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Literal};
use crate::kinetic::workflow::state::State;
use serde_json::Value;

/// Evaluate a condition against graph state
///
/// Missing fields compare equal to `null` and fail every ordering
/// comparison.
pub fn evaluate(expr: &Expression, state: &State) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { left, op, right } => compare(state.get_path(left), *op, right),
        Expression::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expression::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: &Literal) -> bool {
    match op {
        CompareOp::Eq => equals(left, right),
        CompareOp::NotEq => !equals(left, right),
        CompareOp::Gt => ordered(left, right, |a, b| a > b),
        CompareOp::Gte => ordered(left, right, |a, b| a >= b),
        CompareOp::Lt => ordered(left, right, |a, b| a < b),
        CompareOp::Lte => ordered(left, right, |a, b| a <= b),
        CompareOp::Contains => contains(left, right),
    }
}

fn equals(left: Option<&Value>, right: &Literal) -> bool {
    match left {
        None | Some(Value::Null) => *right == Literal::Null,
        Some(value) => matches_literal(value, right),
    }
}

fn matches_literal(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::String(s), Literal::String(rs)) => s == rs,
        (Value::Number(n), Literal::Number(rn)) => n
            .as_f64()
            .is_some_and(|f| (f - rn).abs() < f64::EPSILON),
        (Value::Bool(b), Literal::Boolean(rb)) => b == rb,
        (Value::Null, Literal::Null) => true,
        _ => false,
    }
}

fn ordered(left: Option<&Value>, right: &Literal, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (left.and_then(Value::as_f64), right) {
        (Some(l), Literal::Number(r)) => cmp(l, *r),
        _ => false,
    }
}

fn contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(needle)) => s.contains(needle.as_str()),
        (Some(Value::Array(items)), literal) => {
            items.iter().any(|item| matches_literal(item, literal))
        }
        _ => false,
    }
}
