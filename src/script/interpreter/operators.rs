//! Arithmetic, comparison and equality on script values.
//!
//! Integer operands stay exact as long as the result fits in 64 bits;
//! anything else falls back to floating point.

use std::cmp::Ordering;

use crate::script::ast::{Operator, UnaryOperator};
use crate::script::value::ScriptValue;

fn integer_operand(value: &ScriptValue) -> Option<i128> {
    match value {
        ScriptValue::Int(i) => Some(i128::from(*i)),
        ScriptValue::UInt(u) => Some(i128::from(*u)),
        ScriptValue::Bool(b) => Some(i128::from(*b)),
        ScriptValue::Null => Some(0),
        _ => None,
    }
}

fn concatenates(value: &ScriptValue) -> bool {
    matches!(
        value,
        ScriptValue::String(_)
            | ScriptValue::Array(_)
            | ScriptValue::Object(_)
            | ScriptValue::Bytes(_)
            | ScriptValue::Date(_)
            | ScriptValue::Timestamp(_)
    )
}

/// Applies a non-short-circuit binary operator.
pub fn binary(operator: Operator, left: &ScriptValue, right: &ScriptValue) -> ScriptValue {
    match operator {
        Operator::Add if concatenates(left) || concatenates(right) => {
            ScriptValue::String(format!("{left}{right}"))
        }
        Operator::Add => arithmetic(left, right, i128::checked_add, |a, b| a + b),
        Operator::Subtract => arithmetic(left, right, i128::checked_sub, |a, b| a - b),
        Operator::Multiply => arithmetic(left, right, i128::checked_mul, |a, b| a * b),
        Operator::Divide => ScriptValue::Float(left.to_number() / right.to_number()),
        Operator::Modulo => match (integer_operand(left), integer_operand(right)) {
            (Some(_), Some(0)) => ScriptValue::Float(f64::NAN),
            (Some(a), Some(b)) => ScriptValue::from_integer(a % b),
            _ => ScriptValue::Float(left.to_number() % right.to_number()),
        },
        Operator::Equal => ScriptValue::Bool(loose_equals(left, right)),
        Operator::NotEqual => ScriptValue::Bool(!loose_equals(left, right)),
        Operator::StrictEqual => ScriptValue::Bool(strict_equals(left, right)),
        Operator::StrictNotEqual => ScriptValue::Bool(!strict_equals(left, right)),
        Operator::LessThan => ScriptValue::Bool(compare(left, right) == Some(Ordering::Less)),
        Operator::LessThanOrEqual => ScriptValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        Operator::GreaterThan => {
            ScriptValue::Bool(compare(left, right) == Some(Ordering::Greater))
        }
        Operator::GreaterThanOrEqual => ScriptValue::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        // short-circuit operators are evaluated by the interpreter
        Operator::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        Operator::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    }
}

fn arithmetic(
    left: &ScriptValue,
    right: &ScriptValue,
    exact: fn(i128, i128) -> Option<i128>,
    float: fn(f64, f64) -> f64,
) -> ScriptValue {
    if let (Some(a), Some(b)) = (integer_operand(left), integer_operand(right)) {
        if let Some(result) = exact(a, b) {
            return ScriptValue::from_integer(result);
        }
    }
    ScriptValue::Float(float(left.to_number(), right.to_number()))
}

pub fn unary(operator: UnaryOperator, operand: &ScriptValue) -> ScriptValue {
    match operator {
        UnaryOperator::Not => ScriptValue::Bool(!operand.truthy()),
        UnaryOperator::Negate => match integer_operand(operand) {
            // -0 has no integer form
            Some(0) => ScriptValue::Float(-0.0),
            Some(i) => ScriptValue::from_integer(-i),
            None => ScriptValue::Float(-operand.to_number()),
        },
        UnaryOperator::Plus => match operand {
            ScriptValue::Int(_) | ScriptValue::UInt(_) | ScriptValue::Float(_) => operand.clone(),
            other => ScriptValue::Float(other.to_number()),
        },
        UnaryOperator::TypeOf => ScriptValue::String(operand.type_of().to_string()),
    }
}

/// Ordering for relational operators. `None` when either side is NaN.
pub fn compare(left: &ScriptValue, right: &ScriptValue) -> Option<Ordering> {
    if let (ScriptValue::String(a), ScriptValue::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    if let (Some(a), Some(b)) = (integer_operand(left), integer_operand(right)) {
        return Some(a.cmp(&b));
    }
    left.to_number().partial_cmp(&right.to_number())
}

pub fn strict_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    if left.is_number() && right.is_number() {
        return match (integer_operand(left), integer_operand(right)) {
            (Some(a), Some(b)) => a == b,
            _ => left.to_number() == right.to_number(),
        };
    }
    match (left, right) {
        (ScriptValue::Undefined, ScriptValue::Undefined) | (ScriptValue::Null, ScriptValue::Null) => {
            true
        }
        (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
        (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
        (ScriptValue::Date(a), ScriptValue::Date(b)) => a == b,
        (ScriptValue::Timestamp(a), ScriptValue::Timestamp(b)) => a == b,
        (ScriptValue::Bytes(a), ScriptValue::Bytes(b)) => a == b,
        (ScriptValue::Array(a), ScriptValue::Array(b)) => a.ptr_eq(b),
        (ScriptValue::Object(a), ScriptValue::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

/// `==`: null and undefined equal each other and nothing else; mixed
/// primitives compare as numbers.
pub fn loose_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    let primitive = |v: &ScriptValue| {
        matches!(
            v,
            ScriptValue::Bool(_)
                | ScriptValue::Int(_)
                | ScriptValue::UInt(_)
                | ScriptValue::Float(_)
                | ScriptValue::String(_)
                | ScriptValue::Date(_)
        )
    };
    let same_kind = std::mem::discriminant(left) == std::mem::discriminant(right);
    if !same_kind && primitive(left) && primitive(right) {
        if let (ScriptValue::String(_), ScriptValue::Date(_)) | (ScriptValue::Date(_), ScriptValue::String(_)) =
            (left, right)
        {
            return left.to_string() == right.to_string();
        }
        return left.to_number() == right.to_number();
    }
    strict_equals(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> ScriptValue {
        ScriptValue::Int(i)
    }

    #[test]
    fn test_integer_arithmetic_stays_exact() {
        assert_eq!(binary(Operator::Add, &int(2), &int(3)), int(5));
        assert_eq!(binary(Operator::Multiply, &int(-4), &int(3)), int(-12));
        assert_eq!(
            binary(Operator::Add, &int(i64::MAX), &int(1)),
            ScriptValue::UInt(i64::MAX as u64 + 1)
        );
        assert_eq!(binary(Operator::Modulo, &int(-7), &int(2)), int(-1));
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(binary(Operator::Divide, &int(6), &int(4)), ScriptValue::Float(1.5));
        assert_eq!(
            binary(Operator::Divide, &int(1), &int(0)),
            ScriptValue::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_string_concatenation() {
        let s = ScriptValue::String("n=".to_string());
        assert_eq!(
            binary(Operator::Add, &s, &ScriptValue::Float(1.5)),
            ScriptValue::String("n=1.5".to_string())
        );
    }

    #[test]
    fn test_equality() {
        let five = ScriptValue::String("5".to_string());
        assert!(loose_equals(&five, &int(5)));
        assert!(!strict_equals(&five, &int(5)));
        assert!(loose_equals(&ScriptValue::Null, &ScriptValue::Undefined));
        assert!(!loose_equals(&ScriptValue::Null, &int(0)));
        assert!(strict_equals(&ScriptValue::Float(2.0), &int(2)));
        assert!(!strict_equals(&ScriptValue::Float(f64::NAN), &ScriptValue::Float(f64::NAN)));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let list = ScriptValue::array(vec![int(1)]);
        assert!(strict_equals(&list, &list.clone()));
        assert!(!strict_equals(&list, &ScriptValue::array(vec![int(1)])));
        assert!(!loose_equals(&list, &ScriptValue::array(vec![int(1)])));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(compare(&int(1), &ScriptValue::Float(1.5)), Some(Ordering::Less));
        assert_eq!(compare(&int(1), &ScriptValue::Float(f64::NAN)), None);
        assert_eq!(
            compare(
                &ScriptValue::String("b".to_string()),
                &ScriptValue::String("a".to_string())
            ),
            Some(Ordering::Greater)
        );
    }
}
