//! Tree-walking evaluator over `serde_json::Value`.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use super::parser::{BinaryOp, Expr, Func, UnaryOp, Var};
use super::ExprError;
use crate::placeholder::{display_string, lookup_path};

/// The values an expression can see.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub inputs: Value,
    pub context: Value,
    pub meta: Value,
}

pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), evaluate(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Var(Var::Inputs) => Ok(scope.inputs.clone()),
        Expr::Var(Var::Context) => Ok(scope.context.clone()),
        Expr::Var(Var::Meta) => Ok(scope.meta.clone()),
        Expr::Member(base, name) => {
            let base = evaluate(base, scope)?;
            Ok(member(&base, name))
        }
        Expr::Index(base, index) => {
            let base = evaluate(base, scope)?;
            let segment = match evaluate(index, scope)? {
                Value::String(s) => s,
                Value::Number(n) => match n.as_u64() {
                    Some(i) => i.to_string(),
                    None => return Ok(Value::Null),
                },
                _ => return Ok(Value::Null),
            };
            Ok(member(&base, &segment))
        }
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!truthy(&evaluate(operand, scope)?))),
        Expr::Unary(UnaryOp::Neg, operand) => match evaluate(operand, scope)? {
            Value::Number(n) => arithmetic(BinaryOp::Sub, &Number::from(0), &n),
            other => Err(type_error("cannot negate", &other)),
        },
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let ok = truthy(&evaluate(lhs, scope)?) && truthy(&evaluate(rhs, scope)?);
            Ok(Value::Bool(ok))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let ok = truthy(&evaluate(lhs, scope)?) || truthy(&evaluate(rhs, scope)?);
            Ok(Value::Bool(ok))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, scope)?;
            let rhs = evaluate(rhs, scope)?;
            binary(*op, lhs, rhs)
        }
        Expr::Conditional(condition, then, otherwise) => {
            if truthy(&evaluate(condition, scope)?) {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Call(func, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, args)
        }
    }
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` are false; everything else true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn member(base: &Value, segment: &str) -> Value {
    lookup_path(base, &[segment]).cloned().unwrap_or(Value::Null)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(what: &str, value: &Value) -> ExprError {
    ExprError::Type(format!("{what} {}", type_name(value)))
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(&lhs, &rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!loosely_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => arithmetic(op, &a, &b),
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (a @ Value::String(_), b) | (a, b @ Value::String(_)) => {
                Ok(Value::String(display_string(&a) + &display_string(&b)))
            }
            (a, b) => Err(ExprError::Type(format!(
                "cannot add {} and {}",
                type_name(&a),
                type_name(&b)
            ))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => arithmetic(op, a, b),
            _ => Err(ExprError::Type(format!(
                "arithmetic needs numbers, got {} and {}",
                type_name(&lhs),
                type_name(&rhs)
            ))),
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit in evaluate"),
    }
}

/// Integer arithmetic while it stays exact, floating point otherwise.
fn arithmetic(op: BinaryOp, a: &Number, b: &Number) -> Result<Value, ExprError> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y == 0 {
            return Err(ExprError::DivisionByZero);
        }
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Rem => x.checked_rem(y),
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    let x = as_f64(a);
    let y = as_f64(b);
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::Rem if y == 0.0 => return Err(ExprError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => unreachable!("non-arithmetic operator"),
    };
    float(result)
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(0.0)
}

fn float(value: f64) -> Result<Value, ExprError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(ExprError::NonFinite)
}

/// Whole floats are returned as integers when they fit.
fn integral(value: f64) -> Result<Value, ExprError> {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Ok(Value::from(value as i64))
    } else {
        float(value)
    }
}

/// Equality where `1 == 1.0`.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x) == as_f64(y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loosely_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| loosely_equal(l, r)))
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x)
            .partial_cmp(&as_f64(y))
            .ok_or(ExprError::NonFinite),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(ExprError::Type(format!(
            "cannot compare {} with {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn call(func: Func, mut args: Vec<Value>) -> Result<Value, ExprError> {
    let name = func.name();
    match func {
        Func::Len => match &args[0] {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            other => Err(type_error("len() does not accept", other)),
        },
        Func::Sum => {
            let items = array_arg(name, &args[0])?;
            // Nulls (e.g. from `pluck` on items lacking the key) are skipped.
            items.iter().try_fold(Value::from(0), |acc, item| match (&acc, item) {
                (_, Value::Null) => Ok(acc),
                (Value::Number(a), Value::Number(b)) => arithmetic(BinaryOp::Add, a, b),
                _ => Err(type_error("sum() needs numbers, got", item)),
            })
        }
        Func::Min | Func::Max => {
            let candidates = match <[Value; 1]>::try_from(args) {
                Ok([Value::Array(items)]) => items,
                Ok([single]) => vec![single],
                Err(args) => args,
            };
            let mut best: Option<Value> = None;
            for candidate in candidates {
                if !candidate.is_number() {
                    return Err(type_error(&format!("{name}() needs numbers, got"), &candidate));
                }
                best = Some(match best {
                    None => candidate,
                    Some(current) => {
                        let ordering = compare(&candidate, &current)?;
                        let better = if func == Func::Min {
                            ordering == Ordering::Less
                        } else {
                            ordering == Ordering::Greater
                        };
                        if better {
                            candidate
                        } else {
                            current
                        }
                    }
                });
            }
            best.ok_or_else(|| ExprError::Type(format!("{name}() of an empty array")))
        }
        Func::Abs => {
            let n = number_arg(name, &args[0])?;
            match n.as_i64().and_then(i64::checked_abs) {
                Some(i) => Ok(Value::from(i)),
                None => float(as_f64(n).abs()),
            }
        }
        Func::Round => {
            let x = as_f64(number_arg(name, &args[0])?);
            let digits = match args.get(1) {
                None => 0,
                Some(d) => number_arg(name, d)?
                    .as_i64()
                    .filter(|d| (0..=15).contains(d))
                    .ok_or_else(|| ExprError::Type("round() digits must be an integer in 0..=15".into()))?,
            };
            if digits == 0 {
                integral(x.round())
            } else {
                let factor = 10f64.powi(digits as i32);
                float((x * factor).round() / factor)
            }
        }
        Func::Floor => integral(as_f64(number_arg(name, &args[0])?).floor()),
        Func::Ceil => integral(as_f64(number_arg(name, &args[0])?).ceil()),
        Func::Upper => Ok(Value::String(string_arg(name, &args[0])?.to_uppercase())),
        Func::Lower => Ok(Value::String(string_arg(name, &args[0])?.to_lowercase())),
        Func::Trim => Ok(Value::String(string_arg(name, &args[0])?.trim().to_owned())),
        Func::Str => Ok(Value::String(display_string(&args[0]))),
        Func::Num => match &args[0] {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::Bool(b) => Ok(Value::from(u8::from(*b))),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else {
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| ExprError::Type(format!("num() cannot parse '{s}'")))
                }
            }
            other => Err(type_error("num() does not accept", other)),
        },
        Func::Keys => match &args[0] {
            Value::Object(map) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
            other => Err(type_error("keys() needs an object, got", other)),
        },
        Func::Values => match args.swap_remove(0) {
            Value::Object(map) => Ok(Value::Array(map.into_iter().map(|(_, v)| v).collect())),
            other => Err(type_error("values() needs an object, got", &other)),
        },
        Func::Contains => Ok(Value::Bool(match (&args[0], &args[1]) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| loosely_equal(item, needle)),
            (Value::Object(map), Value::String(key)) => map.contains_key(key),
            (haystack, _) => return Err(type_error("contains() cannot search", haystack)),
        })),
        Func::Join => {
            let items = array_arg(name, &args[0])?;
            let separator = match args.get(1) {
                None => String::new(),
                Some(sep) => string_arg(name, sep)?.to_owned(),
            };
            let parts: Vec<String> = items.iter().map(display_string).collect();
            Ok(Value::String(parts.join(&separator)))
        }
        Func::Pluck => {
            let items = array_arg(name, &args[0])?;
            let key = match &args[1] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => return Err(type_error("pluck() key cannot be", other)),
            };
            Ok(Value::Array(items.iter().map(|item| member(item, &key)).collect()))
        }
        Func::Default => {
            let fallback = args.pop().unwrap_or(Value::Null);
            let value = args.pop().unwrap_or(Value::Null);
            Ok(if value.is_null() { fallback } else { value })
        }
    }
}

fn array_arg<'a>(name: &str, value: &'a Value) -> Result<&'a Vec<Value>, ExprError> {
    value
        .as_array()
        .ok_or_else(|| type_error(&format!("{name}() needs an array, got"), value))
}

fn number_arg<'a>(name: &str, value: &'a Value) -> Result<&'a Number, ExprError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(type_error(&format!("{name}() needs a number, got"), other)),
    }
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str, ExprError> {
    value
        .as_str()
        .ok_or_else(|| type_error(&format!("{name}() needs a string, got"), value))
}
