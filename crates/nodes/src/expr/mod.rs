//! A small, closed expression language for the `function` node.
//!
//! Expressions read three variables (`inputs`, `context` and `meta`) and
//! can combine them with arithmetic, comparison and logical operators, the
//! ternary `a ? b : c`, array/object literals and a fixed set of functions:
//!
//! `len sum min max abs round floor ceil upper lower trim str num keys values
//! contains join pluck default`
//!
//! ```text
//! { total: sum(pluck(inputs, 'value')), big: len(inputs) > 3 }
//! ```
//!
//! There is no assignment, no loops, no I/O and no way to name anything
//! outside that list; unknown identifiers are rejected when parsing.

mod eval;
mod lexer;
mod parser;

use serde_json::Value;
use thiserror::Error;

pub use eval::{truthy, Scope};

/// Longest accepted expression source, in characters.
pub const MAX_LEN: usize = 4096;
/// Deepest accepted nesting of sub-expressions.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("expression is {len} characters long (limit {max})")]
    TooLong { len: usize, max: usize },

    #[error("expression nests deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("unknown identifier '{0}' (available: inputs, context, meta)")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic produced a non-finite number")]
    NonFinite,
}

impl ExprError {
    /// `true` when the expression was rejected before evaluation started.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::TooLong { .. }
                | Self::TooDeep { .. }
                | Self::UnknownIdentifier(_)
                | Self::UnknownFunction(_)
                | Self::Arity { .. }
        )
    }
}

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: parser::Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let len = source.chars().count();
        if len > MAX_LEN {
            return Err(ExprError::TooLong { len, max: MAX_LEN });
        }
        Ok(Self {
            source: source.to_owned(),
            ast: parser::Parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Value, ExprError> {
        eval::evaluate(&self.ast, scope)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, scope: &Scope) -> Result<Value, ExprError> {
    Expression::parse(source)?.evaluate(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(inputs: Value) -> Scope {
        Scope {
            inputs,
            context: json!({ "fetch": { "status": 200 } }),
            meta: json!({ "node_id": "fn-1", "trigger": { "user": "ada" } }),
        }
    }

    fn eval(source: &str, inputs: Value) -> Value {
        evaluate(source, &scope(inputs)).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    #[test]
    fn sums_a_field_across_inputs() {
        let inputs = json!([{ "value": 2 }, { "value": 3.5 }, { "other": 1 }]);
        assert_eq!(
            eval("{ sum: sum(pluck(inputs, 'value')) }", inputs.clone()),
            json!({ "sum": 5.5 })
        );
        assert_eq!(eval("pluck(inputs, 'value')", inputs), json!([2, 3.5, null]));
    }

    #[test]
    fn reads_context_and_meta() {
        assert_eq!(eval("context.fetch.status == 200", json!([])), json!(true));
        assert_eq!(eval("upper(meta.trigger.user)", json!([])), json!("ADA"));
        assert_eq!(eval("meta['node_id']", json!([])), json!("fn-1"));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(eval("7 + 3 * 2", json!([])), json!(13));
        assert_eq!(eval("8 / 2", json!([])), json!(4));
        assert_eq!(eval("7 / 2", json!([])), json!(3.5));
        assert_eq!(eval("7 % 3", json!([])), json!(1));
        assert_eq!(eval("-(2 - 5)", json!([])), json!(3));
    }

    #[test]
    fn string_concatenation_and_functions() {
        assert_eq!(eval("'n=' + len(inputs)", json!([1, 2])), json!("n=2"));
        assert_eq!(eval("join(['a', 1, null, true], '-')", json!([])), json!("a-1--true"));
        assert_eq!(eval("trim('  x ') + lower('Y')", json!([])), json!("xy"));
        assert_eq!(eval("num(' 42 ') + num('0.5')", json!([])), json!(42.5));
        assert_eq!(eval("str(12)", json!([])), json!("12"));
    }

    #[test]
    fn logic_and_conditionals() {
        assert_eq!(eval("len(inputs) > 1 ? 'many' : 'few'", json!([1, 2])), json!("many"));
        assert_eq!(eval("!inputs || inputs[0] >= 10", json!([10])), json!(true));
        // Right side is never evaluated, so the division is harmless.
        assert_eq!(eval("false && 1 / 0", json!([])), json!(false));
        assert_eq!(eval("1 == 1.0 && [1, {a: 2}] == [1.0, {a: 2}]", json!([])), json!(true));
    }

    #[test]
    fn collection_helpers() {
        let inputs = json!([{ "b": 1, "a": 2 }]);
        assert_eq!(eval("keys(inputs[0])", inputs.clone()), json!(["b", "a"]));
        assert_eq!(eval("values(inputs[0])", inputs.clone()), json!([1, 2]));
        assert_eq!(eval("contains(inputs[0], 'a')", inputs.clone()), json!(true));
        assert_eq!(eval("contains([1, 2], 2.0)", json!([])), json!(true));
        assert_eq!(eval("contains('hello', 'ell')", json!([])), json!(true));
        assert_eq!(eval("min(3, 1, 2) + max([4, 9, 1])", json!([])), json!(10));
        assert_eq!(eval("default(inputs[0].missing, 'fallback')", inputs), json!("fallback"));
    }

    #[test]
    fn rounding() {
        assert_eq!(eval("round(2.5)", json!([])), json!(3));
        assert_eq!(eval("round(3.14159, 2)", json!([])), json!(3.14));
        assert_eq!(eval("floor(-1.5)", json!([])), json!(-2));
        assert_eq!(eval("ceil(1.2)", json!([])), json!(2));
        assert_eq!(eval("abs(-4)", json!([])), json!(4));
    }

    #[test]
    fn missing_paths_are_null() {
        assert_eq!(eval("inputs[5].x.y", json!([])), Value::Null);
        assert_eq!(eval("inputs['0']", json!(["zero"])), json!("zero"));
        assert_eq!(eval("inputs[-1]", json!(["zero"])), Value::Null);
    }

    #[test]
    fn runtime_errors_are_reported() {
        let s = scope(json!([]));
        assert_eq!(evaluate("1 / 0", &s).unwrap_err(), ExprError::DivisionByZero);
        assert!(matches!(evaluate("1 - 'a'", &s).unwrap_err(), ExprError::Type(_)));
        assert!(matches!(evaluate("sum(['a'])", &s).unwrap_err(), ExprError::Type(_)));
        assert!(matches!(evaluate("max([])", &s).unwrap_err(), ExprError::Type(_)));
        assert!(!evaluate("1 / 0", &s).unwrap_err().is_compile_error());
    }

    #[test]
    fn nothing_outside_the_whitelist_is_reachable() {
        let s = scope(json!([]));
        for source in ["open('/etc/passwd')", "__builtins__", "inputs.constructor('x')", "std::process"] {
            let err = evaluate(source, &s).unwrap_err();
            assert!(err.is_compile_error(), "{source} -> {err:?}");
        }
    }

    #[test]
    fn oversized_source_is_rejected() {
        let source = format!("'{}'", "x".repeat(MAX_LEN));
        assert!(matches!(Expression::parse(&source), Err(ExprError::TooLong { .. })));
    }

    #[test]
    fn parsed_expression_is_reusable() {
        let expr = Expression::parse("inputs[0] * 2").unwrap();
        assert_eq!(expr.source(), "inputs[0] * 2");
        assert_eq!(expr.evaluate(&scope(json!([2]))).unwrap(), json!(4));
        assert_eq!(expr.evaluate(&scope(json!([5]))).unwrap(), json!(10));
    }
}
