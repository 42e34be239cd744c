//! Static evaluation of literal sub-trees
//!
//! Only arrays, objects and primitive literals are understood. Anything
//! executable fails with [`CannotEvaluate`] instead of being guessed at.

use serde_json::{Map, Number, Value};
use swc_core::ecma::ast::{ArrayLit, Expr, ExprOrSpread, Lit, ObjectLit, Prop, PropName, PropOrSpread};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot statically evaluate {node_kind}")]
pub struct CannotEvaluate {
    /// What was found where a literal was expected
    pub node_kind: &'static str,
}

impl CannotEvaluate {
    const fn new(node_kind: &'static str) -> Self {
        Self { node_kind }
    }
}

/// Evaluate a literal expression into a JSON value
pub fn evaluate(expr: &Expr) -> Result<Value, CannotEvaluate> {
    match expr {
        Expr::Lit(lit) => evaluate_lit(lit),
        Expr::Array(array) => evaluate_array(array),
        Expr::Object(object) => evaluate_object(object),
        Expr::Paren(paren) => evaluate(&paren.expr),
        other => Err(CannotEvaluate::new(expr_kind(other))),
    }
}

/// Evaluate an array literal whose elements must all be strings
pub fn evaluate_string_list(expr: &Expr) -> Result<Vec<String>, CannotEvaluate> {
    match evaluate(expr)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(CannotEvaluate::new("non-string list element")),
            })
            .collect(),
        _ => Err(CannotEvaluate::new("non-array value")),
    }
}

fn evaluate_lit(lit: &Lit) -> Result<Value, CannotEvaluate> {
    match lit {
        Lit::Str(s) => Ok(Value::String(s.value.to_string())),
        Lit::Bool(b) => Ok(Value::Bool(b.value)),
        Lit::Null(_) => Ok(Value::Null),
        Lit::Num(n) => Number::from_f64(n.value)
            .map(Value::Number)
            .ok_or(CannotEvaluate::new("non-finite number")),
        Lit::Regex(_) => Err(CannotEvaluate::new("regular expression")),
        _ => Err(CannotEvaluate::new("literal")),
    }
}

fn evaluate_array(array: &ArrayLit) -> Result<Value, CannotEvaluate> {
    array
        .elems
        .iter()
        .map(|elem| match elem {
            Some(ExprOrSpread { spread: None, expr }) => evaluate(expr),
            Some(_) => Err(CannotEvaluate::new("spread element")),
            None => Err(CannotEvaluate::new("array hole")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn evaluate_object(object: &ObjectLit) -> Result<Value, CannotEvaluate> {
    let mut map = Map::new();
    for prop in &object.props {
        let PropOrSpread::Prop(prop) = prop else {
            return Err(CannotEvaluate::new("spread property"));
        };
        let Prop::KeyValue(kv) = &**prop else {
            return Err(CannotEvaluate::new("non key-value property"));
        };
        let key = match &kv.key {
            PropName::Ident(ident) => ident.sym.to_string(),
            PropName::Str(s) => s.value.to_string(),
            PropName::Num(n) => n.value.to_string(),
            _ => return Err(CannotEvaluate::new("computed property key")),
        };
        map.insert(key, evaluate(&kv.value)?);
    }
    Ok(Value::Object(map))
}

fn expr_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Ident(_) => "identifier",
        Expr::Call(_) => "call expression",
        Expr::Fn(_) | Expr::Arrow(_) => "function",
        Expr::Bin(_) => "binary expression",
        Expr::Member(_) => "member expression",
        Expr::Tpl(_) => "template literal",
        Expr::Cond(_) => "conditional expression",
        _ => "expression",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use swc_core::{
        common::{SourceMap, sync::Lrc},
        ecma::ast::Stmt,
    };

    use super::*;
    use crate::syntax::parse_script;

    /// Parse a single expression, without the parentheses wrapped around it
    /// to keep function expressions out of statement position
    pub(crate) fn parse_expr(source: &str) -> Box<Expr> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let script = parse_script(&cm, "expr", &format!("({source});")).expect("valid expression");
        match script.body.into_iter().next() {
            Some(Stmt::Expr(stmt)) => match *stmt.expr {
                Expr::Paren(paren) => paren.expr,
                expr => Box::new(expr),
            },
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_nested_literals() {
        let value = evaluate(&parse_expr("{a: [1, 'x', true, null], 'b': {c: 'd'}}"))
            .expect("literal object");
        assert_eq!(value, json!({"a": [1.0, "x", true, null], "b": {"c": "d"}}));
    }

    #[test]
    fn test_evaluate_string_list() {
        let deps = evaluate_string_list(&parse_expr("['require', './a', 'text!./b.html']"))
            .expect("string list");
        assert_eq!(deps, vec!["require", "./a", "text!./b.html"]);
    }

    #[test]
    fn test_executable_elements_are_rejected() {
        let err = evaluate_string_list(&parse_expr("['a', prefix + 'b']")).expect_err("not literal");
        assert_eq!(err.node_kind, "binary expression");

        let err = evaluate(&parse_expr("[load()]")).expect_err("not literal");
        assert_eq!(err.node_kind, "call expression");

        let err = evaluate_string_list(&parse_expr("['a', 1]")).expect_err("not a string");
        assert_eq!(err.node_kind, "non-string list element");
    }
}
