//! Compile-time conditional inclusion
//!
//! Branches whose test is built from calls to registered predicates are
//! resolved against the configuration object before dependencies are
//! extracted, so a dead arm's `require` calls are never seen.

use std::fmt;

use log::{debug, trace};
use rustc_hash::FxHashMap;
use serde_json::Value;
use swc_core::{
    common::DUMMY_SP,
    ecma::{
        ast::{
            BinaryOp, Callee, EmptyStmt, Expr, ExprOrSpread, IfStmt, Invalid, Script, Stmt,
            UnaryOp,
        },
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::{
    config::{MacroConfig, PredicateKind},
    static_eval,
};

/// The configuration object predicates read from
pub type MacroEnv = serde_json::Map<String, Value>;

type Predicate = Box<dyn Fn(&[Value], &MacroEnv) -> bool>;

/// Predicate name -> predicate function, plus the object they are evaluated
/// against
pub struct MacroRegistry {
    predicates: FxHashMap<String, Predicate>,
    env: MacroEnv,
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("MacroRegistry")
            .field("predicates", &names)
            .field("env", &self.env)
            .finish()
    }
}

impl MacroRegistry {
    pub fn new(env: MacroEnv) -> Self {
        Self {
            predicates: FxHashMap::default(),
            env,
        }
    }

    /// Build a registry from the `[macros]` configuration table
    pub fn from_config(config: &MacroConfig) -> Self {
        let mut registry = Self::new(config.env.clone());
        for (name, kind) in &config.predicates {
            registry.register_kind(name, *kind);
        }
        registry
    }

    /// Register a custom predicate
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&[Value], &MacroEnv) -> bool + 'static,
    {
        self.predicates.insert(name.into(), Box::new(predicate));
    }

    /// Register one of the built-in predicate kinds under `name`
    pub fn register_kind(&mut self, name: &str, kind: PredicateKind) {
        match kind {
            PredicateKind::Defined => self.register(name, |args, env| {
                lookup(args, env).is_some_and(is_truthy)
            }),
            PredicateKind::Undefined => self.register(name, |args, env| {
                lookup(args, env).is_none_or(Value::is_null)
            }),
            PredicateKind::Equals => self.register(name, |args, env| {
                let expected = args.get(1).unwrap_or(&Value::Null);
                loose_equals(lookup(args, env).unwrap_or(&Value::Null), expected)
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Invoke a predicate; `None` when no predicate has that name
    pub fn call(&self, name: &str, args: &[Value]) -> Option<bool> {
        self.predicates
            .get(name)
            .map(|predicate| predicate(args, &self.env))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// The env entry named by the first (string) argument
fn lookup<'a>(args: &[Value], env: &'a MacroEnv) -> Option<&'a Value> {
    args.first().and_then(Value::as_str).and_then(|key| env.get(key))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// What a resolved branch is replaced with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Consequent,
    Alternate,
    /// The test is false and there is no alternate
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Value(bool),
    And,
    Or,
    Not,
}

/// Resolves predicate-driven branches in place
#[derive(Debug)]
pub struct MacroEvaluator<'a> {
    registry: &'a MacroRegistry,
    rewrites: usize,
    removals: usize,
}

impl<'a> MacroEvaluator<'a> {
    pub fn new(registry: &'a MacroRegistry) -> Self {
        Self {
            registry,
            rewrites: 0,
            removals: 0,
        }
    }

    /// Number of branches resolved so far
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// Whether `stmt` is an `if` statement with a predicate-driven test
    pub fn is_conditional(&self, stmt: &Stmt) -> bool {
        matches!(stmt, Stmt::If(if_stmt) if self.is_conditional_test(&if_stmt.test))
    }

    pub fn is_conditional_test(&self, test: &Expr) -> bool {
        match unparen(test) {
            Expr::Bin(bin) if matches!(bin.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) => {
                self.is_predicate_call(&bin.right)
            }
            Expr::Unary(unary) if unary.op == UnaryOp::Bang => self.is_predicate_call(&unary.arg),
            other => self.is_predicate_call(other),
        }
    }

    fn is_predicate_call(&self, expr: &Expr) -> bool {
        self.predicate_name(unparen(expr))
            .is_some_and(|name| self.registry.contains(name))
    }

    fn predicate_name<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        let Expr::Call(call) = expr else {
            return None;
        };
        let Callee::Expr(callee) = &call.callee else {
            return None;
        };
        match &**callee {
            Expr::Ident(ident) => Some(&*ident.sym),
            _ => None,
        }
    }

    /// Evaluate a branch test; `None` when it is undetermined
    pub fn evaluate(&self, test: &Expr) -> Option<bool> {
        let mut postfix = Vec::new();
        self.push_postfix(test, &mut postfix)?;

        let mut stack: Vec<bool> = Vec::with_capacity(postfix.len());
        for token in postfix {
            let value = match token {
                Token::Value(value) => value,
                Token::Not => !stack.pop()?,
                Token::And | Token::Or => {
                    let right = stack.pop()?;
                    let left = stack.pop()?;
                    if token == Token::And {
                        left && right
                    } else {
                        left || right
                    }
                }
            };
            stack.push(value);
        }

        match stack.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    fn push_postfix(&self, expr: &Expr, out: &mut Vec<Token>) -> Option<()> {
        match unparen(expr) {
            Expr::Bin(bin) if matches!(bin.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) => {
                self.push_postfix(&bin.left, out)?;
                self.push_postfix(&bin.right, out)?;
                out.push(if bin.op == BinaryOp::LogicalAnd {
                    Token::And
                } else {
                    Token::Or
                });
            }
            Expr::Unary(unary) if unary.op == UnaryOp::Bang => {
                self.push_postfix(&unary.arg, out)?;
                out.push(Token::Not);
            }
            Expr::Call(call) => {
                let name = self.predicate_name(unparen(expr))?;
                let args = call
                    .args
                    .iter()
                    .map(|arg| match arg {
                        ExprOrSpread { spread: None, expr } => static_eval::evaluate(expr).ok(),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                out.push(Token::Value(self.registry.call(name, &args)?));
            }
            _ => return None,
        }
        Some(())
    }

    /// Decide what an `if` statement should be replaced with
    pub fn rewrite(&self, if_stmt: &IfStmt) -> Option<Replacement> {
        if !self.is_conditional_test(&if_stmt.test) {
            return None;
        }
        Some(match self.evaluate(&if_stmt.test)? {
            true => Replacement::Consequent,
            false if if_stmt.alt.is_some() => Replacement::Alternate,
            false => Replacement::Remove,
        })
    }
}

fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(paren) = expr {
        expr = &paren.expr;
    }
    expr
}

fn empty_stmt() -> Stmt {
    Stmt::Empty(EmptyStmt { span: DUMMY_SP })
}

impl VisitMut for MacroEvaluator<'_> {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        let removals = self.removals;
        stmts.visit_mut_children_with(self);
        if self.removals != removals {
            stmts.retain(|stmt| !matches!(stmt, Stmt::Empty(_)));
        }
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        // Replacements are re-examined so `else if` chains collapse fully
        while self.is_conditional(stmt) {
            let Stmt::If(if_stmt) = &*stmt else {
                break;
            };
            let Some(replacement) = self.rewrite(if_stmt) else {
                break;
            };
            trace!("Resolved conditional branch to {replacement:?}");
            self.rewrites += 1;

            if let Stmt::If(IfStmt { cons, alt, .. }) = std::mem::replace(stmt, empty_stmt()) {
                *stmt = match (replacement, alt) {
                    (Replacement::Consequent, _) => *cons,
                    (Replacement::Alternate, Some(alt)) => *alt,
                    _ => {
                        self.removals += 1;
                        empty_stmt()
                    }
                };
            }
        }
        stmt.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        loop {
            let Expr::Cond(cond) = &*expr else {
                break;
            };
            if !self.is_conditional_test(&cond.test) {
                break;
            }
            let Some(value) = self.evaluate(&cond.test) else {
                break;
            };
            self.rewrites += 1;

            let taken = std::mem::replace(expr, Expr::Invalid(Invalid { span: DUMMY_SP }));
            if let Expr::Cond(cond) = taken {
                *expr = if value { *cond.cons } else { *cond.alt };
            }
        }
        expr.visit_mut_children_with(self);
    }
}

/// Resolve every predicate-driven branch in `script`, returning how many
/// were rewritten
pub fn apply(registry: &MacroRegistry, script: &mut Script) -> usize {
    if registry.is_empty() {
        return 0;
    }
    let mut evaluator = MacroEvaluator::new(registry);
    script.visit_mut_with(&mut evaluator);
    if evaluator.rewrites() > 0 {
        debug!("Resolved {} conditional branches", evaluator.rewrites());
    }
    evaluator.rewrites()
}
