//! Locates the first `define(...)` registration of a module

use swc_core::ecma::{
    ast::{CallExpr, Expr, ExprOrSpread, Lit, Pat, Script},
    visit::{Visit, VisitWith},
};

use super::is_define_call;
use crate::static_eval::{CannotEvaluate, evaluate_string_list};

/// The parts of a `define([id,] [deps,] factory)` call
#[derive(Debug, Clone)]
pub struct DefineCall {
    /// Explicit id argument, when present
    pub declared_id: Option<String>,
    /// Explicit dependency array, when present
    pub dependencies: Option<Vec<String>>,
    /// The last argument
    pub factory: Box<Expr>,
}

impl DefineCall {
    /// Find the first `define` call with arguments, in pre-order.
    ///
    /// Fails when the dependency array holds anything but string literals.
    pub fn find(script: &Script) -> Result<Option<Self>, CannotEvaluate> {
        let mut finder = DefineCallFinder { found: None };
        script.visit_with(&mut finder);
        finder.found.transpose()
    }

    fn from_call(call: &CallExpr) -> Option<Result<Self, CannotEvaluate>> {
        let (factory, leading) = call.args.split_last()?;
        let mut declared_id = None;
        let mut dependencies = None;

        for ExprOrSpread { expr, .. } in leading {
            match &**expr {
                Expr::Lit(Lit::Str(s)) => declared_id = Some(s.value.to_string()),
                Expr::Array(_) => match evaluate_string_list(expr) {
                    Ok(list) => dependencies = Some(list),
                    Err(err) => return Some(Err(err)),
                },
                _ => {}
            }
        }

        Some(Ok(Self {
            declared_id,
            dependencies,
            factory: factory.expr.clone(),
        }))
    }

    /// Formal parameter names of a function factory, `None` for
    /// destructuring patterns
    pub fn factory_params(&self) -> Vec<Option<String>> {
        let name = |pat: &Pat| match pat {
            Pat::Ident(binding) => Some(binding.id.sym.to_string()),
            _ => None,
        };
        match &*self.factory {
            Expr::Fn(fn_expr) => fn_expr
                .function
                .params
                .iter()
                .map(|param| name(&param.pat))
                .collect(),
            Expr::Arrow(arrow) => arrow.params.iter().map(name).collect(),
            _ => Vec::new(),
        }
    }
}

struct DefineCallFinder {
    found: Option<Result<DefineCall, CannotEvaluate>>,
}

impl Visit for DefineCallFinder {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if self.found.is_some() {
            return;
        }
        if is_define_call(call) {
            self.found = DefineCall::from_call(call);
            if self.found.is_some() {
                return;
            }
        }
        call.visit_children_with(self);
    }
}
