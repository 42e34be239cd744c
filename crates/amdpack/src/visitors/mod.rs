//! AST visitors over module scripts
//!
//! Locating the `define(...)` registration, collecting dynamic `require`
//! calls inside a factory, and rewriting both for emission.

mod define_call;
mod define_rewriter;
mod require_calls;

pub use define_call::DefineCall;
pub use define_rewriter::DefineRewriter;
pub use require_calls::RequireCallCollector;
use swc_core::ecma::ast::{CallExpr, Callee, Expr, ExprOrSpread, Lit, ObjectPatProp, Pat};

/// Name of a call's callee when it is a plain identifier
pub(crate) fn callee_name(call: &CallExpr) -> Option<&str> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    match &**callee {
        Expr::Ident(ident) => Some(&*ident.sym),
        _ => None,
    }
}

pub(crate) fn is_define_call(call: &CallExpr) -> bool {
    callee_name(call) == Some("define")
}

/// The argument of a call taking exactly one string literal
pub(crate) fn single_string_arg(call: &CallExpr) -> Option<&str> {
    match call.args.as_slice() {
        [ExprOrSpread { spread: None, expr }] => match &**expr {
            Expr::Lit(Lit::Str(s)) => Some(&*s.value),
            _ => None,
        },
        _ => None,
    }
}

/// Whether any of the parameter patterns binds `name`, including through
/// defaults, rest elements and destructuring
pub(crate) fn binds_name<'a>(mut pats: impl Iterator<Item = &'a Pat>, name: &str) -> bool {
    pats.any(|pat| pat_binds(pat, name))
}

fn pat_binds(pat: &Pat, name: &str) -> bool {
    match pat {
        Pat::Ident(binding) => &*binding.id.sym == name,
        Pat::Assign(assign) => pat_binds(&assign.left, name),
        Pat::Rest(rest) => pat_binds(&rest.arg, name),
        Pat::Array(array) => array.elems.iter().flatten().any(|elem| pat_binds(elem, name)),
        Pat::Object(object) => object.props.iter().any(|prop| match prop {
            ObjectPatProp::KeyValue(key_value) => pat_binds(&key_value.value, name),
            ObjectPatProp::Assign(assign) => &*assign.key.sym == name,
            ObjectPatProp::Rest(rest) => pat_binds(&rest.arg, name),
        }),
        _ => false,
    }
}
