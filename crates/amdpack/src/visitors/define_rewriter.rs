//! Rewrites a module's registration into its emitted form
//!
//! `define(...)` becomes `define('<id>', [<deps>], factory)` and every direct
//! `require('plugin!res')` on the bound name inside the factory becomes
//! `require('res')`, matching how resource leaves are registered.

use swc_core::{
    common::DUMMY_SP,
    ecma::{
        ast::{ArrayLit, ArrowExpr, CallExpr, Expr, ExprOrSpread, Function, Lit, Str},
        visit::{VisitMut, VisitMutWith},
    },
};

use super::{binds_name, callee_name, is_define_call};
use crate::module_id::strip_plugin;

fn string_arg(value: &str) -> ExprOrSpread {
    ExprOrSpread {
        spread: None,
        expr: Box::new(Expr::Lit(Lit::Str(Str {
            span: DUMMY_SP,
            value: value.into(),
            raw: None,
        }))),
    }
}

/// Rewrites the first `define` call of a script
#[derive(Debug)]
pub struct DefineRewriter<'a> {
    id: &'a str,
    dependencies: &'a [String],
    require_name: Option<&'a str>,
    rewritten: bool,
}

impl<'a> DefineRewriter<'a> {
    /// `dependencies` are the literal dependency ids; their `plugin!`
    /// prefixes are stripped on emission
    pub fn new(id: &'a str, dependencies: &'a [String], require_name: Option<&'a str>) -> Self {
        Self {
            id,
            dependencies,
            require_name,
            rewritten: false,
        }
    }

    /// Whether a `define` call was found and rewritten
    pub fn rewritten(&self) -> bool {
        self.rewritten
    }

    fn rewrite_define(&mut self, call: &mut CallExpr) {
        let Some(mut factory) = call.args.pop() else {
            return;
        };
        if let Some(name) = self.require_name {
            let mut requires = ResourceRequireRewriter { name };
            match &mut *factory.expr {
                Expr::Fn(fn_expr) => {
                    if let Some(body) = fn_expr.function.body.as_mut() {
                        body.visit_mut_with(&mut requires);
                    }
                }
                Expr::Arrow(arrow) => arrow.body.visit_mut_with(&mut requires),
                _ => {}
            }
        }

        let elems = self
            .dependencies
            .iter()
            .map(|dep| Some(string_arg(strip_plugin(dep))))
            .collect();
        call.args = vec![
            string_arg(self.id),
            ExprOrSpread {
                spread: None,
                expr: Box::new(Expr::Array(ArrayLit {
                    span: DUMMY_SP,
                    elems,
                })),
            },
            factory,
        ];
        self.rewritten = true;
    }
}

impl VisitMut for DefineRewriter<'_> {
    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if self.rewritten {
            return;
        }
        if is_define_call(call) && !call.args.is_empty() {
            self.rewrite_define(call);
            return;
        }
        call.visit_mut_children_with(self);
    }
}

/// Strips `plugin!` from single-literal calls on the bound `require` name
struct ResourceRequireRewriter<'a> {
    name: &'a str,
}

impl VisitMut for ResourceRequireRewriter<'_> {
    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if callee_name(call) == Some(self.name) && call.args.len() == 1 {
            if let Expr::Lit(Lit::Str(s)) = &mut *call.args[0].expr {
                if s.value.contains('!') {
                    let resource = strip_plugin(&s.value).to_owned();
                    s.value = resource.into();
                    s.raw = None;
                }
            }
        }
        call.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, function: &mut Function) {
        if binds_name(function.params.iter().map(|param| &param.pat), self.name) {
            return;
        }
        function.visit_mut_children_with(self);
    }

    fn visit_mut_arrow_expr(&mut self, arrow: &mut ArrowExpr) {
        if binds_name(arrow.params.iter(), self.name) {
            return;
        }
        arrow.visit_mut_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use swc_core::common::{SourceMap, sync::Lrc};

    use super::*;
    use crate::syntax::{parse_script, print_script};

    fn rewrite(source: &str, id: &str, deps: &[String], require_name: Option<&str>) -> String {
        let cm: Lrc<SourceMap> = Lrc::default();
        let mut script = parse_script(&cm, "test", source).expect("valid script");
        let mut rewriter = DefineRewriter::new(id, deps, require_name);
        script.visit_mut_with(&mut rewriter);
        assert!(rewriter.rewritten());
        print_script(&cm, &script, true).expect("printable")
    }

    #[test]
    fn test_anonymous_define_gets_id_and_deps() {
        let deps = vec!["require".to_owned(), "text!./tpl.html".to_owned()];
        let out = rewrite(
            "define(function (require) { var t = require('text!./tpl.html'); });",
            "a/b",
            &deps,
            Some("require"),
        );
        assert!(
            out.starts_with("define(\"a/b\",[\"require\",\"./tpl.html\"],function(require)"),
            "{out}"
        );
        assert!(out.contains("require(\"./tpl.html\")"), "{out}");
        assert!(!out.contains("text!"), "{out}");
    }

    #[test]
    fn test_shadowed_require_left_alone() {
        let deps = vec!["require".to_owned()];
        let out = rewrite(
            "define(['require'], function (r) { function f(r) { return r('text!x'); } r('text!y'); });",
            "m",
            &deps,
            Some("r"),
        );
        assert!(out.contains("r(\"text!x\")") || out.contains("r('text!x')"), "{out}");
        assert!(out.contains("r(\"y\")"), "{out}");
    }

    #[test]
    fn test_require_shadowed_by_default_or_destructuring_left_alone() {
        let deps = vec!["require".to_owned()];
        let out = rewrite(
            "define(function (require) {
                function f(require = null) { return require('text!a'); }
                var g = ({ require }) => require('text!b');
                return require('text!c');
            });",
            "m",
            &deps,
            Some("require"),
        );
        assert!(out.contains("text!a"), "{out}");
        assert!(out.contains("text!b"), "{out}");
        assert!(out.contains("require(\"c\")"), "{out}");
    }
}
