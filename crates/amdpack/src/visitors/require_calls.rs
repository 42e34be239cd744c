//! Dynamic `require('...')` discovery inside a factory body

use swc_core::ecma::{
    ast::{ArrowExpr, CallExpr, Expr, Function},
    visit::{Visit, VisitWith},
};

use super::{binds_name, callee_name, single_string_arg};

/// Collects the string literal of every direct call on the bound `require`
/// name. Nested functions that rebind the name as a parameter are skipped;
/// aliases and computed arguments are not followed.
#[derive(Debug)]
pub struct RequireCallCollector<'a> {
    name: &'a str,
    calls: Vec<String>,
}

impl<'a> RequireCallCollector<'a> {
    /// Collect from the body of `factory`, where `name` is the parameter
    /// bound to `require`
    pub fn collect(factory: &Expr, name: &'a str) -> Vec<String> {
        let mut collector = Self {
            name,
            calls: Vec::new(),
        };
        match factory {
            Expr::Fn(fn_expr) => {
                if let Some(body) = &fn_expr.function.body {
                    body.visit_with(&mut collector);
                }
            }
            Expr::Arrow(arrow) => arrow.body.visit_with(&mut collector),
            _ => {}
        }
        collector.calls
    }
}

impl Visit for RequireCallCollector<'_> {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if callee_name(call) == Some(self.name) {
            if let Some(id) = single_string_arg(call) {
                self.calls.push(id.to_owned());
            }
        }
        call.visit_children_with(self);
    }

    fn visit_function(&mut self, function: &Function) {
        if binds_name(function.params.iter().map(|param| &param.pat), self.name) {
            return;
        }
        function.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
        if binds_name(arrow.params.iter(), self.name) {
            return;
        }
        arrow.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_eval::tests::parse_expr;

    #[test]
    fn test_collects_direct_calls() {
        let factory = parse_expr(
            "function (req) {
                var a = req('./a');
                if (x) { req('text!./tpl.html'); }
                req(name);
                req('a', 'b');
                return function () { return req('./lazy'); };
            }",
        );
        assert_eq!(
            RequireCallCollector::collect(&factory, "req"),
            vec!["./a", "text!./tpl.html", "./lazy"]
        );
    }

    #[test]
    fn test_skips_shadowing_functions() {
        let factory = parse_expr(
            "function (require) {
                require('./kept');
                function inner(require) { require('./shadowed'); }
                var f = (require) => require('./also-shadowed');
                var g = () => require('./arrow');
            }",
        );
        assert_eq!(
            RequireCallCollector::collect(&factory, "require"),
            vec!["./kept", "./arrow"]
        );
    }

    #[test]
    fn test_skips_functions_shadowing_through_patterns() {
        let factory = parse_expr(
            "function (require) {
                function withDefault(require = null) { require('./default'); }
                function withRest(...require) { require('./rest'); }
                var destructured = ({ require }) => require('./destructured');
                var nested = ([{ load: require }]) => require('./nested');
                var renamed = ({ require: load }) => require('./renamed');
            }",
        );
        assert_eq!(
            RequireCallCollector::collect(&factory, "require"),
            vec!["./renamed"]
        );
    }
}
