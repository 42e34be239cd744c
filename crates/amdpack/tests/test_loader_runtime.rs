//! The shipped loader and emitted bundles, executed in a JavaScript engine

use std::{fs, path::Path};

use amdpack::{
    bundler::{BundleMode, Bundler},
    config::Config,
    runtime::LOADER_BOOTSTRAP,
};
use boa_engine::{Context, Source};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Evaluate scripts in order in one context, returning the completion value
/// of the last as a string
fn eval_all(scripts: &[&str]) -> String {
    let mut context = Context::default();
    let mut last = None;
    for script in scripts {
        let value = context
            .eval(Source::from_bytes(script))
            .unwrap_or_else(|err| panic!("script failed: {err}\n{script}"));
        last = Some(value);
    }
    last.expect("at least one script")
        .to_string(&mut context)
        .expect("string conversion")
        .to_std_string_escaped()
}

fn with_loader(test: &str) -> String {
    eval_all(&[LOADER_BOOTSTRAP, test])
}

#[test]
fn test_factories_run_once_in_any_registration_order() {
    let result = with_loader(
        "var calls = { main: 0, view: 0, util: 0 };
        define('app/main', ['./view', './util'], function (view, util) {
            calls.main++;
            return view + '+' + util;
        });
        define('app/view', ['./util'], function (util) {
            calls.view++;
            return 'view(' + util + ')';
        });
        define('app/util', [], function () {
            calls.util++;
            return 'util';
        });
        var first = require('app/main');
        var second = require('app/main');
        [first, first === second, calls.main, calls.view, calls.util].join(',');",
    );
    assert_eq!(result, "view(util)+util,true,1,1,1");
}

#[test]
fn test_nothing_runs_before_first_require() {
    let result = with_loader(
        "var ran = false;
        define('lazy', [], function () { ran = true; });
        var before = ran;
        require('lazy');
        [before, ran].join(',');",
    );
    assert_eq!(result, "false,true");
}

#[test]
fn test_cycle_hands_back_partial_exports() {
    let result = with_loader(
        "define('a', ['exports', 'b'], function (exports, b) {
            exports.done = true;
            exports.sawB = b.sawA;
        });
        define('b', ['a'], function (a) {
            return { sawA: JSON.stringify(a) };
        });
        JSON.stringify(require('a')) + '|' + JSON.stringify(require('b'));",
    );
    assert_eq!(result, r#"{"done":true,"sawB":"{}"}|{"sawA":"{}"}"#);
}

#[test]
fn test_arguments_are_capped_by_factory_arity() {
    let result = with_loader(
        "define('c', ['missing'], function () { return 'ok'; });
        require('c');",
    );
    assert_eq!(result, "ok");
}

#[test]
fn test_local_require_and_module_handle() {
    let result = with_loader(
        "define('lib/chart/bar', [], function () { return 'bar'; });
        define('lib/chart/line', ['require', 'module'], function (require, module) {
            module.exports = require('./bar') + ':' + module.id;
        });
        require('lib/chart/line');",
    );
    assert_eq!(result, "bar:lib/chart/line");
}

#[test]
fn test_errors_and_retry_after_failed_factory() {
    let result = with_loader(
        "var unknown;
        try { require('nope'); } catch (e) { unknown = e.message; }

        var attempts = 0;
        define('flaky', [], function () {
            attempts++;
            if (attempts === 1) { throw new Error('boom'); }
            return 'ok';
        });
        var first;
        try { require('flaky'); } catch (e) { first = e.message; }
        [unknown, first, require('flaky'), attempts].join(',');",
    );
    assert_eq!(result, "No nope,boom,ok,2");
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("has parent")).expect("create dirs");
    fs::write(path, contents).expect("write fixture");
}

/// A project whose entry is emitted before the modules it depends on
fn project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    write(
        root,
        "amdpack.toml",
        r#"
[loader]
base_url = "src"

[bundle]
main = "lib/main"

[[bundle.parts]]
id = "lib/chart/line"
weight = 10
"#,
    );
    write(
        root,
        "src/lib/main.js",
        "define(['./core'], function (core) { return 'main:' + core.name; });",
    );
    write(
        root,
        "src/lib/core.js",
        "define(function (require, exports) { exports.name = 'core'; });",
    );
    write(
        root,
        "src/lib/chart/line.js",
        "define(['require', '../core', 'text!./tpl.html'], function (require, core, tpl) {
            var render = require('./lineUtil');
            return render(core.name + ' ' + tpl);
        });",
    );
    write(
        root,
        "src/lib/chart/lineUtil.js",
        "define(function () { return function (text) { return 'line:' + text; }; });",
    );
    write(root, "src/lib/chart/tpl.html", "<svg/>");
    dir
}

fn build(dir: &TempDir, mode: BundleMode) -> std::path::PathBuf {
    let config = Config::load(&dir.path().join("amdpack.toml")).expect("valid config");
    let dist = config.output.dist.clone();
    let report = Bundler::new(config).run(mode, &dist).expect("build succeeds");
    assert!(!report.has_failures(), "{:?}", report.failures);
    dist
}

fn read(dist: &Path, relative: &str) -> String {
    fs::read_to_string(dist.join(relative)).unwrap_or_else(|err| panic!("{relative}: {err}"))
}

#[test]
fn test_demand_bundles_load_in_sequence() {
    let dir = project();
    let dist = build(&dir, BundleMode::Demand);
    let core = read(&dist, "main.source.js");
    let line = read(&dist, "chart/line.source.js");

    assert_eq!(
        eval_all(&[&core, "require('lib/main');"]),
        "main:core"
    );
    assert_eq!(
        eval_all(&[&core, &line, "require('lib/main') + '|' + require('lib/chart/line');"]),
        "main:core|line:core <svg/>"
    );
}

#[test]
fn test_part_before_its_bundle_is_not_registered() {
    let dir = project();
    let dist = build(&dir, BundleMode::Demand);
    let core = read(&dist, "main.source.js");

    let result = eval_all(&[
        &core,
        "try { require('lib/chart/line'); } catch (e) { e.message; }",
    ]);
    assert_eq!(result, "No lib/chart/line");
}

#[test]
fn test_all_in_one_bundle_runs_source_and_compressed() {
    let dir = project();
    let dist = build(&dir, BundleMode::All);

    for name in ["main-all.source.js", "main-all.js"] {
        let bundle = read(&dist, name);
        assert_eq!(
            eval_all(&[&bundle, "require('lib/main') + '|' + require('lib/chart/line');"]),
            "main:core|line:core <svg/>",
            "{name}"
        );
    }
}
