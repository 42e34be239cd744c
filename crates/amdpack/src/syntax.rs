//! Parser, printer and compressor boundary
//!
//! Source text goes through swc's ECMAScript parser into an owned `Script`
//! and back out through its code generator. Nothing else in the crate
//! touches source text directly.

use anyhow::{Result, anyhow, bail};
use log::{trace, warn};
use swc_core::{
    common::{FileName, GLOBALS, Globals, Mark, SourceMap, Spanned, sync::Lrc},
    ecma::{
        ast::{EsVersion, Program, Script},
        codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter},
        minifier::{
            optimize,
            option::{ExtraOptions, MangleOptions, MinifyOptions, terser::TerserCompressorOptions},
        },
        parser::{Syntax, parse_file_as_script},
        transforms::base::{fixer::fixer, resolver},
        visit::VisitMutWith,
    },
};

/// Parse `source` as a classic (non-module) script.
///
/// Recoverable syntax errors are logged; unrecoverable ones are returned
/// with the line they occurred on.
pub fn parse_script(cm: &Lrc<SourceMap>, name: &str, source: &str) -> Result<Script> {
    let fm = cm.new_source_file(FileName::Custom(name.to_owned()).into(), source.to_owned());
    let mut recovered = Vec::new();

    let script = parse_file_as_script(
        &fm,
        Syntax::Es(Default::default()),
        EsVersion::EsNext,
        None,
        &mut recovered,
    )
    .map_err(|err| {
        let loc = cm.lookup_char_pos(err.span().lo);
        anyhow!("line {}: {:?}", loc.line, err.kind())
    })?;

    for err in recovered {
        let loc = cm.lookup_char_pos(err.span().lo);
        warn!("{name}: recovered from syntax error on line {}: {:?}", loc.line, err.kind());
    }

    trace!("Parsed `{name}` into {} statements", script.body.len());
    Ok(script)
}

/// Print a script back to source text
pub fn print_script(cm: &Lrc<SourceMap>, script: &Script, minify: bool) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_minify(minify),
            cm: cm.clone(),
            comments: None,
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_script(script)?;
    }

    Ok(String::from_utf8(buf)?)
}

/// Final-bundle compression step
pub trait Compressor {
    fn compress(&self, source: &str) -> Result<String>;
}

/// Compresses and mangles a bundle with swc's minifier.
///
/// Top-level bindings are left alone: `define` and `require` are globals
/// shared between bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwcCompressor;

impl Compressor for SwcCompressor {
    fn compress(&self, source: &str) -> Result<String> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let script = parse_script(&cm, "bundle.js", source)?;
        let compress = serde_json::from_value::<TerserCompressorOptions>(serde_json::json!({}))?
            .into_config(cm.clone());

        GLOBALS.set(&Globals::new(), || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            let mut program = Program::Script(script);
            program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

            let options = MinifyOptions {
                compress: Some(compress),
                mangle: Some(MangleOptions::default()),
                ..Default::default()
            };
            let extra = ExtraOptions {
                unresolved_mark,
                top_level_mark,
            };
            let mut program = optimize(program, cm.clone(), None, None, &options, &extra);
            program.visit_mut_with(&mut fixer(None));

            match program {
                Program::Script(script) => print_script(&cm, &script, true),
                Program::Module(_) => bail!("minifier turned the bundle into a module"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_print() {
        let cm: Lrc<SourceMap> = Lrc::default();
        let script = parse_script(&cm, "a", "define(function (require) { return 1; });")
            .expect("valid script");
        let printed = print_script(&cm, &script, false).expect("printable");
        assert!(printed.contains("define(function(require)") || printed.contains("define(function (require)"));
    }

    #[test]
    fn test_parse_failure_reports_line() {
        let cm: Lrc<SourceMap> = Lrc::default();
        let err = parse_script(&cm, "broken", "var a = 1;\nvar = ;").expect_err("invalid script");
        assert!(err.to_string().starts_with("line 2"), "{err}");
    }

    #[test]
    fn test_compressor_mangles_locals_and_keeps_globals() {
        let source = "var require, define;
define('a', ['require'], function (require) {
    var longLocalName = require('./b');
    return longLocalName.x + longLocalName.y;
});
";
        let compressed = SwcCompressor.compress(source).expect("compressible");
        assert!(compressed.len() < source.len());
        assert!(!compressed.contains("longLocalName"), "{compressed}");
        assert!(compressed.contains("define("), "{compressed}");
        assert!(compressed.contains("./b"), "{compressed}");
    }
}
