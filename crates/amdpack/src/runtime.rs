//! Lazy module runtime
//!
//! [`LOADER_BOOTSTRAP`] is the loader shipped at the head of every core
//! bundle. [`ModuleRuntime`] models the same state machine in Rust so its
//! instantiation guarantees can be exercised directly: every factory runs
//! exactly once, on first use, whatever order modules were registered in.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use log::trace;
use serde_json::Value;
use thiserror::Error;

use crate::{module_id::relative_to_absolute, module_registry::FxIndexMap};

/// JavaScript source of the embedded loader
pub const LOADER_BOOTSTRAP: &str = include_str!("../resources/loader.js");

/// A module's exports object, shared with every module that received it
pub type Exports = Rc<RefCell<Value>>;

type Factory = Box<dyn Fn(&[FactoryArg]) -> Result<Option<Value>, RuntimeError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("No {0}")]
    NotRegistered(String),
    #[error("factory of `{id}` failed: {message}")]
    Factory { id: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Registered,
    /// The factory is running; requires hand back partial exports
    Instantiating,
    Instantiated,
}

struct ModuleEntry {
    id: String,
    deps: Vec<String>,
    /// Number of declared factory parameters
    arity: usize,
    factory: Factory,
    state: Cell<ModuleState>,
    exports: RefCell<Exports>,
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("id", &self.id)
            .field("deps", &self.deps)
            .field("arity", &self.arity)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// The `module` argument of a factory
#[derive(Debug, Clone)]
pub struct ModuleHandle(Rc<ModuleEntry>);

impl ModuleHandle {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn exports(&self) -> Exports {
        Rc::clone(&self.0.exports.borrow())
    }

    /// `module.exports = value`
    pub fn set_exports(&self, value: Value) {
        *self.0.exports.borrow_mut() = Rc::new(RefCell::new(value));
    }
}

/// A `require` scoped to one module, resolving relative ids against it
#[derive(Debug, Clone)]
pub struct LocalRequire {
    runtime: ModuleRuntime,
    base_id: String,
}

impl LocalRequire {
    pub fn call(&self, id: &str) -> Result<Exports, RuntimeError> {
        self.runtime.require_from(&self.base_id, id)
    }
}

/// A positional factory argument
#[derive(Debug, Clone)]
pub enum FactoryArg {
    Require(LocalRequire),
    Exports(Exports),
    Module(ModuleHandle),
    /// Exports of a declared dependency
    Dependency(Exports),
}

impl FactoryArg {
    pub fn as_require(&self) -> Option<&LocalRequire> {
        match self {
            Self::Require(require) => Some(require),
            _ => None,
        }
    }

    /// The exports carried by an `exports` or dependency argument
    pub fn as_exports(&self) -> Option<&Exports> {
        match self {
            Self::Exports(exports) | Self::Dependency(exports) => Some(exports),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleHandle> {
        match self {
            Self::Module(module) => Some(module),
            _ => None,
        }
    }
}

/// Registration table plus lazy instantiation
#[derive(Debug, Clone, Default)]
pub struct ModuleRuntime {
    modules: Rc<RefCell<FxIndexMap<String, Rc<ModuleEntry>>>>,
}

impl ModuleRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a module; nothing runs until it is first required
    pub fn register<F>(&self, id: impl Into<String>, deps: Vec<String>, arity: usize, factory: F)
    where
        F: Fn(&[FactoryArg]) -> Result<Option<Value>, RuntimeError> + 'static,
    {
        let id = id.into();
        let entry = ModuleEntry {
            id: id.clone(),
            deps,
            arity,
            factory: Box::new(factory),
            state: Cell::new(ModuleState::Registered),
            exports: RefCell::new(Rc::new(RefCell::new(Value::Object(Default::default())))),
        };
        self.modules.borrow_mut().insert(id, Rc::new(entry));
    }

    /// `None` while a module is unregistered
    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.modules.borrow().get(id).map(|entry| entry.state.get())
    }

    /// The global `require`
    pub fn require(&self, id: &str) -> Result<Exports, RuntimeError> {
        self.require_from("", id)
    }

    fn require_from(&self, base_id: &str, id: &str) -> Result<Exports, RuntimeError> {
        let id = if base_id.is_empty() {
            id.to_owned()
        } else {
            relative_to_absolute(id, base_id)
        };

        let entry = self
            .modules
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotRegistered(id.clone()))?;

        if entry.state.get() == ModuleState::Registered {
            self.instantiate(&entry)?;
        }
        Ok(Rc::clone(&entry.exports.borrow()))
    }

    fn instantiate(&self, entry: &Rc<ModuleEntry>) -> Result<(), RuntimeError> {
        trace!("Instantiating `{}`", entry.id);
        entry.state.set(ModuleState::Instantiating);

        let result = self.factory_args(entry).and_then(|args| (entry.factory)(&args));
        match result {
            Ok(returned) => {
                if let Some(value) = returned {
                    *entry.exports.borrow_mut() = Rc::new(RefCell::new(value));
                }
                entry.state.set(ModuleState::Instantiated);
                Ok(())
            }
            Err(err) => {
                entry.state.set(ModuleState::Registered);
                Err(err)
            }
        }
    }

    fn factory_args(&self, entry: &Rc<ModuleEntry>) -> Result<Vec<FactoryArg>, RuntimeError> {
        let count = entry.deps.len().min(entry.arity);
        entry.deps[..count]
            .iter()
            .map(|dep| {
                Ok(match dep.as_str() {
                    "require" => FactoryArg::Require(LocalRequire {
                        runtime: self.clone(),
                        base_id: entry.id.clone(),
                    }),
                    "exports" => FactoryArg::Exports(Rc::clone(&entry.exports.borrow())),
                    "module" => FactoryArg::Module(ModuleHandle(Rc::clone(entry))),
                    _ => FactoryArg::Dependency(self.require_from(&entry.id, dep)?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use swc_core::common::{SourceMap, sync::Lrc};

    use super::*;
    use crate::syntax::parse_script;

    fn deps(items: &[&str]) -> Vec<String> {
        items.iter().map(|&item| item.to_owned()).collect()
    }

    #[test]
    fn test_factory_runs_once() {
        let runtime = ModuleRuntime::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        runtime.register("a", Vec::new(), 0, move |_| {
            counter.set(counter.get() + 1);
            Ok(Some(json!({"value": 1})))
        });

        assert_eq!(runtime.state("a"), Some(ModuleState::Registered));
        let first = runtime.require("a").expect("registered");
        let second = runtime.require("a").expect("registered");

        assert_eq!(calls.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(*first.borrow(), json!({"value": 1}));
        assert_eq!(runtime.state("a"), Some(ModuleState::Instantiated));
    }

    #[test]
    fn test_reverse_registration_order() {
        let runtime = ModuleRuntime::new();
        let util_calls = Rc::new(Cell::new(0));

        runtime.register("app/main", deps(&["./view", "./util"]), 2, |args| {
            let util = args[1].as_exports().expect("dependency");
            Ok(Some(json!({"util": util.borrow().clone()})))
        });
        runtime.register("app/view", deps(&["./util"]), 1, |args| {
            let util = args[0].as_exports().expect("dependency");
            Ok(Some(json!({"sees": util.borrow().clone()})))
        });
        let counter = Rc::clone(&util_calls);
        runtime.register("app/util", Vec::new(), 0, move |_| {
            counter.set(counter.get() + 1);
            Ok(Some(json!("util")))
        });

        let main = runtime.require("app/main").expect("registered");
        assert_eq!(*main.borrow(), json!({"util": "util"}));
        assert_eq!(util_calls.get(), 1);
        assert_eq!(runtime.state("app/view"), Some(ModuleState::Instantiated));
    }

    #[test]
    fn test_cycle_hands_back_partial_exports() {
        let runtime = ModuleRuntime::new();
        runtime.register("a", deps(&["exports", "b"]), 2, |args| {
            let exports = args[0].as_exports().expect("exports");
            exports.borrow_mut()["done"] = json!(true);
            Ok(None)
        });
        runtime.register("b", deps(&["a"]), 1, |args| {
            let a = args[0].as_exports().expect("dependency");
            Ok(Some(json!({"saw": a.borrow().clone()})))
        });

        let a = runtime.require("a").expect("registered");
        let b = runtime.require("b").expect("registered");

        assert_eq!(*b.borrow(), json!({"saw": {}}));
        assert_eq!(*a.borrow(), json!({"done": true}));
    }

    #[test]
    fn test_module_handle_replaces_exports() {
        let runtime = ModuleRuntime::new();
        runtime.register("m", deps(&["module", "exports"]), 2, |args| {
            let module = args[0].as_module().expect("module");
            assert_eq!(module.id(), "m");
            module.set_exports(json!([1, 2]));
            Ok(None)
        });

        assert_eq!(*runtime.require("m").expect("registered").borrow(), json!([1, 2]));
    }

    #[test]
    fn test_local_require_is_relative() {
        let runtime = ModuleRuntime::new();
        runtime.register("lib/chart/bar", Vec::new(), 0, |_| Ok(Some(json!("bar"))));
        runtime.register("lib/chart/line", deps(&["require"]), 1, |args| {
            let require = args[0].as_require().expect("require");
            let bar = require.call("./bar")?;
            let value = bar.borrow().clone();
            Ok(Some(value))
        });

        let line = runtime.require("lib/chart/line").expect("registered");
        assert_eq!(*line.borrow(), json!("bar"));
    }

    #[test]
    fn test_arity_caps_arguments() {
        let runtime = ModuleRuntime::new();
        runtime.register("a", deps(&["missing"]), 0, |args| {
            assert!(args.is_empty());
            Ok(None)
        });
        assert!(runtime.require("a").is_ok());
    }

    #[test]
    fn test_errors() {
        let runtime = ModuleRuntime::new();
        let err = runtime.require("nope").expect_err("unregistered");
        assert_eq!(err.to_string(), "No nope");

        runtime.register("bad", deps(&["nope"]), 1, |_| Ok(None));
        assert!(runtime.require("bad").is_err());
        assert_eq!(runtime.state("bad"), Some(ModuleState::Registered));

        runtime.register("failing", Vec::new(), 0, |_| {
            Err(RuntimeError::Factory {
                id: "failing".to_owned(),
                message: "boom".to_owned(),
            })
        });
        assert!(runtime.require("failing").is_err());
        assert_eq!(runtime.state("failing"), Some(ModuleState::Registered));
    }

    #[test]
    fn test_bootstrap_is_valid_script() {
        let cm: Lrc<SourceMap> = Lrc::default();
        let script = parse_script(&cm, "loader.js", LOADER_BOOTSTRAP).expect("valid bootstrap");
        assert!(!script.body.is_empty());
        assert!(LOADER_BOOTSTRAP.contains("throw new Error('No ' + id)"));
    }
}
