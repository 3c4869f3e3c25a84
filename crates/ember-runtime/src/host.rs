//! Script host
//!
//! The host owns everything that outlives a single evaluation: per-module
//! function and global-variable registries, the seed-keyed PRNG cache, the
//! print handler, and access to the process-wide system-global map shared by
//! every host in the process.

use crate::value::{FunctionValue, Value};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

/// Process-wide Value-keyed globals, shared by all hosts and tasks.
/// Entries are only ever replaced, never removed.
static SYSTEM_GLOBALS: LazyLock<DashMap<Value, Value>> = LazyLock::new(DashMap::new);

/// A PRNG shared between call sites. The default generator is one of these;
/// seeded generators are cached per seed so repeated `rand(x, seed)` calls
/// continue the same sequence.
#[derive(Clone)]
pub struct SharedRng(Arc<Mutex<StdRng>>);

impl SharedRng {
    pub fn from_entropy() -> Self {
        SharedRng(Arc::new(Mutex::new(StdRng::from_os_rng())))
    }

    pub fn seeded(seed: i64) -> Self {
        SharedRng(Arc::new(Mutex::new(StdRng::seed_from_u64(seed as u64))))
    }

    /// Uniform double in [0, 1)
    pub fn next_f64(&self) -> f64 {
        self.0.lock().unwrap().random()
    }

    /// Uniform single-precision float in [0, 1)
    pub fn next_f32(&self) -> f32 {
        self.0.lock().unwrap().random()
    }

    /// Uniform index in [0, bound). `bound` must be non-zero.
    pub fn next_below(&self, bound: usize) -> usize {
        self.0.lock().unwrap().random_range(0..bound)
    }
}

/// Function and global-variable space of one module
#[derive(Default)]
struct ModuleSpace {
    functions: HashMap<String, FunctionValue>,
    globals: HashMap<String, Value>,
}

/// Host environment for expression evaluation
pub struct ScriptHost {
    modules: Mutex<HashMap<String, ModuleSpace>>,
    seeded_rngs: Mutex<HashMap<i64, SharedRng>>,
    default_rng: SharedRng,
    print_handler: Mutex<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl ScriptHost {
    pub fn new() -> Self {
        ScriptHost {
            modules: Mutex::new(HashMap::new()),
            seeded_rngs: Mutex::new(HashMap::new()),
            default_rng: SharedRng::from_entropy(),
            print_handler: Mutex::new(Arc::new(|text: &str| println!("{}", text))),
        }
    }

    // ------------------------------------------------------------------
    // Function registry
    // ------------------------------------------------------------------

    /// Define (or replace) a function in a module
    pub fn define_function(&self, module: &str, function: FunctionValue) {
        tracing::debug!(module, name = function.name(), "define function");
        self.modules
            .lock()
            .unwrap()
            .entry(module.to_string())
            .or_default()
            .functions
            .insert(function.name().to_string(), function);
    }

    pub fn get_function(&self, module: &str, name: &str) -> Option<FunctionValue> {
        self.modules
            .lock()
            .unwrap()
            .get(module)
            .and_then(|space| space.functions.get(name))
            .cloned()
    }

    pub fn del_function(&self, module: &str, name: &str) {
        if let Some(space) = self.modules.lock().unwrap().get_mut(module) {
            space.functions.remove(name);
        }
    }

    pub fn del_functions_with_prefix(&self, module: &str, prefix: &str) {
        if let Some(space) = self.modules.lock().unwrap().get_mut(module) {
            space.functions.retain(|name, _| !name.starts_with(prefix));
        }
    }

    // ------------------------------------------------------------------
    // Module globals (the `global_...` variable scope)
    // ------------------------------------------------------------------

    pub fn get_global(&self, module: &str, name: &str) -> Option<Value> {
        self.modules
            .lock()
            .unwrap()
            .get(module)
            .and_then(|space| space.globals.get(name))
            .cloned()
    }

    /// Read a module global, creating a Null binding if absent
    pub fn get_or_create_global(&self, module: &str, name: &str) -> Value {
        self.modules
            .lock()
            .unwrap()
            .entry(module.to_string())
            .or_default()
            .globals
            .entry(name.to_string())
            .or_insert(Value::Null)
            .clone()
    }

    pub fn set_global(&self, module: &str, name: impl Into<String>, value: Value) {
        self.modules
            .lock()
            .unwrap()
            .entry(module.to_string())
            .or_default()
            .globals
            .insert(name.into(), value);
    }

    pub fn del_global(&self, module: &str, name: &str) {
        if let Some(space) = self.modules.lock().unwrap().get_mut(module) {
            space.globals.remove(name);
        }
    }

    pub fn del_globals_with_prefix(&self, module: &str, prefix: &str) {
        if let Some(space) = self.modules.lock().unwrap().get_mut(module) {
            space.globals.retain(|name, _| !name.starts_with(prefix));
        }
    }

    /// Names of module globals satisfying `predicate`, unordered
    pub fn global_names(&self, module: &str, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        self.modules
            .lock()
            .unwrap()
            .get(module)
            .map(|space| {
                space
                    .globals
                    .keys()
                    .filter(|name| predicate(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Randomness
    // ------------------------------------------------------------------

    /// The PRNG for an optional seed: the shared default generator when no
    /// seed is given, otherwise the cached per-seed generator.
    pub fn random(&self, seed: Option<i64>) -> SharedRng {
        match seed {
            None => self.default_rng.clone(),
            Some(seed) => self
                .seeded_rngs
                .lock()
                .unwrap()
                .entry(seed)
                .or_insert_with(|| SharedRng::seeded(seed))
                .clone(),
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Replace the print handler (stdout by default)
    pub fn set_print_handler(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        *self.print_handler.lock().unwrap() = Arc::new(handler);
    }

    pub fn print(&self, text: &str) {
        let handler = self.print_handler.lock().unwrap().clone();
        handler(text);
    }

    // ------------------------------------------------------------------
    // System globals (process-wide)
    // ------------------------------------------------------------------

    pub fn system_get(key: &Value) -> Option<Value> {
        SYSTEM_GLOBALS.get(key).map(|entry| entry.value().clone())
    }

    /// Install `value` and return the previous entry, if any
    pub fn system_set(key: Value, value: Value) -> Option<Value> {
        SYSTEM_GLOBALS.insert(key, value)
    }

    /// Atomic insert-if-absent: `default` runs at most once per missing key,
    /// and concurrent callers agree on the single installed value.
    pub fn system_get_or_insert_with<E>(
        key: Value,
        default: impl FnOnce() -> Result<Value, E>,
    ) -> Result<Value, E> {
        match SYSTEM_GLOBALS.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                let value = default()?;
                slot.insert(value.clone());
                Ok(value)
            }
        }
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}
