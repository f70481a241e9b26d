use crate::identity::InstanceId;
use crate::invoker::Bound;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Callable stand-in: receives the receiver binding and the forwarded
/// arguments, produces the call result.
pub type StubFn = Rc<dyn Fn(Bound<'_>, &[Value]) -> Result<Value>>;

/// A registered stand-in for a real call.
#[derive(Clone)]
pub enum Replacement {
    /// Value returned verbatim, regardless of the call's arguments.
    Literal(Value),
    /// Callable invoked with the bound receiver and forwarded arguments.
    Callable(StubFn),
}

impl Replacement {
    /// Replacement returning `value` verbatim.
    pub fn literal(value: impl Into<Value>) -> Self {
        Replacement::Literal(value.into())
    }

    /// Replacement wrapping a closure.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(Bound<'_>, &[Value]) -> Result<Value> + 'static,
    {
        Replacement::Callable(Rc::new(f))
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Replacement::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Method name → replacement, as registered for one class or one instance.
pub type StubMap = HashMap<String, Replacement>;

/// The three independent stub tables: by function name, by class name, by
/// object identity. Entries exist only while explicitly registered.
#[derive(Debug, Default)]
pub struct StubRegistry {
    class_map: HashMap<String, StubMap>,
    object_map: HashMap<InstanceId, StubMap>,
    func_map: HashMap<String, Replacement>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `stubs` into the class entry, creating it if absent. Methods
    /// already stubbed for the class keep their entry unless `stubs` names
    /// them again. A leading `::` on `class` is stripped.
    pub fn register_class(&mut self, class: &str, stubs: StubMap) {
        let class = class.trim_start_matches("::");
        debug!(class, methods = stubs.len(), "Registering class stubs");
        self.class_map
            .entry(class.to_string())
            .or_default()
            .extend(stubs);
    }

    /// Merge `stubs` into the entry for one instance, same semantics as
    /// [`register_class`](Self::register_class).
    pub fn register_object(&mut self, id: InstanceId, stubs: StubMap) {
        debug!(instance = %id, methods = stubs.len(), "Registering object stubs");
        self.object_map.entry(id).or_default().extend(stubs);
    }

    /// Overwrite the replacement registered for a free function.
    pub fn register_func(&mut self, name: &str, replacement: Replacement) {
        debug!(function = name, "Registering function stub");
        self.func_map.insert(name.to_string(), replacement);
    }

    pub fn class_stub(&self, class: &str, method: &str) -> Option<&Replacement> {
        self.class_map.get(class)?.get(method)
    }

    pub fn object_stub(&self, id: InstanceId, method: &str) -> Option<&Replacement> {
        self.object_map.get(&id)?.get(method)
    }

    pub fn func_stub(&self, name: &str) -> Option<&Replacement> {
        self.func_map.get(name)
    }

    /// Wipe all three tables.
    pub fn clean_all(&mut self) {
        debug!("Cleaning all stub tables");
        self.class_map.clear();
        self.object_map.clear();
        self.func_map.clear();
    }

    /// Remove one class's stubs. Other classes, object-level stubs and
    /// function stubs are untouched.
    pub fn clean_class(&mut self, class: &str) {
        debug!(class, "Cleaning class stubs");
        self.class_map.remove(class);
    }

    /// Remove one instance's stubs. Class-level stubs are untouched.
    pub fn clean_object(&mut self, id: InstanceId) {
        debug!(instance = %id, "Cleaning object stubs");
        self.object_map.remove(&id);
    }
}
