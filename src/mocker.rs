use crate::call::{CallReceiver, MethodCall, RawTypeResolver, TypeResolver};
use crate::identity::{IdentityMap, InstanceId};
use crate::invoker::{self, Bound};
use crate::recorder::{CallRecord, CallRecorder};
use crate::registry::{Replacement, StubMap, StubRegistry};
use crate::resolver::Resolver;
use crate::Result;
use serde_json::Value;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Front door of the engine. The interception layer delivers call events to
/// [`on_function_call`](Self::on_function_call) and
/// [`on_method_call`](Self::on_method_call); test setup code registers and
/// cleans stubs; the assertion side reads the call logs.
///
/// A `Mocker` is an owned context with empty initial state, not a process
/// singleton: independent instances share nothing, and
/// [`clean_all`](Self::clean_all) is the explicit teardown. All state sits
/// behind `RefCell`s and every interior borrow is released before a stub or
/// `proceed` runs, so replacements may re-enter the facade, recursively or
/// against unrelated targets.
pub struct Mocker {
    registry: RefCell<StubRegistry>,
    recorder: RefCell<CallRecorder>,
    identity: RefCell<IdentityMap>,
    types: Box<dyn TypeResolver>,
}

impl Mocker {
    /// Engine with the passthrough type resolver.
    pub fn new() -> Self {
        Self::with_type_resolver(Box::new(RawTypeResolver))
    }

    /// Engine wired to the weaving layer's declaring-type resolver.
    pub fn with_type_resolver(types: Box<dyn TypeResolver>) -> Self {
        Self {
            registry: RefCell::new(StubRegistry::new()),
            recorder: RefCell::new(CallRecorder::new()),
            identity: RefCell::new(IdentityMap::new()),
            types,
        }
    }

    /// Merge `stubs` into the class entry. See
    /// [`StubRegistry::register_class`].
    pub fn register_class(&self, class: &str, stubs: StubMap) {
        self.registry.borrow_mut().register_class(class, stubs);
    }

    /// Merge `stubs` into the entry for one live instance.
    pub fn register_object<T: Any>(&self, object: &Rc<T>, stubs: StubMap) {
        let object: Rc<dyn Any> = object.clone();
        let id = self.identity.borrow_mut().token_for(&object);
        self.registry.borrow_mut().register_object(id, stubs);
    }

    /// Overwrite the replacement for a free function.
    pub fn register_func(&self, name: &str, replacement: Replacement) {
        self.registry.borrow_mut().register_func(name, replacement);
    }

    /// Wipe all three stub tables. Call logs are untouched.
    pub fn clean_all(&self) {
        self.registry.borrow_mut().clean_all();
        self.identity.borrow_mut().sweep();
    }

    /// Remove one class's stubs only.
    pub fn clean_class(&self, class: &str) {
        self.registry.borrow_mut().clean_class(class);
    }

    /// Remove one instance's stubs only. Unknown instances are a no-op; no
    /// identity token is minted here.
    pub fn clean_object<T: Any>(&self, object: &Rc<T>) {
        let object: Rc<dyn Any> = object.clone();
        if let Some(id) = self.identity.borrow().lookup(&object) {
            self.registry.borrow_mut().clean_object(id);
        }
    }

    /// Identity token under which an instance's calls are logged. Mints one
    /// on first sight.
    pub fn identity_of<T: Any>(&self, object: &Rc<T>) -> InstanceId {
        let object: Rc<dyn Any> = object.clone();
        self.identity.borrow_mut().token_for(&object)
    }

    /// Ordered calls recorded against a class.
    pub fn class_calls(&self, class: &str) -> Vec<CallRecord> {
        self.recorder.borrow().class_calls(class).to_vec()
    }

    /// Ordered calls recorded against one instance.
    pub fn instance_calls<T: Any>(&self, object: &Rc<T>) -> Vec<CallRecord> {
        let id = self.identity_of(object);
        self.recorder.borrow().instance_calls(id).to_vec()
    }

    /// Ordered calls recorded against an identity token.
    pub fn instance_calls_by_id(&self, id: InstanceId) -> Vec<CallRecord> {
        self.recorder.borrow().instance_calls(id).to_vec()
    }

    /// Wipe both call logs. Log lifecycle is separate from stub cleanup.
    pub fn clear_calls(&self) {
        self.recorder.borrow_mut().clear();
    }

    /// Entry point for intercepted free-function calls.
    ///
    /// A stubbed function runs with no receiver and an empty argument list;
    /// the call-site arguments are deliberately not forwarded. Unstubbed
    /// functions delegate to `proceed`. Function calls are not recorded.
    pub fn on_function_call<F>(&self, name: &str, args: &[Value], proceed: F) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        let replacement = self.registry.borrow().func_stub(name).cloned();
        match replacement {
            Some(replacement) => {
                debug!(function = name, argc = args.len(), "Function stub hit");
                invoker::apply(&replacement, Bound::Detached, &[])
            }
            None => proceed(),
        }
    }

    /// Entry point for intercepted method calls: resolve, invoke or
    /// delegate, then record.
    ///
    /// The produced record lands in the class log, plus the instance log
    /// when the receiver is an object. An error from the stub or from
    /// `proceed` propagates unmodified and leaves no record.
    pub fn on_method_call<F>(&self, call: &MethodCall, proceed: F) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        // Mint the token up front so even unstubbed calls land in the
        // instance log.
        let instance = match &call.receiver {
            CallReceiver::Instance(obj) => {
                Some(self.identity.borrow_mut().token_for(obj.object()))
            }
            CallReceiver::Class(_) => None,
        };

        let resolution = {
            let registry = self.registry.borrow();
            Resolver::new(&registry, self.types.as_ref()).resolve(call, instance)
        };

        let result = match &resolution {
            Some(resolution) => invoker::invoke(resolution, call),
            None => proceed(),
        }?;

        self.recorder.borrow_mut().record(CallRecord {
            class: call.receiver.class().to_string(),
            instance,
            method: call.method.name.clone(),
            args: call.args.clone(),
            result: result.clone(),
        });
        Ok(result)
    }
}

impl Default for Mocker {
    fn default() -> Self {
        Self::new()
    }
}
