use crate::{MockError, Result};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Opaque declaring-type handle as reported by the interception layer.
///
/// The raw name may carry proxy-generated artifacts from the weaving
/// machinery. The engine never inspects it directly; it asks the layer's
/// [`TypeResolver`] for the canonical class name instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle(String);

impl TypeHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw name carried by the handle, proxy artifacts and all.
    pub fn raw(&self) -> &str {
        &self.0
    }
}

/// Collaborator exposed by the interception layer that maps a declaring-type
/// handle to the canonical class name it stands for.
pub trait TypeResolver {
    fn resolve_declaring_type(&self, handle: &TypeHandle) -> String;
}

/// Default resolver that trusts the handle's raw name. Suitable when the
/// weaving layer does not rename the types it instruments.
#[derive(Debug, Default)]
pub struct RawTypeResolver;

impl TypeResolver for RawTypeResolver {
    fn resolve_declaring_type(&self, handle: &TypeHandle) -> String {
        handle.raw().to_string()
    }
}

/// How the runtime routed an intercepted call to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Ordinary dispatch to a method defined on the receiver's type.
    Direct,
    /// The type had no such method and the runtime routed the call through
    /// its method-missing hook. The first argument carries the intended
    /// method name; the remaining arguments are the forwarded ones.
    Fallback,
}

/// Descriptor of the intercepted method, as seen by the interception layer.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub is_static: bool,
    pub dispatch: Dispatch,
    pub declaring_type: TypeHandle,
}

impl MethodDescriptor {
    /// Descriptor for an ordinary instance method.
    pub fn new(name: impl Into<String>, declaring_type: TypeHandle) -> Self {
        Self {
            name: name.into(),
            is_static: false,
            dispatch: Dispatch::Direct,
            declaring_type,
        }
    }

    /// Descriptor for a static method.
    pub fn static_method(name: impl Into<String>, declaring_type: TypeHandle) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, declaring_type)
        }
    }

    /// Mark the call as routed through the method-missing hook.
    pub fn fallback(mut self) -> Self {
        self.dispatch = Dispatch::Fallback;
        self
    }
}

/// A live object instance handed over by the interception layer, paired with
/// its runtime class name (reflection belongs to the weaving side).
#[derive(Clone)]
pub struct InstanceRef {
    object: Rc<dyn Any>,
    class: String,
}

impl InstanceRef {
    pub fn new<T: Any>(object: &Rc<T>, class: impl Into<String>) -> Self {
        let object: Rc<dyn Any> = object.clone();
        Self {
            object,
            class: class.into(),
        }
    }

    pub fn object(&self) -> &Rc<dyn Any> {
        &self.object
    }

    /// Runtime class of the instance.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Downcast the receiver to its concrete type.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    /// Downcast the receiver, failing the call when the type does not match.
    pub fn downcast_as<T: Any>(&self) -> Result<Rc<T>> {
        self.downcast::<T>().ok_or_else(|| {
            MockError::ReceiverType {
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Receiver of an intercepted method call.
#[derive(Debug, Clone)]
pub enum CallReceiver {
    /// Call on a live instance.
    Instance(InstanceRef),
    /// Static call addressed to a class by name.
    Class(String),
}

impl CallReceiver {
    /// Class the call is attributed to: the runtime class for instance
    /// receivers, the addressed class for static calls.
    pub fn class(&self) -> &str {
        match self {
            CallReceiver::Instance(obj) => obj.class(),
            CallReceiver::Class(name) => name,
        }
    }

    pub fn instance(&self) -> Option<&InstanceRef> {
        match self {
            CallReceiver::Instance(obj) => Some(obj),
            CallReceiver::Class(_) => None,
        }
    }
}

/// Method call event delivered by the interception layer.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub receiver: CallReceiver,
    pub method: MethodDescriptor,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(receiver: CallReceiver, method: MethodDescriptor, args: Vec<Value>) -> Self {
        Self {
            receiver,
            method,
            args,
        }
    }
}
