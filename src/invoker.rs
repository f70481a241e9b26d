use crate::call::{CallReceiver, InstanceRef, MethodCall};
use crate::registry::Replacement;
use crate::resolver::Resolution;
use crate::{MockError, Result};
use serde_json::Value;

/// Receiver context a replacement executes against.
///
/// Binding is explicit: non-static calls carry the intercepted instance so
/// self-references inside the replacement observe the real object; static
/// calls detach any receiver context.
#[derive(Debug, Clone, Copy)]
pub enum Bound<'a> {
    /// Non-static call: the instance the interception fired on.
    Instance(&'a InstanceRef),
    /// Static call: no receiver context.
    Detached,
}

impl<'a> Bound<'a> {
    pub fn instance(&self) -> Option<&'a InstanceRef> {
        match self {
            Bound::Instance(obj) => Some(obj),
            Bound::Detached => None,
        }
    }

    /// The bound instance, failing the call when the binding is detached.
    pub fn require_instance(&self) -> Result<&'a InstanceRef> {
        self.instance()
            .ok_or_else(|| MockError::UnboundReceiver.into())
    }
}

/// Execute a resolved replacement against the intercepted call: bind the
/// receiver, adjust the argument list for magic resolutions, apply.
pub fn invoke(resolution: &Resolution, call: &MethodCall) -> Result<Value> {
    let bound = bind_receiver(call);
    let args: &[Value] = if resolution.magic {
        call.args.get(1..).unwrap_or(&[])
    } else {
        &call.args
    };
    apply(&resolution.replacement, bound, args)
}

/// Materialize a replacement and apply it. A literal acts as a zero-argument
/// unit returning its value; a callable runs with the given binding and
/// arguments, and its errors propagate unmodified.
pub fn apply(replacement: &Replacement, bound: Bound<'_>, args: &[Value]) -> Result<Value> {
    match replacement {
        Replacement::Literal(value) => Ok(value.clone()),
        Replacement::Callable(f) => f(bound, args),
    }
}

fn bind_receiver(call: &MethodCall) -> Bound<'_> {
    if call.method.is_static {
        return Bound::Detached;
    }
    match &call.receiver {
        CallReceiver::Instance(obj) => Bound::Instance(obj),
        CallReceiver::Class(_) => Bound::Detached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{MethodDescriptor, TypeHandle};
    use crate::resolver::Scope;
    use serde_json::json;
    use std::rc::Rc;

    struct Greeter;

    fn instance_call(args: Vec<Value>) -> MethodCall {
        let obj = Rc::new(Greeter);
        MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(&obj, "Greeter")),
            MethodDescriptor::new("hello", TypeHandle::new("Greeter")),
            args,
        )
    }

    fn resolution(replacement: Replacement, magic: bool) -> Resolution {
        Resolution {
            replacement,
            scope: Scope::Class,
            magic,
        }
    }

    #[test]
    fn literal_ignores_arguments() {
        let call = instance_call(vec![json!(1), json!(2)]);
        let res = resolution(Replacement::literal("hi"), false);
        assert_eq!(invoke(&res, &call).unwrap(), json!("hi"));
    }

    #[test]
    fn callable_sees_bound_instance_and_args() {
        let call = instance_call(vec![json!("a"), json!("b")]);
        let res = resolution(
            Replacement::callable(|bound, args| {
                let receiver = bound.require_instance()?;
                assert_eq!(receiver.class(), "Greeter");
                Ok(json!(args.len()))
            }),
            false,
        );
        assert_eq!(invoke(&res, &call).unwrap(), json!(2));
    }

    #[test]
    fn magic_resolution_strips_leading_name_argument() {
        let call = instance_call(vec![json!("hello"), json!("a"), json!("b")]);
        let res = resolution(
            Replacement::callable(|_, args| Ok(json!(args.to_vec()))),
            true,
        );
        assert_eq!(invoke(&res, &call).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn static_call_detaches_receiver() {
        let call = MethodCall::new(
            CallReceiver::Class("Greeter".to_string()),
            MethodDescriptor::static_method("hello", TypeHandle::new("Greeter")),
            vec![],
        );
        let res = resolution(
            Replacement::callable(|bound, _| {
                assert!(bound.instance().is_none());
                assert!(bound.require_instance().is_err());
                Ok(json!(null))
            }),
            false,
        );
        assert_eq!(invoke(&res, &call).unwrap(), json!(null));
    }
}
