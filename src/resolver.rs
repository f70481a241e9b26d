use crate::call::{CallReceiver, Dispatch, InstanceRef, MethodCall, TypeResolver};
use crate::identity::InstanceId;
use crate::registry::{Replacement, StubRegistry};
use serde_json::Value;
use tracing::{debug, trace};

/// Which stub table satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Stub registered on the receiving instance itself.
    Object,
    /// Stub registered on the receiver's runtime class.
    Class,
    /// Stub registered on the canonical declaring class, reached after
    /// unwrapping the proxy-generated declaring-type handle.
    Inherited,
}

/// Outcome of walking the stub tables for one call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub replacement: Replacement,
    pub scope: Scope,
    /// Resolved through the method-missing channel: the leading method-name
    /// argument is stripped before the replacement runs.
    pub magic: bool,
}

/// Walks the fixed priority chain over the registry for one intercepted
/// call. A miss at every stage is not an error; the caller delegates to the
/// real implementation.
pub struct Resolver<'a> {
    registry: &'a StubRegistry,
    types: &'a dyn TypeResolver,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a StubRegistry, types: &'a dyn TypeResolver) -> Self {
        Self { registry, types }
    }

    /// Find the applicable replacement for `call`, if any. `instance` is the
    /// receiver's identity token when the receiver is an object.
    pub fn resolve(&self, call: &MethodCall, instance: Option<InstanceId>) -> Option<Resolution> {
        let resolution = match &call.receiver {
            CallReceiver::Instance(obj) => self.resolve_instance(call, obj, instance),
            CallReceiver::Class(class) => self.resolve_static(call, class),
        };
        match &resolution {
            Some(found) => debug!(
                class = call.receiver.class(),
                method = call.method.name.as_str(),
                scope = ?found.scope,
                magic = found.magic,
                "Stub resolved"
            ),
            None => trace!(
                class = call.receiver.class(),
                method = call.method.name.as_str(),
                "No stub, delegating to real implementation"
            ),
        }
        resolution
    }

    fn resolve_instance(
        &self,
        call: &MethodCall,
        obj: &InstanceRef,
        instance: Option<InstanceId>,
    ) -> Option<Resolution> {
        if let Some(found) = self.instance_chain(call, obj, instance, &call.method.name) {
            return Some(found);
        }
        // Dynamic-dispatch fallback: the hook call carries the intended
        // method name as its first argument.
        if call.method.dispatch == Dispatch::Fallback {
            let intended = leading_name(&call.args)?;
            if let Some(found) = self.instance_chain(call, obj, instance, intended) {
                return Some(Resolution {
                    magic: true,
                    ..found
                });
            }
        }
        None
    }

    /// Object stub, then runtime-class stub, then the stub of the canonical
    /// declaring class.
    fn instance_chain(
        &self,
        call: &MethodCall,
        obj: &InstanceRef,
        instance: Option<InstanceId>,
        method: &str,
    ) -> Option<Resolution> {
        if let Some(id) = instance {
            if let Some(replacement) = self.registry.object_stub(id, method) {
                return Some(direct(replacement, Scope::Object));
            }
        }
        if let Some(replacement) = self.registry.class_stub(obj.class(), method) {
            return Some(direct(replacement, Scope::Class));
        }
        let declaring = self
            .types
            .resolve_declaring_type(&call.method.declaring_type);
        if let Some(replacement) = self.registry.class_stub(&declaring, method) {
            return Some(direct(replacement, Scope::Inherited));
        }
        None
    }

    fn resolve_static(&self, call: &MethodCall, class: &str) -> Option<Resolution> {
        if let Some(replacement) = self.registry.class_stub(class, &call.method.name) {
            return Some(direct(replacement, Scope::Class));
        }
        if call.method.dispatch == Dispatch::Fallback {
            let intended = leading_name(&call.args)?;
            if let Some(replacement) = self.registry.class_stub(class, intended) {
                return Some(magic(replacement, Scope::Class));
            }
            let declaring = self
                .types
                .resolve_declaring_type(&call.method.declaring_type);
            if let Some(replacement) = self.registry.class_stub(&declaring, intended) {
                return Some(magic(replacement, Scope::Inherited));
            }
        }
        None
    }
}

fn direct(replacement: &Replacement, scope: Scope) -> Resolution {
    Resolution {
        replacement: replacement.clone(),
        scope,
        magic: false,
    }
}

fn magic(replacement: &Replacement, scope: Scope) -> Resolution {
    Resolution {
        replacement: replacement.clone(),
        scope,
        magic: true,
    }
}

fn leading_name(args: &[Value]) -> Option<&str> {
    args.first()?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{MethodDescriptor, RawTypeResolver, TypeHandle};
    use crate::identity::IdentityMap;
    use crate::registry::StubMap;
    use serde_json::json;
    use std::any::Any;
    use std::rc::Rc;

    struct Greeter;

    /// Resolver used by a weaving layer that suffixes generated subclasses.
    struct StripWoven;

    impl TypeResolver for StripWoven {
        fn resolve_declaring_type(&self, handle: &TypeHandle) -> String {
            handle.raw().trim_end_matches("__woven").to_string()
        }
    }

    fn stub(value: &str) -> Replacement {
        Replacement::literal(value)
    }

    fn one(method: &str, value: &str) -> StubMap {
        StubMap::from([(method.to_string(), stub(value))])
    }

    fn literal_value(resolution: &Resolution) -> Value {
        match &resolution.replacement {
            Replacement::Literal(value) => value.clone(),
            Replacement::Callable(_) => panic!("expected literal"),
        }
    }

    fn instance_call(obj: &Rc<Greeter>, method: &str, args: Vec<Value>) -> MethodCall {
        MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(obj, "Greeter")),
            MethodDescriptor::new(method, TypeHandle::new("Greeter")),
            args,
        )
    }

    #[test]
    fn object_stub_wins_over_class_stub() {
        let mut identity = IdentityMap::new();
        let obj = Rc::new(Greeter);
        let id = identity.token_for(&(obj.clone() as Rc<dyn Any>));

        let mut registry = StubRegistry::new();
        registry.register_class("Greeter", one("hello", "class"));
        registry.register_object(id, one("hello", "object"));

        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let call = instance_call(&obj, "hello", vec![]);
        let found = resolver.resolve(&call, Some(id)).unwrap();
        assert_eq!(found.scope, Scope::Object);
        assert!(!found.magic);
        assert_eq!(literal_value(&found), json!("object"));
    }

    #[test]
    fn class_stub_applies_without_object_stub() {
        let mut registry = StubRegistry::new();
        registry.register_class("Greeter", one("hello", "class"));

        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let obj = Rc::new(Greeter);
        let call = instance_call(&obj, "hello", vec![]);
        let found = resolver.resolve(&call, None).unwrap();
        assert_eq!(found.scope, Scope::Class);
    }

    #[test]
    fn inherited_stub_resolves_through_declaring_type() {
        let mut registry = StubRegistry::new();
        registry.register_class("Parent", one("hello", "inherited"));

        let resolver = Resolver::new(&registry, &StripWoven);
        let obj = Rc::new(Greeter);
        // Runtime class Greeter has no stub; the declaring-type handle
        // unwraps to Parent, which does.
        let call = MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(&obj, "Greeter")),
            MethodDescriptor::new("hello", TypeHandle::new("Parent__woven")),
            vec![],
        );
        let found = resolver.resolve(&call, None).unwrap();
        assert_eq!(found.scope, Scope::Inherited);
        assert_eq!(literal_value(&found), json!("inherited"));
    }

    #[test]
    fn fallback_retries_under_intended_name_and_marks_magic() {
        let mut registry = StubRegistry::new();
        registry.register_class("Greeter", one("hello", "hi"));

        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let obj = Rc::new(Greeter);
        let call = MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(&obj, "Greeter")),
            MethodDescriptor::new("call_missing", TypeHandle::new("Greeter")).fallback(),
            vec![json!("hello"), json!("a")],
        );
        let found = resolver.resolve(&call, None).unwrap();
        assert_eq!(found.scope, Scope::Class);
        assert!(found.magic);
    }

    #[test]
    fn fallback_requires_a_string_leading_argument() {
        let mut registry = StubRegistry::new();
        registry.register_class("Greeter", one("hello", "hi"));

        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let obj = Rc::new(Greeter);
        let no_args = MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(&obj, "Greeter")),
            MethodDescriptor::new("call_missing", TypeHandle::new("Greeter")).fallback(),
            vec![],
        );
        assert!(resolver.resolve(&no_args, None).is_none());

        let numeric = MethodCall::new(
            CallReceiver::Instance(InstanceRef::new(&obj, "Greeter")),
            MethodDescriptor::new("call_missing", TypeHandle::new("Greeter")).fallback(),
            vec![json!(7)],
        );
        assert!(resolver.resolve(&numeric, None).is_none());
    }

    #[test]
    fn static_chain_checks_class_then_fallback() {
        let mut registry = StubRegistry::new();
        registry.register_class("Clock", one("now", "noon"));

        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let plain = MethodCall::new(
            CallReceiver::Class("Clock".to_string()),
            MethodDescriptor::static_method("now", TypeHandle::new("Clock")),
            vec![],
        );
        assert_eq!(resolver.resolve(&plain, None).unwrap().scope, Scope::Class);

        let hook = MethodCall::new(
            CallReceiver::Class("Clock".to_string()),
            MethodDescriptor::static_method("static_missing", TypeHandle::new("Clock")).fallback(),
            vec![json!("now")],
        );
        let found = resolver.resolve(&hook, None).unwrap();
        assert!(found.magic);
    }

    #[test]
    fn static_fallback_reaches_inherited_class() {
        let mut registry = StubRegistry::new();
        registry.register_class("Parent", one("now", "noon"));

        let resolver = Resolver::new(&registry, &StripWoven);
        let call = MethodCall::new(
            CallReceiver::Class("Clock".to_string()),
            MethodDescriptor::static_method("static_missing", TypeHandle::new("Parent__woven"))
                .fallback(),
            vec![json!("now")],
        );
        let found = resolver.resolve(&call, None).unwrap();
        assert_eq!(found.scope, Scope::Inherited);
        assert!(found.magic);
    }

    #[test]
    fn miss_everywhere_yields_none() {
        let registry = StubRegistry::new();
        let resolver = Resolver::new(&registry, &RawTypeResolver);
        let obj = Rc::new(Greeter);
        let call = instance_call(&obj, "unknown", vec![]);
        assert!(resolver.resolve(&call, None).is_none());
    }
}
