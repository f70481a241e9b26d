pub mod call;
pub mod identity;
pub mod invoker;
pub mod mocker;
pub mod recorder;
pub mod registry;
pub mod resolver;

use miette::Diagnostic;

pub use call::{
    CallReceiver, Dispatch, InstanceRef, MethodCall, MethodDescriptor, RawTypeResolver, TypeHandle,
    TypeResolver,
};
pub use identity::InstanceId;
pub use invoker::Bound;
pub use mocker::Mocker;
pub use recorder::CallRecord;
pub use registry::{Replacement, StubFn, StubMap};

/// Result type alias for the engine
pub type Result<T> = miette::Result<T>;

/// Error types surfaced through stubbed calls.
///
/// The engine itself never fails a lookup: a missing stub falls through to
/// the real implementation and there is no "stub not found" error. These
/// variants come out of a replacement's own execution, via the binding
/// helpers, and propagate to the caller unmodified.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum MockError {
    #[error("replacement expected an instance receiver but the call was static")]
    #[diagnostic(
        code(mock::unbound_receiver),
        help("Register the stub on an instance or class method, or stop dereferencing the receiver inside a static replacement.")
    )]
    UnboundReceiver,

    #[error("receiver is not a {expected}")]
    #[diagnostic(
        code(mock::receiver_type),
        help("The intercepted instance has a different concrete type than the replacement assumes. Check which object the stub was registered on.")
    )]
    ReceiverType { expected: &'static str },
}
