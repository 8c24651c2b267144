use alloc::string::String;

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Unable to resolve <{type_info}>, resolve path = {path}")]
    UnableToResolve { type_info: TypeInfo, path: String },
    #[error("Recursive resolve, resolve path = {path}")]
    RecursiveResolve { path: String },
    #[error(transparent)]
    BindingIssue(#[from] BindingIssueKind),
    #[error(transparent)]
    Factory(anyhow::Error),
}

/// Internal binding invariants. These always indicate a configuration
/// defect, so the non-throwing resolve paths still surface them.
#[derive(thiserror::Error, Debug)]
pub enum BindingIssueKind {
    #[error("Concrete type on context already set to <{existing}>")]
    ConcreteTypeAlreadySet { existing: TypeInfo },
    #[error("Binding produced an instance that is not an Rc<{expected}>")]
    IncorrectType { expected: TypeInfo },
    #[error("Binding for <{type_info}> named {name:?} has no creation strategy")]
    UnsetStrategy { type_info: TypeInfo, name: String },
    #[error("Locator dropped while a resolve was in flight")]
    LocatorDropped,
}

impl ResolveErrorKind {
    /// Unwraps a factory error back into the resolve error it carries, if
    /// any. A factory that fails by propagating a nested resolve failure
    /// (`?` on a `Context::resolve` call) must report the original kind,
    /// not a wrapped one, so cycle diagnostics survive user factories.
    #[must_use]
    pub(crate) fn from_factory(err: anyhow::Error) -> Self {
        match err.downcast::<ResolveErrorKind>() {
            Ok(inner) => inner,
            Err(err) => ResolveErrorKind::Factory(err),
        }
    }
}
