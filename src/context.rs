use alloc::{
    boxed::Box,
    rc::{Rc, Weak},
    string::String,
    vec::Vec,
};
use core::{
    any::type_name,
    fmt::Write as _,
    mem,
};

use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    any::{recover, ServiceKey, TypeInfo},
    errors::{BindingIssueKind, ResolveErrorKind},
    locator::{Locator, LocatorInner},
};

type DeferredCallback = Box<dyn FnOnce(&Context)>;

/// One in-flight resolution step. Contexts chain through `parent` to model
/// the active call stack (not the locator hierarchy); the chain is walked
/// for cycle detection and diagnostic paths. The chain's root additionally
/// owns the deferred post-resolve queue.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

pub(crate) struct ContextInner {
    parent: Option<Rc<ContextInner>>,
    /// `None` only on a synthetic root, which stands for no request.
    key: Option<ServiceKey>,
    concrete: Mutex<Option<TypeInfo>>,
    locator: Weak<LocatorInner>,
    deferred: Mutex<Vec<DeferredCallback>>,
}

impl Context {
    #[inline]
    #[must_use]
    pub(crate) fn root_for(locator: &Rc<LocatorInner>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: None,
                key: None,
                concrete: Mutex::new(None),
                locator: Rc::downgrade(locator),
                deferred: Mutex::new(Vec::new()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn child(&self, key: ServiceKey) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: Some(self.inner.clone()),
                key: Some(key),
                concrete: Mutex::new(None),
                locator: self.inner.locator.clone(),
                deferred: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Resolves "the" (unnamed) binding of a capability.
    ///
    /// # Errors
    /// See [`Self::resolve_named`].
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Rc<T>, ResolveErrorKind> {
        self.resolve_named("")
    }

    /// Resolves a named capability, failing loudly.
    ///
    /// # Errors
    /// - [`ResolveErrorKind::UnableToResolve`] if no locator up the parent
    ///   chain has a binding for the key
    /// - [`ResolveErrorKind::RecursiveResolve`] if the key is already being
    ///   resolved somewhere up the active context chain
    /// - [`ResolveErrorKind::BindingIssue`] / [`ResolveErrorKind::Factory`]
    ///   from a misconfigured binding or failing creation function
    pub fn resolve_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Rc<T>, ResolveErrorKind> {
        let span = info_span!("resolve", capability = type_name::<T>(), name);
        let _guard = span.enter();

        let result = self.resolve_step::<T>(name);
        self.finish_top_level(result.is_ok());
        result
    }

    fn resolve_step<T: ?Sized + 'static>(&self, name: &str) -> Result<Rc<T>, ResolveErrorKind> {
        let key = ServiceKey::of::<T>(name);
        let child = self.child(key.clone());
        child.check_recursive()?;

        let locator = self.locator_inner()?;
        let erased = locator.resolve_erased(&key, &child)?;
        match recover::<T>(&erased) {
            Some(instance) => Ok(instance),
            None => {
                let err = BindingIssueKind::IncorrectType {
                    expected: TypeInfo::of::<T>(),
                };
                error!("{err}");
                Err(err.into())
            }
        }
    }

    /// Like [`Self::resolve`] but "not found" yields `Ok(None)`.
    ///
    /// # Errors
    /// Cycle and binding-issue errors still propagate; they indicate a
    /// configuration defect, not an expected absence.
    pub fn try_resolve<T: ?Sized + 'static>(&self) -> Result<Option<Rc<T>>, ResolveErrorKind> {
        self.try_resolve_named("")
    }

    /// Named variant of [`Self::try_resolve`].
    #[allow(clippy::missing_errors_doc)]
    pub fn try_resolve_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Option<Rc<T>>, ResolveErrorKind> {
        let span = info_span!("try_resolve", capability = type_name::<T>(), name);
        let _guard = span.enter();

        let result = self.try_resolve_step::<T>(name);
        self.finish_top_level(result.is_ok());
        result
    }

    fn try_resolve_step<T: ?Sized + 'static>(&self, name: &str) -> Result<Option<Rc<T>>, ResolveErrorKind> {
        let key = ServiceKey::of::<T>(name);
        let child = self.child(key.clone());
        child.check_recursive()?;

        let locator = self.locator_inner()?;
        let Some(erased) = locator.try_resolve_erased(&key, &child)? else {
            debug!("Not bound");
            return Ok(None);
        };
        match recover::<T>(&erased) {
            Some(instance) => Ok(Some(instance)),
            None => {
                let err = BindingIssueKind::IncorrectType {
                    expected: TypeInfo::of::<T>(),
                };
                error!("{err}");
                Err(err.into())
            }
        }
    }

    /// Probes whether the capability could be resolved. Constructs nothing.
    #[must_use]
    pub fn can_resolve<T: ?Sized + 'static>(&self) -> bool {
        self.can_resolve_named::<T>("")
    }

    /// Named variant of [`Self::can_resolve`].
    #[must_use]
    pub fn can_resolve_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        let key = ServiceKey::of::<T>(name);
        self.inner
            .locator
            .upgrade()
            .is_some_and(|locator| locator.can_resolve_erased(&key))
    }

    /// Resolves every binding of the capability across the locator chain:
    /// the owning locator's bindings first (ascending name order), then its
    /// parent's, recursively. Aliases are not deduplicated.
    ///
    /// # Errors
    /// Any single failing binding aborts the whole visit.
    pub fn resolve_all<T: ?Sized + 'static>(&self, all: &mut Vec<Rc<T>>) -> Result<(), ResolveErrorKind> {
        let span = info_span!("resolve_all", capability = type_name::<T>());
        let _guard = span.enter();

        let result = self.resolve_all_step(all);
        self.finish_top_level(result.is_ok());
        result
    }

    fn resolve_all_step<T: ?Sized + 'static>(&self, all: &mut Vec<Rc<T>>) -> Result<(), ResolveErrorKind> {
        let type_info = TypeInfo::of::<T>();
        let mut locator = Some(self.locator_inner()?);
        while let Some(current) = locator {
            for binding in current.bindings_for(&type_info) {
                let child = self.child(binding.key.clone());
                child.check_recursive()?;

                let erased = binding.get(&child)?;
                match recover::<T>(&erased) {
                    Some(instance) => all.push(instance),
                    None => {
                        let err = BindingIssueKind::IncorrectType { expected: type_info };
                        error!("{err}");
                        return Err(err.into());
                    }
                }
            }
            locator = current.parent_inner();
        }
        Ok(())
    }

    /// Returns a callable performing a root-scoped [`Self::resolve_named`]
    /// on each invocation. The closure holds a strong locator reference,
    /// extending the locator's lifetime for as long as it is kept.
    ///
    /// # Errors
    /// [`BindingIssueKind::LocatorDropped`] if the owning locator is gone.
    pub fn provider<T: ?Sized + 'static>(
        &self,
    ) -> Result<impl Fn(&str) -> Result<Rc<T>, ResolveErrorKind>, ResolveErrorKind> {
        let locator = Locator::from_inner(self.locator_inner()?);
        Ok(move |name: &str| locator.fresh_context().resolve_named::<T>(name))
    }

    /// Non-throwing sibling of [`Self::provider`].
    #[allow(clippy::missing_errors_doc)]
    pub fn try_provider<T: ?Sized + 'static>(
        &self,
    ) -> Result<impl Fn(&str) -> Result<Option<Rc<T>>, ResolveErrorKind>, ResolveErrorKind> {
        let locator = Locator::from_inner(self.locator_inner()?);
        Ok(move |name: &str| locator.fresh_context().try_resolve_named::<T>(name))
    }

    /// Registers a callback on the resolution root's deferred queue. It
    /// runs exactly once, after the entire top-level resolve completes,
    /// with a brand-new root-scoped context. This allows two mutually
    /// dependent types to inject each other as deferred properties instead
    /// of constructor arguments.
    ///
    /// A callback that itself triggers a new top-level resolve which
    /// registers further callbacks is not supported; the ordering of such
    /// registrations is unspecified.
    pub fn after_resolve(&self, callback: impl FnOnce(&Context) + 'static) {
        let mut root = self.inner.clone();
        while let Some(parent) = root.parent.clone() {
            root = parent;
        }
        root.deferred.lock().push(Box::new(callback));
    }

    /// Human-readable trail of the context chain, outermost request first:
    /// `resolve<IFace>(name)[.to<Concrete>] -> ...`. The synthetic root is
    /// excluded. Embedded in cycle and not-found diagnostics.
    #[must_use]
    pub fn resolve_path(&self) -> String {
        let mut chain = Vec::new();
        let mut current = Some(self.inner.clone());
        while let Some(node) = current {
            current = node.parent.clone();
            chain.push(node);
        }

        let mut path = String::new();
        for node in chain.iter().rev() {
            let Some(key) = &node.key else { continue };
            if !path.is_empty() {
                path.push_str(" -> ");
            }
            let _ = write!(path, "resolve<{}>({})", key.type_info, key.name);
            if let Some(concrete) = *node.concrete.lock() {
                let _ = write!(path, ".to<{concrete}>");
            }
        }
        path
    }

    /// The binding name this context is resolving (empty on the root).
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.key.as_ref().map_or("", |key| key.name.as_str())
    }

    /// The capability type this context is resolving.
    #[must_use]
    pub fn interface_type(&self) -> Option<TypeInfo> {
        self.inner.key.as_ref().map(|key| key.type_info)
    }

    /// The concrete type, once a `to_self`/`to_concrete` strategy bound it.
    #[must_use]
    pub fn concrete_type(&self) -> Option<TypeInfo> {
        *self.inner.concrete.lock()
    }

    /// The invoking context, `None` on a resolution root.
    #[must_use]
    pub fn parent(&self) -> Option<Context> {
        self.inner.parent.clone().map(|inner| Context { inner })
    }

    /// The owning locator, if still alive. Contexts hold only a weak
    /// back-reference and never extend a locator's lifetime.
    #[must_use]
    pub fn locator(&self) -> Option<Locator> {
        self.inner.locator.upgrade().map(Locator::from_inner)
    }

    pub(crate) fn set_concrete_type(&self, concrete: TypeInfo) -> Result<(), ResolveErrorKind> {
        let mut guard = self.inner.concrete.lock();
        if let Some(existing) = *guard {
            return Err(BindingIssueKind::ConcreteTypeAlreadySet { existing }.into());
        }
        *guard = Some(concrete);
        Ok(())
    }

    /// Walks the active chain above this context; an ancestor resolving
    /// the identical capability key means the construction graph loops.
    fn check_recursive(&self) -> Result<(), ResolveErrorKind> {
        let Some(key) = &self.inner.key else {
            return Ok(());
        };

        let mut current = self.inner.parent.clone();
        while let Some(node) = current {
            if node.key.as_ref() == Some(key) {
                let err = ResolveErrorKind::RecursiveResolve {
                    path: self.resolve_path(),
                };
                error!("{err}");
                return Err(err);
            }
            current = node.parent.clone();
        }
        Ok(())
    }

    fn locator_inner(&self) -> Result<Rc<LocatorInner>, ResolveErrorKind> {
        self.inner
            .locator
            .upgrade()
            .ok_or_else(|| BindingIssueKind::LocatorDropped.into())
    }

    /// Runs (or, on failure, discards) the deferred queue. Only a chain
    /// root finishing its top-level call drains; nested steps return
    /// through here untouched.
    fn finish_top_level(&self, succeeded: bool) {
        if self.inner.parent.is_some() {
            return;
        }

        let callbacks = mem::take(&mut *self.inner.deferred.lock());
        if callbacks.is_empty() {
            return;
        }
        if !succeeded {
            debug!(count = callbacks.len(), "Discarded deferred callbacks after failed resolve");
            return;
        }
        let Some(locator) = self.inner.locator.upgrade() else {
            return;
        };

        debug!(count = callbacks.len(), "Running deferred callbacks");
        for callback in callbacks {
            let ctx = Context::root_for(&locator);
            callback(&ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{format, string::String, string::ToString as _};

    use tracing_test::traced_test;

    use crate::{
        any::TypeInfo,
        errors::{BindingIssueKind, ResolveErrorKind},
        Locator,
    };

    struct First;
    struct Second;

    #[test]
    #[traced_test]
    fn test_concrete_type_is_recorded_at_most_once() {
        let ctx = Locator::new().get_context().unwrap();
        assert!(ctx.concrete_type().is_none());

        ctx.set_concrete_type(TypeInfo::of::<First>()).unwrap();
        let err = ctx.set_concrete_type(TypeInfo::of::<Second>()).unwrap_err();
        assert!(matches!(
            err,
            ResolveErrorKind::BindingIssue(BindingIssueKind::ConcreteTypeAlreadySet { .. })
        ));
        // The binding that won stays recorded; the message names it
        assert!(err.to_string().contains("First"));
        assert_eq!(ctx.concrete_type(), Some(TypeInfo::of::<First>()));
    }
}
