use alloc::{collections::BTreeMap, rc::Rc, vec::Vec};
use core::mem;

use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    any::{ErasedRc, ServiceKey, TypeInfo},
    binding::{Binder, Binding},
    context::Context,
    errors::{BindErrorKind, ResolveErrorKind},
    module::Modules,
    registry::Registry,
};

/// A scope in the hierarchical container tree. Owns bindings for any
/// number of capability types and delegates unresolved lookups to its
/// parent. Child locators keep their parent alive; the parent holds no
/// references back, so a locator tree is freed leaf-first.
#[derive(Clone)]
pub struct Locator {
    inner: Rc<LocatorInner>,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new()
    }
}

impl Locator {
    /// Creates a root locator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(LocatorInner {
                registries: Mutex::new(BTreeMap::new()),
                parent: None,
                eager: Mutex::new(Vec::new()),
                root_context: Mutex::new(None),
            }),
        }
    }

    /// Creates a child locator. Children may add bindings or shadow the
    /// parent's; they can never remove or mutate them. Unresolved lookups
    /// fall through to the parent.
    #[must_use]
    pub fn enter(&self) -> Self {
        Self {
            inner: Rc::new(LocatorInner {
                registries: Mutex::new(BTreeMap::new()),
                parent: Some(self.clone()),
                eager: Mutex::new(Vec::new()),
                root_context: Mutex::new(None),
            }),
        }
    }

    /// Registers "the" (unnamed) binding for a capability type.
    ///
    /// # Errors
    /// See [`Self::bind_named`].
    pub fn bind<T: ?Sized + 'static>(&self) -> Result<Binder<'_, T>, BindErrorKind> {
        self.bind_named("")
    }

    /// Registers a named binding for a capability type and returns the
    /// builder configuring its strategy and lifecycle.
    ///
    /// # Errors
    /// [`BindErrorKind::DuplicateBinding`] if this locator already binds
    /// the identical (type, name) key. A child locator shadowing a
    /// parent's key is not a duplicate.
    pub fn bind_named<T: ?Sized + 'static>(&self, name: &str) -> Result<Binder<'_, T>, BindErrorKind> {
        let key = ServiceKey::of::<T>(name);
        let binding = {
            let mut registries = self.inner.registries.lock();
            registries.entry(key.type_info).or_default().bind(key)?
        };
        debug!(capability = binding.key.type_info.name, name = %binding.key.name, "Bound");
        Ok(Binder::new(self, binding))
    }

    /// Returns this locator's root resolution context, creating it once.
    /// Queued eager bindings are instantiated first, each with a fresh
    /// context scoped to its own capability key; the queue is drained
    /// exactly once.
    ///
    /// # Errors
    /// Propagates the first failure among the eager instantiations.
    pub fn get_context(&self) -> Result<Context, ResolveErrorKind> {
        let eager: Vec<Rc<Binding>> = mem::take(&mut *self.inner.eager.lock());
        let root = self.root_context();

        for binding in eager {
            let span = info_span!("eager", capability = binding.key.type_info.name, name = %binding.key.name);
            let _guard = span.enter();

            let child = root.child(binding.key.clone());
            if let Err(err) = binding.get(&child) {
                error!("{err}");
                return Err(err);
            }
            debug!("Eager binding instantiated");
        }

        Ok(root)
    }

    /// Entry point for loading configuration [`Module`](crate::Module)s:
    /// `locator.modules().add::<A>()?.add::<B>()?`.
    #[must_use]
    pub fn modules(&self) -> Modules<'_> {
        Modules::new(self)
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_inner(inner: Rc<LocatorInner>) -> Self {
        Self { inner }
    }

    /// A fresh root-scoped context, bypassing the cached root and the
    /// eager queue. Providers resolve through these so every invocation
    /// gets its own deferred queue.
    #[inline]
    #[must_use]
    pub(crate) fn fresh_context(&self) -> Context {
        Context::root_for(&self.inner)
    }

    pub(crate) fn queue_eager(&self, binding: Rc<Binding>) {
        self.inner.eager.lock().push(binding);
    }

    fn root_context(&self) -> Context {
        self.inner
            .root_context
            .lock()
            .get_or_insert_with(|| Context::root_for(&self.inner))
            .clone()
    }
}

pub(crate) struct LocatorInner {
    registries: Mutex<BTreeMap<TypeInfo, Registry>>,
    parent: Option<Locator>,
    eager: Mutex<Vec<Rc<Binding>>>,
    root_context: Mutex<Option<Context>>,
}

impl LocatorInner {
    /// Throwing fallback walk: own registry first, then the parent chain;
    /// a miss at the root is [`ResolveErrorKind::UnableToResolve`].
    pub(crate) fn resolve_erased(&self, key: &ServiceKey, ctx: &Context) -> Result<ErasedRc, ResolveErrorKind> {
        let binding = self.local_binding(key);
        match binding {
            Some(binding) => binding.get(ctx),
            None => match &self.parent {
                Some(parent) => parent.inner.resolve_erased(key, ctx),
                None => {
                    let err = ResolveErrorKind::UnableToResolve {
                        type_info: key.type_info,
                        path: ctx.resolve_path(),
                    };
                    error!("{err}");
                    Err(err)
                }
            },
        }
    }

    /// Same walk, but a miss at the root reports `Ok(None)`. Creation
    /// failures still propagate.
    pub(crate) fn try_resolve_erased(&self, key: &ServiceKey, ctx: &Context) -> Result<Option<ErasedRc>, ResolveErrorKind> {
        let binding = self.local_binding(key);
        match binding {
            Some(binding) => binding.get(ctx).map(Some),
            None => match &self.parent {
                Some(parent) => parent.inner.try_resolve_erased(key, ctx),
                None => Ok(None),
            },
        }
    }

    /// Pure probe along the same walk; no instantiation, no side effects.
    pub(crate) fn can_resolve_erased(&self, key: &ServiceKey) -> bool {
        let found = {
            let registries = self.registries.lock();
            registries.get(&key.type_info).map(|registry| registry.contains(&key.name))
        };
        match found {
            Some(true) => true,
            _ => self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.inner.can_resolve_erased(key)),
        }
    }

    pub(crate) fn bindings_for(&self, type_info: &TypeInfo) -> Vec<Rc<Binding>> {
        self.registries
            .lock()
            .get(type_info)
            .map(Registry::bindings)
            .unwrap_or_default()
    }

    pub(crate) fn parent_inner(&self) -> Option<Rc<LocatorInner>> {
        self.parent.as_ref().map(|parent| parent.inner.clone())
    }

    /// Clones the binding out under the registry lock; the lock is never
    /// held while a strategy runs.
    fn local_binding(&self, key: &ServiceKey) -> Option<Rc<Binding>> {
        let registries = self.registries.lock();
        registries.get(&key.type_info).and_then(|registry| registry.get(&key.name))
    }
}
