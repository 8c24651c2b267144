use alloc::{
    borrow::ToOwned as _,
    rc::{Rc, Weak},
    string::String,
};
use core::marker::PhantomData;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::{erase, ErasedRc, ServiceKey, TypeInfo},
    context::Context,
    errors::{BindingIssueKind, ResolveErrorKind},
    locator::Locator,
    strategy::{strategy_fn, BoxCloneStrategy},
};

/// Implemented by types the locator can build on its own. The active
/// resolution context is available for nested resolves.
pub trait Construct: Sized + 'static {
    fn construct(ctx: &Context) -> anyhow::Result<Self>;
}

/// A registered creation strategy for one capability key.
///
/// `get` is the strategy the next resolve will run; `create` is the
/// original creation function. They differ only for singletons, where the
/// first successful call rebinds `get` to a constant-return closure
/// (exactly once), and for `as_transient`, which restores `create`.
pub(crate) struct Binding {
    pub(crate) key: ServiceKey,
    state: Mutex<BindingState>,
}

#[derive(Default)]
struct BindingState {
    get: Option<BoxCloneStrategy>,
    create: Option<BoxCloneStrategy>,
}

impl Binding {
    #[inline]
    #[must_use]
    pub(crate) fn new(key: ServiceKey) -> Rc<Self> {
        Rc::new(Self {
            key,
            state: Mutex::new(BindingState::default()),
        })
    }

    /// Runs the current strategy. The state lock is released before the
    /// call so the strategy may recursively resolve through the registry.
    pub(crate) fn get(&self, ctx: &Context) -> Result<ErasedRc, ResolveErrorKind> {
        let strategy = self.state.lock().get.clone();
        let Some(mut strategy) = strategy else {
            return Err(BindingIssueKind::UnsetStrategy {
                type_info: self.key.type_info,
                name: self.key.name.clone(),
            }
            .into());
        };
        strategy.call(ctx)
    }

    fn set_create(&self, strategy: BoxCloneStrategy) {
        let mut state = self.state.lock();
        state.create = Some(strategy.clone());
        state.get = Some(strategy);
    }

    fn set_get(&self, strategy: BoxCloneStrategy) {
        self.state.lock().get = Some(strategy);
    }

    fn restore_create(&self) {
        let mut state = self.state.lock();
        state.get = state.create.clone();
    }

    fn rebind_constant(&self, value: ErasedRc) {
        self.set_get(BoxCloneStrategy::new(strategy_fn(move |_ctx| Ok(value.clone()))));
    }
}

/// Builder returned by [`Locator::bind`]; configures the freshly inserted
/// binding in place. Pick a strategy (`to*`/`alias*`), then optionally a
/// lifecycle (`as_singleton`/`as_transient`) and `eagerly`. Dropping the
/// builder is the normal end of a clause; every method mutates the
/// registered binding directly.
pub struct Binder<'a, T: ?Sized + 'static> {
    locator: &'a Locator,
    binding: Rc<Binding>,
    _capability: PhantomData<*const T>,
}

impl<'a, T: ?Sized + 'static> Binder<'a, T> {
    #[inline]
    pub(crate) fn new(locator: &'a Locator, binding: Rc<Binding>) -> Self {
        Self {
            locator,
            binding,
            _capability: PhantomData,
        }
    }

    /// Binds to a fixed instance; it is never recreated. To hand the
    /// locator an object owned elsewhere, keep a clone of the `Rc`
    /// outside so the engine never holds the last reference.
    pub fn to_instance(self, instance: Rc<T>) -> Self {
        let erased = erase(instance);
        self.binding
            .set_create(BoxCloneStrategy::new(strategy_fn(move |_ctx| Ok(erased.clone()))));
        self
    }

    /// Binds to a factory; its result is adopted. Starts transient.
    pub fn to<F>(self, factory: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<Rc<T>> + 'static,
    {
        let factory = Rc::new(factory);
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            factory(ctx).map(erase).map_err(ResolveErrorKind::from_factory)
        })));
        self
    }

    /// Binds to a different concrete type built via [`Construct`]. The
    /// coercion closure turns the concrete `Rc` into the capability `Rc`
    /// (for trait-object capabilities, `|concrete| concrete` suffices).
    pub fn to_concrete<C, F>(self, into_capability: F) -> Self
    where
        C: Construct,
        F: Fn(Rc<C>) -> Rc<T> + 'static,
    {
        let into_capability = Rc::new(into_capability);
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.set_concrete_type(TypeInfo::of::<C>())?;
            let concrete = C::construct(ctx).map_err(ResolveErrorKind::from_factory)?;
            Ok(erase(into_capability(Rc::new(concrete))))
        })));
        self
    }

    /// Like [`Self::to_concrete`], but the concrete value comes from a
    /// supplied factory instead of [`Construct`]. The concrete type is
    /// recorded on the context before the factory runs, so it shows up in
    /// diagnostics the same way `Construct`-backed bindings do.
    pub fn to_concrete_with<C, F, G>(self, factory: F, into_capability: G) -> Self
    where
        C: ?Sized + 'static,
        F: Fn(&Context) -> anyhow::Result<Rc<C>> + 'static,
        G: Fn(Rc<C>) -> Rc<T> + 'static,
    {
        let factory = Rc::new(factory);
        let into_capability = Rc::new(into_capability);
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.set_concrete_type(TypeInfo::of::<C>())?;
            let concrete = factory(ctx).map_err(ResolveErrorKind::from_factory)?;
            Ok(erase(into_capability(concrete)))
        })));
        self
    }

    /// Redirects to the binding of the same capability type under `name`.
    pub fn alias(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.resolve_named::<T>(&name).map(erase)
        })));
        self
    }

    /// Redirects to another capability type under `name`, converting its
    /// instance into this capability.
    pub fn alias_to<U, F>(self, name: impl Into<String>, convert: F) -> Self
    where
        U: ?Sized + 'static,
        F: Fn(Rc<U>) -> Rc<T> + 'static,
    {
        let name = name.into();
        let convert = Rc::new(convert);
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.resolve_named::<U>(&name).map(|instance| erase(convert(instance)))
        })));
        self
    }

    /// Redirects to another capability type under this binding's own name.
    pub fn alias_to_own_name<U, F>(self, convert: F) -> Self
    where
        U: ?Sized + 'static,
        F: Fn(Rc<U>) -> Rc<T> + 'static,
    {
        let convert = Rc::new(convert);
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            let name = ctx.name().to_owned();
            ctx.resolve_named::<U>(&name).map(|instance| erase(convert(instance)))
        })));
        self
    }

    /// Caches the first result and returns it on every later resolve. The
    /// strategy cell is rebound exactly once, on first success, from the
    /// creation function to a constant-return closure.
    pub fn as_singleton(self) -> Self {
        let weak: Weak<Binding> = Rc::downgrade(&self.binding);
        let create = self.binding.state.lock().create.clone();
        let key = self.binding.key.clone();
        self.binding
            .set_get(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
                let Some(mut create) = create.clone() else {
                    return Err(BindingIssueKind::UnsetStrategy {
                        type_info: key.type_info,
                        name: key.name.clone(),
                    }
                    .into());
                };
                let value = create.call(ctx)?;
                if let Some(binding) = weak.upgrade() {
                    binding.rebind_constant(value.clone());
                    debug!(capability = key.type_info.name, name = %key.name, "Singleton cached");
                }
                Ok(value)
            })));
        self
    }

    /// Re-runs the creation function on every resolve (the default for
    /// factory and [`Construct`] strategies).
    pub fn as_transient(self) -> Self {
        self.binding.restore_create();
        self
    }

    /// Queues this binding for proactive instantiation on the next
    /// [`Locator::get_context`] call.
    pub fn eagerly(self) {
        self.locator.queue_eager(self.binding.clone());
    }
}

impl<'a, T: Construct> Binder<'a, T> {
    /// Binds the capability to its own concrete type, constructed with
    /// access to the resolution context.
    pub fn to_self(self) -> Self {
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.set_concrete_type(TypeInfo::of::<T>())?;
            let instance = T::construct(ctx).map_err(ResolveErrorKind::from_factory)?;
            Ok(erase(Rc::new(instance)))
        })));
        self
    }
}

impl<'a, T: Default + 'static> Binder<'a, T> {
    /// Binds the capability to its own concrete type, constructed without
    /// context access.
    pub fn to_self_no_deps(self) -> Self {
        self.binding.set_create(BoxCloneStrategy::new(strategy_fn(move |ctx: &Context| {
            ctx.set_concrete_type(TypeInfo::of::<T>())?;
            Ok(erase(Rc::new(T::default())))
        })));
        self
    }
}
