use crate::{errors::BindErrorKind, locator::Locator};

/// A configuration unit. Its entry point is invoked exactly once,
/// synchronously, with bind access scoped to the hosting locator; the
/// access must not be retained past the call (the borrow enforces that
/// for the reference itself; do not stash a clone of the locator).
pub trait Module {
    /// Registers this module's bindings against `locator`.
    ///
    /// # Errors
    /// Typically a [`BindErrorKind::DuplicateBinding`] propagated with `?`.
    fn load(&mut self, locator: &Locator) -> Result<(), BindErrorKind>;
}

/// Module-loading clause: `locator.modules().add::<A>()?.add::<B>()?`.
#[must_use]
pub struct Modules<'a> {
    locator: &'a Locator,
}

impl<'a> Modules<'a> {
    #[inline]
    pub(crate) fn new(locator: &'a Locator) -> Self {
        Self { locator }
    }

    /// Constructs a module via [`Default`] and loads it.
    ///
    /// # Errors
    /// Whatever the module's `load` reports.
    pub fn add<M: Module + Default>(self) -> Result<Self, BindErrorKind> {
        self.add_instance(M::default())
    }

    /// Loads an already-constructed module instance.
    ///
    /// # Errors
    /// Whatever the module's `load` reports.
    pub fn add_instance<M: Module>(self, mut module: M) -> Result<Self, BindErrorKind> {
        module.load(self.locator)?;
        Ok(self)
    }
}
