use alloc::boxed::Box;

use crate::{any::ErasedRc, context::Context, errors::ResolveErrorKind};

/// A binding's get-function: given the in-flight resolution context,
/// produce a type-erased shared instance.
pub(crate) trait Strategy {
    fn call(&mut self, ctx: &Context) -> Result<ErasedRc, ResolveErrorKind>;
}

pub(crate) trait CloneStrategy: Strategy {
    #[must_use]
    fn clone_box(&self) -> Box<dyn CloneStrategy>;
}

impl<T> CloneStrategy for T
where
    T: Strategy + Clone + 'static,
{
    #[inline]
    fn clone_box(&self) -> Box<dyn CloneStrategy> {
        Box::new(self.clone())
    }
}

/// Owned, clonable strategy handle. Bindings clone the strategy out of
/// their state cell before invoking it, so the cell's lock is never held
/// across a (possibly recursive) creation call.
pub(crate) struct BoxCloneStrategy(Box<dyn CloneStrategy>);

impl Clone for BoxCloneStrategy {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl BoxCloneStrategy {
    #[inline]
    #[must_use]
    pub(crate) fn new<S: CloneStrategy + 'static>(inner: S) -> Self {
        Self(Box::new(inner))
    }

    #[inline]
    pub(crate) fn call(&mut self, ctx: &Context) -> Result<ErasedRc, ResolveErrorKind> {
        self.0.call(ctx)
    }
}

#[inline]
#[must_use]
pub(crate) const fn strategy_fn<F>(f: F) -> StrategyFn<F>
where
    F: FnMut(&Context) -> Result<ErasedRc, ResolveErrorKind>,
{
    StrategyFn { f }
}

#[derive(Clone)]
pub(crate) struct StrategyFn<F> {
    f: F,
}

impl<F> Strategy for StrategyFn<F>
where
    F: FnMut(&Context) -> Result<ErasedRc, ResolveErrorKind>,
{
    #[inline]
    fn call(&mut self, ctx: &Context) -> Result<ErasedRc, ResolveErrorKind> {
        (self.f)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::{strategy_fn, BoxCloneStrategy, Strategy as _};
    use crate::{
        any::{erase, recover},
        Locator,
    };
    use alloc::rc::Rc;

    #[test]
    fn test_strategy_fn() {
        let mut strategy = strategy_fn(|_ctx| Ok(erase(Rc::new(41u32))));

        let ctx = Locator::new().get_context().unwrap();
        let erased = strategy.call(&ctx).unwrap();

        assert_eq!(*recover::<u32>(&erased).unwrap(), 41);
    }

    #[test]
    fn test_boxed_clone() {
        let strategy = BoxCloneStrategy::new(strategy_fn(|_ctx| Ok(erase(Rc::new(7i8)))));
        let mut cloned = strategy.clone();

        let ctx = Locator::new().get_context().unwrap();
        let erased = cloned.call(&ctx).unwrap();

        assert_eq!(*recover::<i8>(&erased).unwrap(), 7);
    }
}
