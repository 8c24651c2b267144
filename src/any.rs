use alloc::{rc::Rc, string::String};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub(crate) fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// The path-stripped tail of the type name, for compact diagnostics.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// Capability key: the identity of a requested type plus its binding name.
/// The empty name addresses "the" binding of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceKey {
    pub type_info: TypeInfo,
    pub name: String,
}

impl ServiceKey {
    #[inline]
    #[must_use]
    pub(crate) fn of<T>(name: impl Into<String>) -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            type_info: TypeInfo::of::<T>(),
            name: name.into(),
        }
    }
}

/// A shared instance with its capability type erased. The inner value is
/// always an `Rc<T>`, which keeps unsized capabilities (trait objects)
/// representable behind `dyn Any`.
pub(crate) type ErasedRc = Rc<dyn Any>;

#[inline]
#[must_use]
pub(crate) fn erase<T>(value: Rc<T>) -> ErasedRc
where
    T: ?Sized + 'static,
{
    Rc::new(value)
}

#[inline]
#[must_use]
pub(crate) fn recover<T>(erased: &ErasedRc) -> Option<Rc<T>>
where
    T: ?Sized + 'static,
{
    erased.downcast_ref::<Rc<T>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::{erase, recover, ServiceKey, TypeInfo};
    use alloc::rc::Rc;

    trait Greeter {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(ServiceKey::of::<u32>(""), ServiceKey::of::<u32>(""));
        assert_ne!(ServiceKey::of::<u32>(""), ServiceKey::of::<u32>("named"));
        assert_ne!(ServiceKey::of::<u32>(""), ServiceKey::of::<i32>(""));
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<English>().short_name(), "English");
    }

    #[test]
    fn test_erase_recover_sized() {
        let erased = erase(Rc::new(7u32));
        assert_eq!(*recover::<u32>(&erased).unwrap(), 7);
        assert!(recover::<i32>(&erased).is_none());
    }

    #[test]
    fn test_erase_recover_trait_object() {
        let greeter: Rc<dyn Greeter> = Rc::new(English);
        let erased = erase(greeter);
        assert_eq!(recover::<dyn Greeter>(&erased).unwrap().greet(), "hello");
    }
}
