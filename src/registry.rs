use alloc::{collections::BTreeMap, rc::Rc, string::String, vec::Vec};

use crate::{
    any::ServiceKey,
    binding::Binding,
    errors::BindErrorKind,
};

/// Per-capability-type binding table for one locator. Iteration order is
/// ascending binding name (ordered map, not insertion order), which
/// `resolve_all` relies on.
#[derive(Default)]
pub(crate) struct Registry {
    bindings: BTreeMap<String, Rc<Binding>>,
}

impl Registry {
    /// Inserts a fresh binding under `key.name`.
    ///
    /// # Errors
    /// Returns [`BindErrorKind::DuplicateBinding`] if the name is taken.
    pub(crate) fn bind(&mut self, key: ServiceKey) -> Result<Rc<Binding>, BindErrorKind> {
        if self.bindings.contains_key(&key.name) {
            return Err(BindErrorKind::DuplicateBinding {
                type_info: key.type_info,
                name: key.name,
            });
        }

        let name = key.name.clone();
        let binding = Binding::new(key);
        self.bindings.insert(name, binding.clone());
        Ok(binding)
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, name: &str) -> Option<Rc<Binding>> {
        self.bindings.get(name).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// All bindings in ascending name order, cloned out so no registry
    /// lock needs to be held while they run.
    #[inline]
    #[must_use]
    pub(crate) fn bindings(&self) -> Vec<Rc<Binding>> {
        self.bindings.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{any::ServiceKey, errors::BindErrorKind};
    use alloc::vec::Vec;

    struct ITest;

    #[test]
    fn test_duplicate_binding() {
        let mut registry = Registry::default();
        assert!(registry.bind(ServiceKey::of::<ITest>("")).is_ok());
        assert!(matches!(
            registry.bind(ServiceKey::of::<ITest>("")),
            Err(BindErrorKind::DuplicateBinding { .. })
        ));
        assert!(registry.bind(ServiceKey::of::<ITest>("other")).is_ok());
    }

    #[test]
    fn test_name_ascending_order() {
        let mut registry = Registry::default();
        registry.bind(ServiceKey::of::<ITest>("b")).unwrap();
        registry.bind(ServiceKey::of::<ITest>("a")).unwrap();
        registry.bind(ServiceKey::of::<ITest>("c")).unwrap();

        let names: Vec<_> = registry.bindings().iter().map(|binding| binding.key.name.clone()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
