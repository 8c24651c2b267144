#![no_std]

extern crate alloc;

pub(crate) mod any;
pub(crate) mod binding;
pub(crate) mod context;
pub(crate) mod errors;
pub(crate) mod locator;
pub(crate) mod module;
pub(crate) mod registry;
pub(crate) mod strategy;

pub use any::{ServiceKey, TypeInfo};
pub use binding::{Binder, Construct};
pub use context::Context;
pub use errors::{BindErrorKind, BindingIssueKind, ResolveErrorKind};
pub use locator::Locator;
pub use module::{Module, Modules};
