mod bind;
mod resolve;

pub use bind::BindErrorKind;
pub use resolve::{BindingIssueKind, ResolveErrorKind};
