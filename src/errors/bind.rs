use alloc::string::String;

use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum BindErrorKind {
    #[error("Duplicate binding for <{type_info}> named {name:?}")]
    DuplicateBinding { type_info: TypeInfo, name: String },
}
