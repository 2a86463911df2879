mod class;
mod field;
mod instance;
mod tracking;

pub(crate) mod init;

#[cfg(test)]
mod tests;

pub use class::{ClassBuildError, ClassKind, ModelClass, ModelClassBuilder};
pub use field::{FieldDef, FieldDefault, FieldType, FieldTypeError, Primitive, ScalarType};
pub use instance::{Model, SetOptions};

pub(crate) use instance::{WeakModel, collect_models};
