//! Core runtime for modelgraph: partially loaded model instances, entity
//! identity maps, field masks, validation, and the JSON wire form.

// public exports are one module level down
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod mask;
pub mod model;
pub mod observe;
pub mod registry;
pub mod serialize;
pub mod traverse;
pub mod validate;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::{Error, ErrorClass};

///
/// Prelude
///
/// Domain vocabulary only; errors and option structs stay in their modules.
///

pub mod prelude {
    pub use crate::{
        context::{Context, SourceId},
        mask::FieldMask,
        model::{FieldDef, FieldType, Model, ModelClass},
        registry::{Registry, TypeResolver},
        validate::Validator,
        value::{Record, Timestamp, Value},
    };
}
