//! ## Crate layout
//! - `base`: builtin validators.
//! - `core`: runtime model instances, identity maps, masks, validation, and
//!   the JSON wire form.
//!
//! The `prelude` module carries the vocabulary needed to declare classes and
//! work with instances.

pub use modelgraph_base as base;
pub use modelgraph_core as core;

/// re-exports
///
/// callers handling wire payloads need the same `serde_json` the core uses
pub mod __reexports {
    pub use serde_json;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use core::{Error, ErrorClass, config::Config};

///
/// Prelude
///

pub mod prelude {
    pub use crate::base::{MaxLength, MinLength, NotEmpty, OneOf, Range};
    pub use crate::core::{
        context::{Context, SourceId},
        identity::IdentifierDescriptor,
        mask::FieldMask,
        model::{FieldDef, FieldType, Model, ModelClass, SetOptions},
        observe::{ModelEvent, Subscription},
        registry::{Registry, TypeResolver},
        serialize::{DeserializeOptions, Deserialized, SerializeOptions},
        validate::Validator,
        value::{Record, Timestamp, Value},
    };
}
