//! Builtin validators for modelgraph field definitions.

pub mod validator;

pub use validator::{MaxLength, MinLength, NotEmpty, OneOf, Range};
