mod len;
mod num;
mod set;

pub use len::{MaxLength, MinLength, NotEmpty};
pub use num::Range;
pub use set::OneOf;
