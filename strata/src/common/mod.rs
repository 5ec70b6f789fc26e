//! Common types and helpers shared by the store and its extensions.

mod shared;
mod value;

pub use shared::*;
pub use value::*;
