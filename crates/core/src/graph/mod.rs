#![forbid(unsafe_code)]

mod ancestry;
mod conflict_id;

pub use ancestry::*;
pub use conflict_id::*;
