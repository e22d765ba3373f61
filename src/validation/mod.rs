//! Validation module - transaction model and validation rules

mod transaction;
mod validator;

pub use transaction::*;
pub use validator::*;
