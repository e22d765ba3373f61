//! HTTP API Module
//!
//! Administrative interface for operators and scripts.

mod methods;
mod server;

pub use methods::*;
pub use server::*;
