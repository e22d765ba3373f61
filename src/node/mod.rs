//! Node module - Genesis, chain engine and the shared node handle

mod engine;
mod events;
mod genesis;
mod handle;

pub use engine::*;
pub use events::*;
pub use genesis::*;
pub use handle::*;
