//! P2P networking module - Chain gossip between nodes

mod broadcast;
mod peer;
mod protocol;
mod server;
mod sync;

pub use broadcast::*;
pub use peer::*;
pub use protocol::*;
pub use server::*;
pub use sync::*;
