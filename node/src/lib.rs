//! Agora Node Implementation
//! 
//! Hosts one ballot engine and serves it:
//! - Runtime wiring the engine to its event observer
//! - HTTP API forwarding caller-identified commands

mod api;
mod node;
mod runtime;

pub use api::*;
pub use node::*;
pub use runtime::*;
