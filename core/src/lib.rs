//! Agora Core Library
//! 
//! Core types, errors and configuration shared by the Agora ballot engine
//! and the node that serves it.

pub mod types;
pub mod error;
pub mod config;

pub use types::*;
pub use error::*;
pub use config::*;
