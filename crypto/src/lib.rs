//! Agora Cryptography Module
//! 
//! Caller identities for the ballot engine:
//! - Ed25519 key pairs
//! - BLAKE3 address derivation and digests

pub mod keys;
pub mod hashing;

pub use keys::*;
pub use hashing::*;
