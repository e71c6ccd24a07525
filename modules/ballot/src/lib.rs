//! Agora Ballot Engine
//! 
//! Implements a single-organizer ballot with:
//! - Voter registration by the owner
//! - Phase-gated proposal submission and voting
//! - Deterministic tally (lowest index wins ties)
//! - Event notifications for observers

pub mod voter;
pub mod proposal;
pub mod event;
pub mod engine;
pub mod manifest;

pub use voter::*;
pub use proposal::*;
pub use event::*;
pub use engine::*;
pub use manifest::*;
