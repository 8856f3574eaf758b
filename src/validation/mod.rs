//! Administrator decision sources.
//!
//! The flow treats the administrator as an opaque asynchronous producer of
//! exactly one [`AdminDecision`] per submitted answer. Deterministic
//! ([`ScriptedDecisions`]), channel-fed ([`ChannelDecisions`]) and
//! timer-simulated ([`SimulatedAdmin`]) producers are provided.

pub mod simulated;
pub mod source;
pub mod types;

#[cfg(test)]
mod tests;

pub use simulated::*;
pub use source::*;
pub use types::*;
