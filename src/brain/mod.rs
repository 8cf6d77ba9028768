//! Phase 2: The Brain
//!
//! Responsible for:
//! - The cyclic path type and its packed encoding
//! - Enumerating every cycle back to the start token up to a hop limit

pub mod enumerator;
pub mod path;

pub use enumerator::PathEnumerator;
pub use path::{ArbPath, Hop};
