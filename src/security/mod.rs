//! Admission control for listening mode

pub mod limits;

pub use limits::{ConnectionSlot, SlotGuard};
