//! Common traits and types used across the wsgat library
//!
//! This module contains the collaborator traits the console is written
//! against: the two halves of a transport endpoint and the line source.

pub mod test_utils;
pub mod traits;

pub use traits::{LineSource, MessageSink, MessageSource, Received};
