//! Internal utilities.

pub mod coding;
