//! Command implementations.

pub mod build;
pub mod dev;
pub mod serve;
