//! Various utility modules.

pub mod config;
pub mod htable;
