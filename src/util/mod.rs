//! Utility modules

pub mod hwinfo;
pub mod logging;
