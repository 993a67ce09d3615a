//! Command implementations

pub mod ab;
pub mod completions;
pub mod funnel;
pub mod merge;
pub mod report;
pub mod utils;
