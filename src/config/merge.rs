//! Config composition: defaults plus the override chain.

pub mod merge_policy;
pub mod service;
