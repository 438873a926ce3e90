//! Property-based tests for codec, naming, merge and chunking guarantees

mod chunking;
mod codec;
mod merge;
mod names;
