//! Infinite HD: library volume builder
//!
//! Merges a library of software sources into classic Mac HD volume trees,
//! hands each tree to an external filesystem serializer and publishes the
//! resulting images as content-addressed chunks with JSON manifests.

pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod finder;
pub mod import;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod store;
pub mod tools;
pub mod tree;
