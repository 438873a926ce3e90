//! Integration tests for the infinite-hd build pipeline

mod build_pipeline;
mod chunk_store;
mod config_loading;
mod library_import;
mod tree_merge;
