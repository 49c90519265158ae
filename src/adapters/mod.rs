//! Concrete volume adapters.

pub mod json;

pub use json::JsonManifestAdapter;
