//! Arbor Core Library
//!
//! Core types for the Arbor observable state tree: the persistent [`Node`]
//! tree, dotted [`Path`] addressing, errors and configuration.

pub mod config;
pub mod error;
pub mod node;
pub mod path;

pub use config::*;
pub use error::*;
pub use node::*;
pub use path::*;
