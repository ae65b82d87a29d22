//! Arbor State Management
//!
//! Observable in-memory state trees. A [`Store`] keeps an immutable,
//! structurally shared [`Snapshot`] of nested data addressed by dotted
//! paths, and notifies [`Observer`]s only when the paths they watch change.
//! Transactions coalesce several mutations into one notification.

pub mod diagnostics;
pub mod observer;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use diagnostics::*;
pub use observer::*;
pub use registry::*;
pub use snapshot::*;
pub use store::*;
