//! dircache-types - Shared data types for dircache
//!
//! This crate contains pure data structures without heavy dependencies.
//! No tokio, no async runtime - just serde-serializable types.
//!
//! Used by:
//! - dircache-core (loader, listings, cache)
//! - dircache (inspection CLI)

pub mod ids;
pub mod models;

pub use ids::{ObjectId, ParseIdError, TypeId};
pub use models::{
    AsyncMessage, FieldDescriptor, FieldKind, MessageKind, ObjectHandle, ObjectQuery,
    TypeDescriptor,
};
