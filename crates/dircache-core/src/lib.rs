//! dircache-core - Schema loading and object caching for a directory client
//!
//! Provides the client-side data layer for one directory server session:
//! - Loader: background schema fetch with staged completion signals
//! - ObjectListing: case-insensitively sorted, concurrently readable handle list
//! - ObjectCache: per-type listing cache
//! - ClientContext: session-scoped owner of the above plus the event bus
//! - AsyncReader: forwards server-push messages to the event bus

pub mod async_reader;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod listing;
pub mod loader;
pub mod session;
pub mod snapshot;

pub use async_reader::{AsyncReader, ReaderExit};
pub use cache::ObjectCache;
pub use config::ClientConfig;
pub use context::ClientContext;
pub use error::{CoreError, RemoteError};
pub use event::{DataEvent, EventBus};
pub use listing::{cmp_ignore_case, HandleFilter, ObjectListing};
pub use loader::{CycleState, FieldTemplates, LoadStage, Loader, UNKNOWN_TYPE_NAME};
pub use session::{AsyncPort, DirectorySession};
pub use snapshot::{DirectorySnapshot, SnapshotPort, SnapshotSession};

pub use dircache_types;
