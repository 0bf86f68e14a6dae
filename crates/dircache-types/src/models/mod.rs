//! Data models shared between the core library and the CLI

pub mod field;
pub mod handle;
pub mod message;
pub mod type_descriptor;

pub use field::{FieldDescriptor, FieldKind};
pub use handle::{ObjectHandle, ObjectQuery};
pub use message::{AsyncMessage, MessageKind};
pub use type_descriptor::TypeDescriptor;
