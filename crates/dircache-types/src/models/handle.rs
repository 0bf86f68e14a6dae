//! Lightweight object handles returned by object queries

use crate::ids::{ObjectId, TypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One server-side object as seen in a listing
///
/// Carries only what selection widgets need: id, label and status flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub id: ObjectId,
    pub label: String,

    #[serde(default)]
    pub inactive: bool,

    #[serde(default = "default_editable")]
    pub editable: bool,

    /// Object has an expiration date set
    #[serde(default)]
    pub expiration_set: bool,

    /// Object has a removal date set
    #[serde(default)]
    pub removal_set: bool,
}

fn default_editable() -> bool {
    true
}

impl ObjectHandle {
    /// Active, editable handle with no pending expiry or removal
    pub fn new(id: ObjectId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            inactive: false,
            editable: true,
            expiration_set: false,
            removal_set: false,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn with_expiration(mut self) -> Self {
        self.expiration_set = true;
        self
    }

    pub fn with_removal(mut self) -> Self {
        self.removal_set = true;
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.id.type_id()
    }

    pub fn is_active(&self) -> bool {
        !self.inactive
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)?;
        if self.inactive {
            f.write_str(" [inactive]")?;
        }
        if !self.editable {
            f.write_str(" [read-only]")?;
        }
        Ok(())
    }
}

/// Object listing request for one type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectQuery {
    pub type_id: TypeId,

    /// Only return objects the session may edit
    pub editable_only: bool,
}

impl ObjectQuery {
    pub fn editable(type_id: TypeId) -> Self {
        Self {
            type_id,
            editable_only: true,
        }
    }

    pub fn all(type_id: TypeId) -> Self {
        Self {
            type_id,
            editable_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_defaults_from_json() {
        let handle: ObjectHandle =
            serde_json::from_str(r#"{"id": "3:12", "label": "alice"}"#).unwrap();

        assert_eq!(handle.id, ObjectId::new(TypeId(3), 12));
        assert!(handle.is_active());
        assert!(handle.editable);
        assert!(!handle.expiration_set);
    }

    #[test]
    fn test_handle_display_flags() {
        let handle = ObjectHandle::new(ObjectId::new(TypeId(3), 12), "alice")
            .inactive()
            .read_only();
        assert_eq!(handle.to_string(), "alice (3:12) [inactive] [read-only]");
    }
}
