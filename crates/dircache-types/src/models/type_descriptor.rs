//! Object type descriptors, as listed by the server at schema load

use crate::ids::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-defined object type ("base")
///
/// Fetched once per load cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: String,

    /// Field id used as the object label, if the type has one
    #[serde(default)]
    pub label_field: Option<i16>,

    /// Embedded types only exist inside a containing object
    #[serde(default)]
    pub embedded: bool,

    #[serde(default)]
    pub can_create: bool,

    #[serde(default)]
    pub can_inactivate: bool,
}

impl TypeDescriptor {
    pub fn new(id: TypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            label_field: None,
            embedded: false,
            can_create: false,
            can_inactivate: false,
        }
    }

    pub fn with_label_field(mut self, field_id: i16) -> Self {
        self.label_field = Some(field_id);
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn creatable(mut self) -> Self {
        self.can_create = true;
        self
    }

    pub fn inactivatable(mut self) -> Self {
        self.can_inactivate = true;
        self
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
