//! Field templates describing the fields of one object type

use crate::ids::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value kind stored in a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Boolean,
    Numeric,
    Date,
    String,
    /// Reference to another object
    Invid,
    Permissions,
    Password,
    Ip,
    Float,
    FieldOptions,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
            FieldKind::String => "string",
            FieldKind::Invid => "invid",
            FieldKind::Permissions => "permissions",
            FieldKind::Password => "password",
            FieldKind::Ip => "ip",
            FieldKind::Float => "float",
            FieldKind::FieldOptions => "field_options",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one field of an object type ("field template")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: i16,
    pub type_id: TypeId,
    pub name: String,
    pub kind: FieldKind,

    /// Multi-valued field
    #[serde(default)]
    pub array: bool,

    #[serde(default)]
    pub comment: Option<String>,

    /// Editor tab the field is shown on
    #[serde(default)]
    pub tab_name: Option<String>,

    /// Built-in fields exist on every type (owner, modification date, ...)
    #[serde(default)]
    pub built_in: bool,

    /// Target type for invid fields restricted to one type
    #[serde(default)]
    pub target_type: Option<TypeId>,
}

impl FieldDescriptor {
    pub fn new(type_id: TypeId, id: i16, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id,
            type_id,
            name: name.into(),
            kind,
            array: false,
            comment: None,
            tab_name: None,
            built_in: false,
            target_type: None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.kind == FieldKind::Invid
    }
}
