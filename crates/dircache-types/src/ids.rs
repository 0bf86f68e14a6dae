//! Identifiers assigned by the directory server

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Numeric id of an object type ("base") on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub i16);

impl TypeId {
    pub const fn new(id: i16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i16 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i16> for TypeId {
    fn from(id: i16) -> Self {
        Self(id)
    }
}

impl FromStr for TypeId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i16>()
            .map(TypeId)
            .map_err(|_| ParseIdError::InvalidType(s.to_string()))
    }
}

/// Identifier of one object on the server
///
/// Composite of the object's type id and its instance number within that
/// type. The text form is `"<type>:<num>"`, e.g. `"3:1042"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId {
    type_id: TypeId,
    num: u32,
}

impl ObjectId {
    pub const fn new(type_id: TypeId, num: u32) -> Self {
        Self { type_id, num }
    }

    /// Type the object belongs to
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Instance number within the type
    pub const fn num(&self) -> u32 {
        self.num
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_id, self.num)
    }
}

impl FromStr for ObjectId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, num_part) = s
            .split_once(':')
            .ok_or_else(|| ParseIdError::MissingSeparator(s.to_string()))?;

        let type_id = type_part.parse::<TypeId>()?;
        let num = num_part
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseIdError::InvalidNumber(s.to_string()))?;

        Ok(Self::new(type_id, num))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_string()
    }
}

/// Failure to parse an id from its text form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("object id '{0}' is missing the ':' separator")]
    MissingSeparator(String),

    #[error("invalid type id in '{0}'")]
    InvalidType(String),

    #[error("invalid object number in '{0}'")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_text_form() {
        let id = ObjectId::new(TypeId(3), 1042);
        assert_eq!(id.to_string(), "3:1042");
        assert_eq!("3:1042".parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_object_id_parse_errors() {
        assert!(matches!(
            "31042".parse::<ObjectId>(),
            Err(ParseIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "x:12".parse::<ObjectId>(),
            Err(ParseIdError::InvalidType(_))
        ));
        assert!(matches!(
            "3:-1".parse::<ObjectId>(),
            Err(ParseIdError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_object_id_serializes_as_string() {
        let id = ObjectId::new(TypeId(-2), 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"-2:7\"");

        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.type_id(), TypeId(-2));
    }
}
