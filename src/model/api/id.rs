use std::fmt::{self, Display, Formatter};

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A record ID in its API form: a plain hex string rather than an
/// extended-JSON `$oid` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiId(ObjectId);

impl Display for ApiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl From<Id> for ApiId {
    fn from(id: Id) -> Self {
        Self(*id)
    }
}

impl From<ApiId> for Id {
    fn from(id: ApiId) -> Self {
        id.0.into()
    }
}

impl TryFrom<String> for ApiId {
    type Error = mongodb::bson::oid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ApiId> for String {
    fn from(id: ApiId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_hex_string() {
        let id = Id::new();
        let api_id = ApiId::from(id);
        let json = rocket::serde::json::serde_json::to_string(&api_id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ApiId = rocket::serde::json::serde_json::from_str(&json).unwrap();
        assert_eq!(back, api_id);
    }
}
