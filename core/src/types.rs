//! Payloads exchanged with the recipe backend.
//!
//! # Design
//! These mirror the backend's serializers but are defined independently of
//! the mock-server crate; the integration tests catch schema drift. Server
//! payloads arrive inside an envelope's `data` field and are read with
//! `ApiResponse::data_as`.

use serde::{Deserialize, Serialize};

/// Body of a signup request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub email: String,
    pub password: String,
}

/// Body of a recipe creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Equipment {
    pub id: u64,
    pub description: String,
}

/// Body of a request associating equipment with a recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEquipment {
    pub description: String,
}

/// A recipe as returned by the backend. Only `id` and `title` are always
/// present; the rest default when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub servings: Option<f64>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
}

/// `data` of the autocomplete search routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Matches {
    pub matches: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_tolerates_missing_optional_fields() {
        let recipe: Recipe = serde_json::from_str(r#"{"id":1,"title":"Soup"}"#).unwrap();
        assert_eq!(recipe.title, "Soup");
        assert!(recipe.notes.is_none());
        assert!(recipe.equipment.is_empty());
    }

    #[test]
    fn recipe_rejects_missing_title() {
        let result: Result<Recipe, _> = serde_json::from_str(r#"{"id":1}"#);
        assert!(result.is_err());
    }
}
