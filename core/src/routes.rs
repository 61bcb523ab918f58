//! The closed registry of backend endpoints.
//!
//! # Design
//! Each endpoint is a `Route` variant, so asking for an endpoint the backend
//! does not expose is a compile error rather than a runtime lookup miss.
//! Adding an endpoint means adding a variant and its arm in `resolve` and
//! `name`; nothing else in the crate changes.

use std::fmt;

use url::form_urlencoded;

/// A backend endpoint, optionally carrying the data that goes into its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// GET here only to receive the CSRF cookie.
    CsrfToken,
    Signup,
    RecipeCreate,
    Recipe { id: u64 },
    UnitSearch { search_term: String },
    EquipmentSearch { search_term: String },
    EquipmentAssociate { recipe_id: u64 },
}

impl Route {
    /// Symbolic names of every registered route, in declaration order.
    pub const ALL_NAMES: [&'static str; 7] = [
        "csrfToken",
        "signup",
        "recipeCreate",
        "recipe",
        "unitSearch",
        "equipmentSearch",
        "equipmentAssociate",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Route::CsrfToken => "csrfToken",
            Route::Signup => "signup",
            Route::RecipeCreate => "recipeCreate",
            Route::Recipe { .. } => "recipe",
            Route::UnitSearch { .. } => "unitSearch",
            Route::EquipmentSearch { .. } => "equipmentSearch",
            Route::EquipmentAssociate { .. } => "equipmentAssociate",
        }
    }

    /// The origin-relative URL (path plus query) of this endpoint.
    pub fn resolve(&self) -> String {
        match self {
            Route::CsrfToken => "/api/csrf_token/".to_string(),
            Route::Signup => "/api/signup/".to_string(),
            Route::RecipeCreate => "/api/recipe/".to_string(),
            Route::Recipe { id } => format!("/api/recipe/{id}/"),
            Route::UnitSearch { search_term } => {
                format!("/api/unit_search/?search_term={}", encode(search_term))
            }
            Route::EquipmentSearch { search_term } => {
                format!("/api/equipment_search/?search_term={}", encode(search_term))
            }
            Route::EquipmentAssociate { recipe_id } => {
                format!("/api/recipe/{recipe_id}/equipment/")
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_route() -> Vec<Route> {
        vec![
            Route::CsrfToken,
            Route::Signup,
            Route::RecipeCreate,
            Route::Recipe { id: 7 },
            Route::UnitSearch {
                search_term: "cup".to_string(),
            },
            Route::EquipmentSearch {
                search_term: String::new(),
            },
            Route::EquipmentAssociate { recipe_id: 7 },
        ]
    }

    #[test]
    fn every_route_resolves_to_a_rooted_path() {
        for route in every_route() {
            let url = route.resolve();
            assert!(!url.is_empty(), "{route}");
            assert!(url.starts_with("/api/"), "{route}: {url}");
        }
    }

    #[test]
    fn names_match_registry_listing() {
        let names: Vec<&str> = every_route().iter().map(Route::name).collect();
        assert_eq!(names, Route::ALL_NAMES);
    }

    #[test]
    fn parameters_are_interpolated() {
        assert_eq!(Route::Recipe { id: 42 }.resolve(), "/api/recipe/42/");
        assert_eq!(
            Route::EquipmentAssociate { recipe_id: 3 }.resolve(),
            "/api/recipe/3/equipment/"
        );
    }

    #[test]
    fn search_terms_are_query_encoded() {
        let route = Route::UnitSearch {
            search_term: "fl oz & cups".to_string(),
        };
        assert_eq!(
            route.resolve(),
            "/api/unit_search/?search_term=fl+oz+%26+cups"
        );
    }
}
