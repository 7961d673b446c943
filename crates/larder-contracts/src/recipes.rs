use std::fmt;

use serde::{Deserialize, Serialize};

/// Effort band the generation backend assigns to a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "Quick Win")]
    QuickWin,
    #[serde(rename = "Staple")]
    Staple,
    #[serde(rename = "Weekend Project")]
    WeekendProject,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::QuickWin => "Quick Win",
            Difficulty::Staple => "Staple",
            Difficulty::WeekendProject => "Weekend Project",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of dietary restrictions the planner can be asked to avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DietaryRestriction {
    #[serde(rename = "Vegetarian")]
    Vegetarian,
    #[serde(rename = "Vegan")]
    Vegan,
    #[serde(rename = "Nut-Free")]
    NutFree,
    #[serde(rename = "Dairy-Free")]
    DairyFree,
    #[serde(rename = "Low-Sugar")]
    LowSugar,
}

impl DietaryRestriction {
    pub const ALL: [DietaryRestriction; 5] = [
        DietaryRestriction::Vegetarian,
        DietaryRestriction::Vegan,
        DietaryRestriction::NutFree,
        DietaryRestriction::DairyFree,
        DietaryRestriction::LowSugar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryRestriction::Vegetarian => "Vegetarian",
            DietaryRestriction::Vegan => "Vegan",
            DietaryRestriction::NutFree => "Nut-Free",
            DietaryRestriction::DairyFree => "Dairy-Free",
            DietaryRestriction::LowSugar => "Low-Sugar",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|restriction| restriction.as_str().to_ascii_lowercase() == normalized)
    }
}

impl fmt::Display for DietaryRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which planner flavor produced a batch of recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Standard,
    Lunchbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
}

/// A provider-supplied suggestion plus the two locally stamped fields
/// (`image`, `is_lunchbox`). Immutable after materialization; cooking
/// progress lives in [`crate::session::CookingSession`], never in `steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    pub prep_time: String,
    #[serde(default)]
    pub calories: f64,
    pub kid_friendly_reason: String,
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_lunchbox: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DietaryRestriction, Difficulty, Recipe};

    #[test]
    fn recipe_deserializes_wire_names() {
        let recipe: Recipe = serde_json::from_value(json!({
            "id": "r-1",
            "title": "Frikkadels",
            "difficulty": "Quick Win",
            "prepTime": "20 min",
            "calories": 430,
            "kidFriendlyReason": "Small meatballs are easy to grab.",
            "ingredients": [
                {"name": "beef mince", "amount": "500g", "isAvailable": true},
                {"name": "breadcrumbs", "isAvailable": false}
            ],
            "steps": ["Mix", "Roll", "Fry"],
            "dietaryTags": ["Dairy-Free"]
        }))
        .unwrap();
        assert_eq!(recipe.difficulty, Difficulty::QuickWin);
        assert_eq!(recipe.prep_time, "20 min");
        assert!(recipe.ingredients[0].is_available);
        assert!(!recipe.ingredients[1].is_available);
        assert_eq!(recipe.ingredients[1].amount, None);
        assert!(!recipe.is_lunchbox);
        assert!(recipe.image.is_empty());
    }

    #[test]
    fn recipe_serializes_stamped_fields_camel_case() {
        let mut recipe: Recipe = serde_json::from_value(json!({
            "id": "r-2",
            "title": "Hidden-veggie pasta",
            "difficulty": "Staple",
            "prepTime": "30 min",
            "kidFriendlyReason": "The sauce hides the veg.",
            "ingredients": []
        }))
        .unwrap();
        recipe.is_lunchbox = true;
        recipe.image = "https://example.test/1".to_string();

        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["isLunchbox"], json!(true));
        assert_eq!(value["prepTime"], json!("30 min"));
        assert_eq!(value["kidFriendlyReason"], json!("The sauce hides the veg."));
    }

    #[test]
    fn restriction_parse_is_case_insensitive() {
        assert_eq!(
            DietaryRestriction::parse("nut-free"),
            Some(DietaryRestriction::NutFree)
        );
        assert_eq!(
            DietaryRestriction::parse(" Vegan "),
            Some(DietaryRestriction::Vegan)
        );
        assert_eq!(DietaryRestriction::parse("keto"), None);
    }
}
