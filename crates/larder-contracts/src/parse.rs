//! Lenient recovery of typed results from raw provider output. Nothing
//! here returns an error; garbage degrades to an empty result.

use serde_json::Value;

use crate::recipes::Recipe;

/// Recover a JSON array from raw response text: direct parse (a parsed
/// non-array yields empty), else the substring from the first `[` to the
/// last `]`, else empty.
pub fn recover_json_array(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => return items,
        Ok(_) => return Vec::new(),
        Err(_) => {}
    }

    let Some(start) = raw.find('[') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(']') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Ingredient names from a scan response: the recovered array's non-empty
/// strings, anything else dropped.
pub fn ingredient_names_from_response(raw: &str) -> Vec<String> {
    recover_json_array(raw)
        .into_iter()
        .filter_map(|value| match value {
            Value::String(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            _ => None,
        })
        .collect()
}

/// Outcome of validating a generation response: the records that matched
/// the recipe schema, plus how many the validator had to drop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecipes {
    pub recipes: Vec<Recipe>,
    pub rejected: usize,
}

/// Recipe records from a generation response. Elements missing required
/// fields are dropped and counted rather than propagated untyped; a
/// record with no steps still passes.
pub fn recipe_records_from_response(raw: &str) -> ParsedRecipes {
    let mut parsed = ParsedRecipes::default();
    for value in recover_json_array(raw) {
        match serde_json::from_value::<Recipe>(value) {
            Ok(recipe) => parsed.recipes.push(recipe),
            Err(_) => parsed.rejected += 1,
        }
    }
    parsed
}
