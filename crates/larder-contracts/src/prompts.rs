//! Deterministic prompt rendering: pure functions of their inputs.

use crate::inventory::{Inventory, KitchenLocation};
use crate::recipes::{DietaryRestriction, GenerationMode};

/// Instruction sent alongside a location photo.
pub fn scan_prompt(location: KitchenLocation) -> String {
    format!(
        "List all visible food ingredients in this {location}. \
         Return only a JSON array of strings. \
         Focus on items a dad could use for kids' meals. \
         Be specific but concise."
    )
}

/// Instruction for a recipe batch: full inventory, household framing, the
/// mode's culinary style, and the output schema.
pub fn plan_prompt(
    inventory: &Inventory,
    restrictions: &[DietaryRestriction],
    kid_ages: &[u32],
    mode: GenerationMode,
) -> String {
    let age_context = if kid_ages.is_empty() {
        "The meal is for kids.".to_string()
    } else {
        let ages = kid_ages
            .iter()
            .map(u32::to_string)
            .collect::<Vec<String>>()
            .join(", ");
        format!("The kids are aged: {ages} years old.")
    };

    let restriction_line = if restrictions.is_empty() {
        String::new()
    } else {
        let names = restrictions
            .iter()
            .map(|restriction| restriction.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        format!(" Avoid these: {names}.")
    };

    let culinary_style = match mode {
        GenerationMode::Lunchbox => {
            "Inspiration: Use Bento-style snacks, Indian veggie parathas, \
             South African droewors boxes, Australian hidden-veggie nuggets, \
             or UK-style quesadillas. Must be cold-safe and nut-free."
        }
        GenerationMode::Standard => {
            "Inspiration: Focus on budget-friendly staples like Cape Malay \
             style stews, frikkadels, hidden-veggie pasta, or simple potato \
             waffles."
        }
    };

    format!(
        "You are a supportive culinary coach for a busy solo dad.\n\
         {culinary_style}\n\
         \n\
         Full Kitchen Inventory:\n\
         - Fridge: {fridge}\n\
         - Pantry: {pantry}\n\
         - Freezer: {freezer}\n\
         \n\
         {age_context}{restriction_line}\n\
         \n\
         Suggest exactly 4 meal ideas. Focus on \"Quick Wins\", \"Staples\", \
         or \"Weekend Projects\". Instructions must be ultra-simple. \
         Explain why it's great for these specific ages in \
         \"kidFriendlyReason\". Include a \"Dad-Hack\" (tip for saving time \
         or money) in the description.\n\
         Return ONLY a JSON array of 4 objects, each with these fields: \
         \"id\" (string), \"title\" (string), \"description\" (string), \
         \"difficulty\" (one of \"Quick Win\", \"Staple\", \"Weekend Project\"), \
         \"prepTime\" (string), \"calories\" (number), \
         \"kidFriendlyReason\" (string), \
         \"ingredients\" (array of {{\"name\", \"amount\", \"isAvailable\"}} \
         with \"isAvailable\" judged against the inventory above), \
         \"steps\" (array of strings), \"dietaryTags\" (array of strings). \
         No prose outside the JSON.",
        fridge = inventory.items(KitchenLocation::Fridge).join(", "),
        pantry = inventory.items(KitchenLocation::Pantry).join(", "),
        freezer = inventory.items(KitchenLocation::Freezer).join(", "),
    )
}

/// The coaching wrapper narrated before a cooking step.
pub fn narration_line(step: &str) -> String {
    format!("Listen dad, here is your next step: {step}")
}
