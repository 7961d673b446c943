use crate::recipes::Recipe;

/// Walkthrough state over a recipe's ordered steps. The 0-based index
/// saturates at both ends; the narration flag is orthogonal to stepping
/// and always cleared when a narration call finishes.
#[derive(Debug, Clone)]
pub struct CookingSession {
    recipe_id: String,
    steps: Vec<String>,
    step: usize,
    narrating: bool,
}

impl CookingSession {
    /// Returns `None` for a recipe without steps.
    pub fn new(recipe: &Recipe) -> Option<Self> {
        if recipe.steps.is_empty() {
            return None;
        }
        Some(Self {
            recipe_id: recipe.id.clone(),
            steps: recipe.steps.clone(),
            step: 0,
            narrating: false,
        })
    }

    pub fn recipe_id(&self) -> &str {
        &self.recipe_id
    }

    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> &str {
        &self.steps[self.step]
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Advance one step; no-op at the last step. Returns whether it moved.
    pub fn next(&mut self) -> bool {
        if self.step + 1 < self.steps.len() {
            self.step += 1;
            true
        } else {
            false
        }
    }

    /// Step back; no-op at step 0. Returns whether it moved.
    pub fn previous(&mut self) -> bool {
        if self.step > 0 {
            self.step -= 1;
            true
        } else {
            false
        }
    }

    /// Jump directly to a step; out-of-bounds indices are ignored.
    pub fn jump_to(&mut self, step: usize) -> bool {
        if step < self.steps.len() {
            self.step = step;
            true
        } else {
            false
        }
    }

    pub fn is_narrating(&self) -> bool {
        self.narrating
    }

    /// Mark narration in progress; refuses a second concurrent narration.
    pub fn begin_narration(&mut self) -> bool {
        if self.narrating {
            return false;
        }
        self.narrating = true;
        true
    }

    pub fn end_narration(&mut self) {
        self.narrating = false;
    }
}
