use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use larder_contracts::chat::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use larder_contracts::events::EventWriter;
use larder_contracts::inventory::{Inventory, KitchenLocation, ShoppingList};
use larder_contracts::recipes::{DietaryRestriction, GenerationMode, Recipe};
use larder_contracts::session::CookingSession;
use larder_engine::{prepare_scan_image, KitchenEngine, ProviderConfig};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "larder", version, about = "Kitchen inventory and kid-friendly meal planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Session(SessionArgs),
    Scan(ScanArgs),
    Plan(PlanArgs),
}

#[derive(Debug, Parser)]
struct SessionArgs {
    /// Directory receiving the session's events.jsonl.
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Kids' ages, comma separated.
    #[arg(long, value_delimiter = ',')]
    ages: Vec<u32>,
    /// Dietary restrictions active from the start, repeatable.
    #[arg(long = "restrict")]
    restrictions: Vec<String>,
}

#[derive(Debug, Parser)]
struct ScanArgs {
    #[arg(long)]
    location: String,
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct PlanArgs {
    #[arg(long, value_delimiter = ',')]
    fridge: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pantry: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    freezer: Vec<String>,
    #[arg(long = "restrict")]
    restrictions: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    ages: Vec<u32>,
    #[arg(long)]
    lunchbox: bool,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("larder error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Scan(args) => run_scan(args),
        Command::Plan(args) => run_plan(args),
    }
}

fn new_engine(out_dir: &Path) -> KitchenEngine {
    let session_id = Uuid::new_v4().to_string();
    let events = EventWriter::new(out_dir.join("events.jsonl"), session_id);
    KitchenEngine::new(&ProviderConfig::from_env(), events)
}

fn parse_restrictions(raw: &[String]) -> Result<Vec<DietaryRestriction>> {
    raw.iter()
        .map(|name| {
            DietaryRestriction::parse(name)
                .with_context(|| format!("Unknown dietary restriction '{name}'"))
        })
        .collect()
}

fn run_scan(args: ScanArgs) -> Result<i32> {
    let location = KitchenLocation::parse(&args.location)
        .with_context(|| format!("Unknown location '{}'", args.location))?;
    let engine = new_engine(&args.out);

    let image = prepare_scan_image(&args.image)?;
    let mut inventory = Inventory::new();
    inventory.set_preview(location, image.clone());
    let found = engine.scan_image(location, &image);
    inventory.merge_scanned(location, found);

    println!("{}", json!(inventory.items(location)));
    Ok(0)
}

fn run_plan(args: PlanArgs) -> Result<i32> {
    let restrictions = parse_restrictions(&args.restrictions)?;
    let mut inventory = Inventory::new();
    inventory.merge_scanned(KitchenLocation::Fridge, args.fridge);
    inventory.merge_scanned(KitchenLocation::Pantry, args.pantry);
    inventory.merge_scanned(KitchenLocation::Freezer, args.freezer);

    let mode = if args.lunchbox {
        GenerationMode::Lunchbox
    } else {
        GenerationMode::Standard
    };
    let mut engine = new_engine(&args.out);
    let recipes = engine.generate_recipes(&inventory, &restrictions, &args.ages, mode);

    println!("{}", serde_json::to_string_pretty(&recipes)?);
    Ok(0)
}

/// Everything the interactive loop mutates between prompts.
struct SessionState {
    inventory: Inventory,
    shopping: ShoppingList,
    restrictions: Vec<DietaryRestriction>,
    ages: Vec<u32>,
    recipes: Vec<Recipe>,
    lunchbox_ideas: Vec<Recipe>,
    cooking: Option<(Recipe, CookingSession)>,
}

fn run_session(args: SessionArgs) -> Result<()> {
    let restrictions = parse_restrictions(&args.restrictions)?;
    let mut engine = new_engine(&args.out);
    let mut state = SessionState {
        inventory: Inventory::new(),
        shopping: ShoppingList::new(),
        restrictions,
        ages: args.ages,
        recipes: Vec::new(),
        lunchbox_ideas: Vec::new(),
        cooking: None,
    };

    println!("Larder session started. Type /help for commands.");
    if let Some(name) = engine.chat_backend_name() {
        println!("Provider: {name} (speech: {})", engine.speech_backend_name());
    } else {
        println!("No provider credentials found; scans and plans will come back empty.");
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_command(input) {
            SessionCommand::Noop => continue,
            SessionCommand::Quit => break,
            command => dispatch(command, &mut state, &mut engine),
        }
    }

    println!("Session ended.");
    Ok(())
}

fn dispatch(command: SessionCommand, state: &mut SessionState, engine: &mut KitchenEngine) {
    match command {
        SessionCommand::Scan { location, photo } => {
            // No file selected cancels silently, matching a dismissed picker.
            let Some(photo) = photo else {
                return;
            };
            let image = match prepare_scan_image(Path::new(&photo)) {
                Ok(image) => image,
                Err(err) => {
                    println!("Scan failed: {err:#}");
                    return;
                }
            };
            state.inventory.set_preview(location, image.clone());
            println!("Analyzing {location} photo...");
            let found = engine.scan_image(location, &image);
            if found.is_empty() {
                println!("No ingredients recognized. The {location} list is unchanged.");
                return;
            }
            let added = state.inventory.merge_scanned(location, found);
            println!(
                "Added {added} new item(s). {location}: {}",
                state.inventory.items(location).join(", ")
            );
        }
        SessionCommand::Add { location, items } => {
            let mut added = 0;
            for item in items {
                if state.inventory.add_item(location, item) {
                    added += 1;
                }
            }
            println!(
                "Added {added} item(s). {location}: {}",
                state.inventory.items(location).join(", ")
            );
        }
        SessionCommand::Remove { location, item } => {
            if state.inventory.remove_item(location, &item) {
                println!("Removed '{item}' from the {location}.");
            } else {
                println!("'{item}' is not in the {location}.");
            }
        }
        SessionCommand::Clear { location } => {
            state.inventory.clear(location);
            println!("Cleared the {location}.");
        }
        SessionCommand::ShowInventory => {
            for location in KitchenLocation::ALL {
                let items = state.inventory.items(location);
                if items.is_empty() {
                    println!("{location}: (empty)");
                } else {
                    println!("{location}: {}", items.join(", "));
                }
            }
        }
        SessionCommand::ToggleRestriction { name } => match DietaryRestriction::parse(&name) {
            Some(restriction) => {
                if let Some(index) = state
                    .restrictions
                    .iter()
                    .position(|current| *current == restriction)
                {
                    state.restrictions.remove(index);
                    println!("Removed restriction: {restriction}");
                } else {
                    state.restrictions.push(restriction);
                    println!("Added restriction: {restriction}");
                }
            }
            None => println!("Unknown restriction '{name}'."),
        },
        SessionCommand::SetAges { ages } => {
            state.ages = ages;
            if state.ages.is_empty() {
                println!("Ages cleared.");
            } else {
                let ages: Vec<String> = state.ages.iter().map(u32::to_string).collect();
                println!("Kids' ages set to {}.", ages.join(", "));
            }
        }
        SessionCommand::Plan => {
            generate_batch(state, engine, GenerationMode::Standard);
        }
        SessionCommand::Lunchbox => {
            generate_batch(state, engine, GenerationMode::Lunchbox);
        }
        SessionCommand::ShowRecipes { lunchbox } => {
            let batch = if lunchbox {
                &state.lunchbox_ideas
            } else {
                &state.recipes
            };
            if batch.is_empty() {
                println!(
                    "Nothing here yet. Try {}.",
                    if lunchbox { "/lunchbox" } else { "/plan" }
                );
            } else {
                print_batch(batch);
            }
        }
        SessionCommand::Cook { index, lunchbox } => {
            let batch = if lunchbox {
                &state.lunchbox_ideas
            } else {
                &state.recipes
            };
            let Some(recipe) = batch.get(index) else {
                println!("No recipe number {} in that batch.", index + 1);
                return;
            };
            match CookingSession::new(recipe) {
                Some(session) => {
                    println!("Cooking: {}", recipe.title);
                    print_current_step(&session);
                    state.cooking = Some((recipe.clone(), session));
                }
                None => println!("'{}' has no steps to cook through.", recipe.title),
            }
        }
        SessionCommand::NextStep => with_session(state, |_, session| {
            session.next();
            print_current_step(session);
        }),
        SessionCommand::PreviousStep => with_session(state, |_, session| {
            session.previous();
            print_current_step(session);
        }),
        SessionCommand::JumpToStep { step } => with_session(state, |_, session| {
            if session.jump_to(step) {
                print_current_step(session);
            } else {
                println!("Step {} is out of range.", step + 1);
            }
        }),
        SessionCommand::Say => {
            let Some((_, session)) = state.cooking.as_mut() else {
                println!("Not cooking anything. /cook <n> first.");
                return;
            };
            if !session.begin_narration() {
                println!("Already narrating this step.");
                return;
            }
            let step = session.current_step().to_string();
            engine.speak_step(&step);
            session.end_narration();
        }
        SessionCommand::Done => {
            if let Some((recipe, _)) = state.cooking.take() {
                println!("Done with {}. Nice work.", recipe.title);
            } else {
                println!("Not cooking anything.");
            }
        }
        SessionCommand::Need { item } => {
            if state.shopping.add(item.clone()) {
                println!("'{item}' is on the shopping list.");
            } else {
                println!("'{item}' is already on the list.");
            }
        }
        SessionCommand::Bought { item } => {
            if state.shopping.remove(&item) {
                println!("Crossed off '{item}'.");
            } else {
                println!("'{item}' is not on the list.");
            }
        }
        SessionCommand::ShowList => {
            if state.shopping.is_empty() {
                println!("Shopping list is empty.");
            } else {
                for item in state.shopping.items() {
                    println!("- {item}");
                }
            }
        }
        SessionCommand::Help => {
            for spec in SESSION_HELP_COMMANDS {
                println!("{:<40} {}", spec.usage, spec.summary);
            }
        }
        SessionCommand::Freeform { .. } => {
            println!("Try a slash command. /help lists them.");
        }
        SessionCommand::Unknown { command } => {
            println!("Unknown command /{command}. /help lists the commands.");
        }
        SessionCommand::Invalid { command, reason } => {
            println!("/{command}: {reason}");
        }
        SessionCommand::Noop | SessionCommand::Quit => {}
    }
}

fn generate_batch(state: &mut SessionState, engine: &mut KitchenEngine, mode: GenerationMode) {
    if state.inventory.is_empty() {
        println!("The kitchen is empty. /scan or /add something first.");
        return;
    }
    let label = match mode {
        GenerationMode::Lunchbox => "lunchbox ideas",
        GenerationMode::Standard => "meal ideas",
    };
    println!("Thinking about {label}...");
    let recipes = engine.generate_recipes(&state.inventory, &state.restrictions, &state.ages, mode);
    if recipes.is_empty() {
        println!("No {label} this time. Check the kitchen contents and try again.");
        return;
    }
    print_batch(&recipes);
    match mode {
        GenerationMode::Lunchbox => state.lunchbox_ideas = recipes,
        GenerationMode::Standard => state.recipes = recipes,
    }
}

fn print_batch(recipes: &[Recipe]) {
    for (number, recipe) in recipes.iter().enumerate() {
        println!(
            "{}. {} [{}] ({})",
            number + 1,
            recipe.title,
            recipe.difficulty,
            recipe.prep_time
        );
        println!("   {}", recipe.kid_friendly_reason);
        let missing: Vec<&str> = recipe
            .ingredients
            .iter()
            .filter(|ingredient| !ingredient.is_available)
            .map(|ingredient| ingredient.name.as_str())
            .collect();
        if !missing.is_empty() {
            println!("   Missing: {} (/need to list them)", missing.join(", "));
        }
    }
}

fn print_current_step(session: &CookingSession) {
    println!(
        "Step {}/{}: {}",
        session.step_index() + 1,
        session.total_steps(),
        session.current_step()
    );
}

fn with_session(state: &mut SessionState, action: impl FnOnce(&Recipe, &mut CookingSession)) {
    match state.cooking.as_mut() {
        Some((recipe, session)) => action(recipe, session),
        None => println!("Not cooking anything. /cook <n> first."),
    }
}

#[cfg(test)]
mod tests {
    use larder_engine::{NoopSpeech, SequentialTokenSource};
    use serde_json::json;

    use super::*;

    fn test_engine(temp: &tempfile::TempDir) -> KitchenEngine {
        let events = EventWriter::new(temp.path().join("events.jsonl"), "test-session");
        KitchenEngine::with_backends(
            None,
            Box::new(NoopSpeech),
            events,
            Box::new(SequentialTokenSource::new()),
        )
    }

    fn empty_state() -> SessionState {
        SessionState {
            inventory: Inventory::new(),
            shopping: ShoppingList::new(),
            restrictions: Vec::new(),
            ages: Vec::new(),
            recipes: Vec::new(),
            lunchbox_ideas: Vec::new(),
            cooking: None,
        }
    }

    fn recipe_with_steps(steps: &[&str]) -> Recipe {
        serde_json::from_value(json!({
            "id": "r-1",
            "title": "Potato waffles",
            "difficulty": "Quick Win",
            "prepTime": "15 min",
            "kidFriendlyReason": "Crispy and familiar.",
            "ingredients": [],
            "steps": steps,
        }))
        .expect("recipe")
    }

    #[test]
    fn add_and_remove_commands_mutate_the_inventory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = test_engine(&temp);
        let mut state = empty_state();

        dispatch(
            parse_command("/add pantry rice \"tinned tomatoes\""),
            &mut state,
            &mut engine,
        );
        assert_eq!(
            state.inventory.items(KitchenLocation::Pantry),
            vec!["rice", "tinned tomatoes"]
        );

        dispatch(parse_command("/remove pantry rice"), &mut state, &mut engine);
        assert_eq!(
            state.inventory.items(KitchenLocation::Pantry),
            vec!["tinned tomatoes"]
        );
    }

    #[test]
    fn cooking_refuses_a_recipe_without_steps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = test_engine(&temp);
        let mut state = empty_state();
        state.recipes = vec![recipe_with_steps(&[])];

        dispatch(parse_command("/cook 1"), &mut state, &mut engine);
        assert!(state.cooking.is_none());
    }

    #[test]
    fn cook_then_done_clears_the_active_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = test_engine(&temp);
        let mut state = empty_state();
        state.recipes = vec![recipe_with_steps(&["Mix", "Bake"])];

        dispatch(parse_command("/cook 1"), &mut state, &mut engine);
        let (_, session) = state.cooking.as_ref().expect("cooking");
        assert_eq!(session.step_index(), 0);

        dispatch(parse_command("/next"), &mut state, &mut engine);
        let (_, session) = state.cooking.as_ref().expect("cooking");
        assert_eq!(session.step_index(), 1);

        dispatch(parse_command("/done"), &mut state, &mut engine);
        assert!(state.cooking.is_none());
    }

    #[test]
    fn shopping_commands_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = test_engine(&temp);
        let mut state = empty_state();

        dispatch(parse_command("/need feta"), &mut state, &mut engine);
        dispatch(parse_command("/need wraps"), &mut state, &mut engine);
        assert_eq!(
            state.shopping.items().collect::<Vec<_>>(),
            vec!["feta", "wraps"]
        );

        dispatch(parse_command("/bought feta"), &mut state, &mut engine);
        assert_eq!(state.shopping.items().collect::<Vec<_>>(), vec!["wraps"]);
    }

    #[test]
    fn restriction_toggle_adds_then_removes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = test_engine(&temp);
        let mut state = empty_state();

        dispatch(parse_command("/restrict vegan"), &mut state, &mut engine);
        assert_eq!(state.restrictions, vec![DietaryRestriction::Vegan]);

        dispatch(parse_command("/restrict Vegan"), &mut state, &mut engine);
        assert!(state.restrictions.is_empty());
    }
}
