use crate::inventory::KitchenLocation;

/// One parsed line of session input, typed per command.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Noop,
    Scan {
        location: KitchenLocation,
        photo: Option<String>,
    },
    Add {
        location: KitchenLocation,
        items: Vec<String>,
    },
    Remove {
        location: KitchenLocation,
        item: String,
    },
    Clear {
        location: KitchenLocation,
    },
    ShowInventory,
    ToggleRestriction {
        name: String,
    },
    SetAges {
        ages: Vec<u32>,
    },
    Plan,
    Lunchbox,
    ShowRecipes {
        lunchbox: bool,
    },
    Cook {
        index: usize,
        lunchbox: bool,
    },
    NextStep,
    PreviousStep,
    JumpToStep {
        step: usize,
    },
    Say,
    Done,
    Need {
        item: String,
    },
    Bought {
        item: String,
    },
    ShowList,
    Help,
    Quit,
    Freeform {
        text: String,
    },
    Unknown {
        command: String,
    },
    Invalid {
        command: String,
        reason: String,
    },
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> SessionCommand {
    SessionCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn parse_location(command: &str, raw: Option<&String>) -> Result<KitchenLocation, SessionCommand> {
    match raw {
        Some(value) => KitchenLocation::parse(value)
            .ok_or_else(|| invalid(command, format!("unknown location '{value}'"))),
        None => Err(invalid(command, "expected a location (fridge|pantry|freezer)")),
    }
}

/// Parse one line of session input. Slash commands are split with
/// shell-words so quoted paths survive; everything else is `Freeform`.
pub fn parse_command(text: &str) -> SessionCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return SessionCommand::Freeform {
            text: trimmed.to_string(),
        };
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::Freeform {
            text: trimmed.to_string(),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let args = split_args(&slash_tail[command_len..]);

    match command.as_str() {
        "scan" => {
            let location = match parse_location(&command, args.first()) {
                Ok(location) => location,
                Err(err) => return err,
            };
            SessionCommand::Scan {
                location,
                photo: args.get(1).cloned(),
            }
        }
        "add" => {
            let location = match parse_location(&command, args.first()) {
                Ok(location) => location,
                Err(err) => return err,
            };
            let items: Vec<String> = args[1..].to_vec();
            if items.is_empty() {
                return invalid(&command, "expected at least one item");
            }
            SessionCommand::Add { location, items }
        }
        "remove" => {
            let location = match parse_location(&command, args.first()) {
                Ok(location) => location,
                Err(err) => return err,
            };
            if args.len() < 2 {
                return invalid(&command, "expected an item name");
            }
            SessionCommand::Remove {
                location,
                item: args[1..].join(" "),
            }
        }
        "clear" => match parse_location(&command, args.first()) {
            Ok(location) => SessionCommand::Clear { location },
            Err(err) => err,
        },
        "inventory" => SessionCommand::ShowInventory,
        "restrict" => match args.first() {
            Some(name) => SessionCommand::ToggleRestriction { name: name.clone() },
            None => invalid(&command, "expected a restriction name"),
        },
        "ages" => {
            let mut ages = Vec::new();
            for arg in &args {
                match arg.parse::<u32>() {
                    Ok(age) if age > 0 => ages.push(age),
                    _ => return invalid(&command, format!("'{arg}' is not a valid age")),
                }
            }
            SessionCommand::SetAges { ages }
        }
        "plan" => SessionCommand::Plan,
        "lunchbox" => SessionCommand::Lunchbox,
        "recipes" => SessionCommand::ShowRecipes { lunchbox: false },
        "lunch" => SessionCommand::ShowRecipes { lunchbox: true },
        "cook" => {
            let (lunchbox, number) = match args.first().map(String::as_str) {
                Some("lunch") => (true, args.get(1)),
                _ => (false, args.first()),
            };
            match number.and_then(|value| value.parse::<usize>().ok()) {
                Some(number) if number > 0 => SessionCommand::Cook {
                    index: number - 1,
                    lunchbox,
                },
                _ => invalid(&command, "expected a recipe number starting at 1"),
            }
        }
        "next" => SessionCommand::NextStep,
        "prev" => SessionCommand::PreviousStep,
        "step" => match args.first().and_then(|value| value.parse::<usize>().ok()) {
            Some(number) if number > 0 => SessionCommand::JumpToStep { step: number - 1 },
            _ => invalid(&command, "expected a step number starting at 1"),
        },
        "say" => SessionCommand::Say,
        "done" => SessionCommand::Done,
        "need" => match args.is_empty() {
            true => invalid(&command, "expected an item name"),
            false => SessionCommand::Need {
                item: args.join(" "),
            },
        },
        "bought" => match args.is_empty() {
            true => invalid(&command, "expected an item name"),
            false => SessionCommand::Bought {
                item: args.join(" "),
            },
        },
        "list" => SessionCommand::ShowList,
        "help" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        _ => SessionCommand::Unknown { command },
    }
}
