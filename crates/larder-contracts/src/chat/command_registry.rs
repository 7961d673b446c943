#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    pub command: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub const SESSION_HELP_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "scan",
        usage: "/scan <fridge|pantry|freezer> <photo>",
        summary: "Analyze a photo and merge found ingredients into the location.",
    },
    CommandSpec {
        command: "add",
        usage: "/add <location> <item> [item ...]",
        summary: "Add ingredients by hand.",
    },
    CommandSpec {
        command: "remove",
        usage: "/remove <location> <item>",
        summary: "Remove one ingredient.",
    },
    CommandSpec {
        command: "clear",
        usage: "/clear <location>",
        summary: "Empty a location and drop its preview photo.",
    },
    CommandSpec {
        command: "inventory",
        usage: "/inventory",
        summary: "Show all three locations.",
    },
    CommandSpec {
        command: "restrict",
        usage: "/restrict <Vegetarian|Vegan|Nut-Free|Dairy-Free|Low-Sugar>",
        summary: "Toggle a dietary restriction.",
    },
    CommandSpec {
        command: "ages",
        usage: "/ages <n> [n ...]",
        summary: "Set the kids' ages.",
    },
    CommandSpec {
        command: "plan",
        usage: "/plan",
        summary: "Generate 4 standard meal ideas from the inventory.",
    },
    CommandSpec {
        command: "lunchbox",
        usage: "/lunchbox",
        summary: "Generate 4 cold-safe, packable lunchbox ideas.",
    },
    CommandSpec {
        command: "recipes",
        usage: "/recipes",
        summary: "Show the last standard batch.",
    },
    CommandSpec {
        command: "lunch",
        usage: "/lunch",
        summary: "Show the last lunchbox batch.",
    },
    CommandSpec {
        command: "cook",
        usage: "/cook [lunch] <n>",
        summary: "Start cooking recipe n from the standard (or lunchbox) batch.",
    },
    CommandSpec {
        command: "next",
        usage: "/next",
        summary: "Next cooking step.",
    },
    CommandSpec {
        command: "prev",
        usage: "/prev",
        summary: "Previous cooking step.",
    },
    CommandSpec {
        command: "step",
        usage: "/step <n>",
        summary: "Jump to step n.",
    },
    CommandSpec {
        command: "say",
        usage: "/say",
        summary: "Read the current step aloud.",
    },
    CommandSpec {
        command: "done",
        usage: "/done",
        summary: "Exit cooking mode.",
    },
    CommandSpec {
        command: "need",
        usage: "/need <item>",
        summary: "Put a missing ingredient on the shopping list.",
    },
    CommandSpec {
        command: "bought",
        usage: "/bought <item>",
        summary: "Take an item off the shopping list.",
    },
    CommandSpec {
        command: "list",
        usage: "/list",
        summary: "Show the shopping list.",
    },
    CommandSpec {
        command: "help",
        usage: "/help",
        summary: "Show this help.",
    },
    CommandSpec {
        command: "quit",
        usage: "/quit",
        summary: "End the session.",
    },
];
