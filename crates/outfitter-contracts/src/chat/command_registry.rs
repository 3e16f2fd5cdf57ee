#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "closet",
        action: "show_closet",
    },
    CommandSpec {
        command: "staged",
        action: "show_staged",
    },
    CommandSpec {
        command: "commit",
        action: "commit",
    },
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "tryon",
        action: "try_on",
    },
    CommandSpec {
        command: "looks",
        action: "show_looks",
    },
];

/// Commands whose whole remainder is one raw string argument.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        action: "set_style",
    },
    CommandSpec {
        command: "prompt",
        action: "set_prompt",
    },
    CommandSpec {
        command: "avatar",
        action: "set_avatar",
    },
    CommandSpec {
        command: "favorite",
        action: "toggle_favorite",
    },
    CommandSpec {
        command: "remove",
        action: "remove_item",
    },
    CommandSpec {
        command: "unstage",
        action: "unstage",
    },
    CommandSpec {
        command: "save",
        action: "save_looks",
    },
];

pub(crate) const FLAG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "suggest_new",
        action: "suggest_new_items",
    },
    CommandSpec {
        command: "shoes",
        action: "include_shoes",
    },
    CommandSpec {
        command: "accessories",
        action: "include_accessories",
    },
];

pub(crate) const MULTI_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "stage",
        action: "stage",
    },
    CommandSpec {
        command: "select",
        action: "select",
    },
    CommandSpec {
        command: "tryon_select",
        action: "tryon_select",
    },
];

pub(crate) const CATEGORY_COMMAND: CommandSpec = CommandSpec {
    command: "category",
    action: "set_category",
};

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/closet",
    "/stage",
    "/staged",
    "/category",
    "/unstage",
    "/commit",
    "/remove",
    "/select",
    "/tryon_select",
    "/style",
    "/prompt",
    "/suggest_new",
    "/shoes",
    "/accessories",
    "/avatar",
    "/generate",
    "/tryon",
    "/favorite",
    "/looks",
    "/save",
];
