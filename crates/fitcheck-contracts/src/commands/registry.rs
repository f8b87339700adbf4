#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "upload",
    action: "upload",
}];

pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "styleboard",
    action: "styleboard",
}];

pub(crate) const OUTFIT_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "regen",
        action: "regenerate",
    },
    CommandSpec {
        command: "regenerate",
        action: "regenerate",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "find",
        action: "find_outfits",
    },
    CommandSpec {
        command: "download_all",
        action: "download_all",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <photo>",
    "/find",
    "/regen <name|#>",
    "/download <name|#>",
    "/download_all",
    "/styleboard [path]",
    "/status",
    "/reset",
    "/help",
    "/quit",
];
