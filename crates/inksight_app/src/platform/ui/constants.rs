pub const PROMPT: &str = "> ";
pub const ASSISTANT_LABEL: &str = "inksight> ";
pub const CHAT_BANNER: &str =
    "Ask anything about your scanned document. /cancel stops a reply, /quit exits.";
pub const CANCELLED_NOTE: &str = "(reply cancelled)";

pub const COMMAND_QUIT: &str = "/quit";
pub const COMMAND_CANCEL: &str = "/cancel";
