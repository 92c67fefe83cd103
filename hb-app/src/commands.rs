//! Chat command parser for the bot.
//!
//! A leading `/` is optional for the two-word commands (`add task`, `list
//! tasks`, `create routine`) and their underscore forms. `@botname` suffixes
//! on the keyword are ignored and keywords are case-insensitive.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Info,
    /// `None` when no task name followed the command.
    AddTask(Option<String>),
    /// `None` lists the task lists; `Some(id)` lists the tasks of one list.
    ListTasks(Option<String>),
    CreateRoutine,
    /// Free text forwarded to the instruction relay.
    Prompt(String),
    Unknown(String),
    Empty,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Info => "info",
            Self::AddTask(_) => "add_task",
            Self::ListTasks(_) => "list_tasks",
            Self::CreateRoutine => "create_routine",
            Self::Prompt(_) => "prompt",
            Self::Unknown(_) => "unknown",
            Self::Empty => "empty",
        }
    }
}

pub fn parse(input: &str) -> BotCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return BotCommand::Empty;
    }

    let (slash, body) = match trimmed.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (first, rest) = split_word(body);
    let keyword = first
        .split('@')
        .next()
        .unwrap_or(first)
        .to_ascii_lowercase();
    let (second, after_second) = split_word(rest);

    match (keyword.as_str(), second.to_ascii_lowercase().as_str()) {
        ("add", "task") => BotCommand::AddTask(argument(after_second)),
        ("add_task", _) => BotCommand::AddTask(argument(rest)),
        ("list", "tasks") => BotCommand::ListTasks(first_word(after_second)),
        ("list_tasks", _) => BotCommand::ListTasks(first_word(rest)),
        ("create", "routine") | ("create_routine", _) => BotCommand::CreateRoutine,
        ("start", _) if slash => BotCommand::Start,
        ("help", _) if slash => BotCommand::Help,
        ("info", _) if slash => BotCommand::Info,
        _ if slash => BotCommand::Unknown(keyword),
        _ => BotCommand::Prompt(trimmed.to_string()),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

fn argument(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn first_word(s: &str) -> Option<String> {
    argument(split_word(s).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_commands_are_recognized() {
        assert_eq!(parse("/start"), BotCommand::Start);
        assert_eq!(parse("/HELP"), BotCommand::Help);
        assert_eq!(parse("/info@hortabot"), BotCommand::Info);
        assert_eq!(parse("/create_routine"), BotCommand::CreateRoutine);
    }

    #[test]
    fn add_task_accepts_phrase_and_underscore_forms() {
        let expected = BotCommand::AddTask(Some("Water the basil".to_string()));
        assert_eq!(parse("add task Water the basil"), expected);
        assert_eq!(parse("Add Task   Water the basil  "), expected);
        assert_eq!(parse("/add_task Water the basil"), expected);
        assert_eq!(parse("/add_task@hortabot Water the basil"), expected);
        assert_eq!(parse("/add task Water the basil"), expected);
    }

    #[test]
    fn add_task_without_name_has_no_argument() {
        assert_eq!(parse("add task"), BotCommand::AddTask(None));
        assert_eq!(parse("/add_task   "), BotCommand::AddTask(None));
    }

    #[test]
    fn list_tasks_takes_optional_list_id() {
        assert_eq!(parse("list tasks"), BotCommand::ListTasks(None));
        assert_eq!(parse("/list_tasks"), BotCommand::ListTasks(None));
        assert_eq!(
            parse("list tasks MTIzNDU2"),
            BotCommand::ListTasks(Some("MTIzNDU2".to_string()))
        );
        assert_eq!(
            parse("/list_tasks MTIzNDU2 extra"),
            BotCommand::ListTasks(Some("MTIzNDU2".to_string()))
        );
    }

    #[test]
    fn create_routine_phrase_is_case_insensitive() {
        assert_eq!(parse("Create Routine"), BotCommand::CreateRoutine);
    }

    #[test]
    fn unknown_slash_commands_are_not_prompts() {
        assert_eq!(parse("/water"), BotCommand::Unknown("water".to_string()));
        assert_eq!(parse("/add"), BotCommand::Unknown("add".to_string()));
    }

    #[test]
    fn free_text_becomes_a_prompt() {
        assert_eq!(
            parse("  how often should I water orchids? "),
            BotCommand::Prompt("how often should I water orchids?".to_string())
        );
        // Single-word keywords need the slash.
        assert_eq!(parse("help"), BotCommand::Prompt("help".to_string()));
        assert_eq!(
            parse("add taskforce"),
            BotCommand::Prompt("add taskforce".to_string())
        );
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(parse(""), BotCommand::Empty);
        assert_eq!(parse(" \n\t "), BotCommand::Empty);
    }
}
