//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending a query to
//! the backend.

use crate::types::{Provider, RetrievalMode};

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Re-send the most recent user message.
    Retry,

    /// Change the provider.
    Provider(Provider),

    /// Change the model.
    Model(String),

    /// Change the retrieval mode.
    Mode(RetrievalMode),

    /// List providers in the catalog.
    ListProviders,

    /// List models of the current provider.
    ListModels,

    /// Show connection and selection status.
    Status,

    /// Save the transcript as JSON.
    SaveTranscript(String),

    /// Load a JSON transcript.
    LoadTranscript(String),

    /// Export the conversation as plain text.
    ExportText(String),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use ragchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/mode rag").is_some());
/// assert!(parse_command("What does the handbook say?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "new" => ChatCommand::Clear,
        "retry" => ChatCommand::Retry,
        "provider" => match argument {
            Some(provider) => ChatCommand::Provider(Provider::from(provider)),
            None => ChatCommand::Invalid("/provider requires a provider key".to_string()),
        },
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model id".to_string()),
        },
        "mode" => match argument.map(str::parse::<RetrievalMode>) {
            Some(Ok(mode)) => ChatCommand::Mode(mode),
            Some(Err(err)) => ChatCommand::Invalid(format!("/mode {err}")),
            None => ChatCommand::Invalid("/mode requires llm, rag, or web".to_string()),
        },
        "providers" => ChatCommand::ListProviders,
        "models" => ChatCommand::ListModels,
        "status" | "stats" => ChatCommand::Status,
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "load" => match argument {
            Some(arg) => ChatCommand::LoadTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/load requires a file path".to_string()),
        },
        "export" => match argument {
            Some(arg) => ChatCommand::ExportText(arg.to_string()),
            None => ChatCommand::Invalid("/export requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new, /clear           Start a new conversation
  /retry                 Re-send the last message
  /provider <key>        Change the provider (e.g., /provider openai)
  /model <id>            Change the model (e.g., /model gpt-4o)
  /mode llm|rag|web      LLM only, with document search, or with web search too
  /providers             List providers
  /models                List models of the current provider
  /status                Show connection and selection
  /save <file>           Save the conversation as JSON
  /load <file>           Load a conversation saved with /save
  /export <file>         Export the conversation as plain text
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear_and_new() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/NEW"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/retry"), Some(ChatCommand::Retry));
    }

    #[test]
    fn parse_provider() {
        assert_eq!(
            parse_command("/provider OpenAI"),
            Some(ChatCommand::Provider(Provider::from("openai")))
        );
        assert_eq!(
            parse_command("/provider local"),
            Some(ChatCommand::Provider(Provider::Custom("local".to_string())))
        );
        assert!(matches!(
            parse_command("/provider"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model   meta-llama/Llama-3.3-70B-Instruct  "),
            Some(ChatCommand::Model(
                "meta-llama/Llama-3.3-70B-Instruct".to_string()
            ))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid("/model requires a model id".to_string()))
        );
    }

    #[test]
    fn parse_mode() {
        assert_eq!(
            parse_command("/mode rag"),
            Some(ChatCommand::Mode(RetrievalMode::Retrieval))
        );
        assert_eq!(
            parse_command("/mode 3"),
            Some(ChatCommand::Mode(RetrievalMode::RetrievalWithWeb))
        );
        assert!(matches!(
            parse_command("/mode web-only"),
            Some(ChatCommand::Invalid(msg)) if msg.starts_with("/mode unknown mode")
        ));
    }

    #[test]
    fn parse_file_commands() {
        assert_eq!(
            parse_command("/save session.json"),
            Some(ChatCommand::SaveTranscript("session.json".to_string()))
        );
        assert_eq!(
            parse_command("/load session.json"),
            Some(ChatCommand::LoadTranscript("session.json".to_string()))
        );
        assert_eq!(
            parse_command("/export chat.txt"),
            Some(ChatCommand::ExportText("chat.txt".to_string()))
        );
        assert!(matches!(
            parse_command("/export"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_listings_and_status() {
        assert_eq!(parse_command("/providers"), Some(ChatCommand::ListProviders));
        assert_eq!(parse_command("/models"), Some(ChatCommand::ListModels));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Status));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/summon"),
            Some(ChatCommand::Invalid("Unknown command: /summon".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/retry"));
        assert!(help.contains("/provider"));
        assert!(help.contains("/mode"));
        assert!(help.contains("/export"));
    }
}
