//! Line commands accepted by the interactive prompt.

use std::path::PathBuf;

pub const HELP: &str = "\
Type a question and press Enter to ask it.
  /stop            stop the answer being generated
  /sources         show the sources of the latest answer
  /upload <path>   upload a .pdf, .docx or .txt document
  /health          show backend health
  /help            show this help
  /quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Query(String),
    Stop,
    Sources,
    Upload(PathBuf),
    Health,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Query(line.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        match name {
            "stop" => ReplCommand::Stop,
            "sources" => ReplCommand::Sources,
            "health" => ReplCommand::Health,
            "help" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            "upload" if rest.is_empty() => {
                ReplCommand::Invalid("/upload needs a file path".to_string())
            }
            "upload" => ReplCommand::Upload(PathBuf::from(rest)),
            other => ReplCommand::Invalid(format!("unknown command /{other}; try /help")),
        }
    }
}
