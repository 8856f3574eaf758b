//! Command line argument parsing
//!
//! Every subcommand starts by entering the flow, so each invocation behaves
//! like a page reload: the stored session is resumed or discarded first.
//! - `status`: Show the current screen
//! - `register`: Register a participant
//! - `answer`: Answer the current question and wait for the administrator
//! - `wait`: Keep waiting for an outstanding decision
//! - `retry`: Go back to the question after a rejection
//! - `rate`: Rate the experience
//! - `finish`: Acknowledge the completion screen
//! - `restart`: Discard the session
//! - `play`: Run the whole flow interactively
//! - `show-config` / `init-config`: Configuration discovery helpers

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Flow { action: FlowAction, options: RunOptions },
    Play(RunOptions),
    ShowConfig { config_override: Option<PathBuf> },
    InitConfig { path: PathBuf, force: bool },
}

/// One inbound flow event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    Status,
    Register { name: String, age: i64 },
    Answer { question: u8, text: String },
    Wait,
    Retry,
    Rate(i64),
    Finish,
    Restart,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_override: Option<PathBuf>,
    pub state_dir_override: Option<PathBuf>,
    pub json: bool,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "quizflow")]
#[command(author = "Quizflow Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-step quiz with administrator validation, resumable across runs")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the session record
    #[arg(long = "state-dir", global = true)]
    pub state_dir: Option<PathBuf>,
    /// Print the flow state as JSON
    #[arg(long = "json", global = true)]
    pub json: bool,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current screen
    Status,
    /// Register a participant and start the quiz
    Register {
        /// Participant name (at least 2 characters)
        #[arg(short = 'n', long = "name")]
        name: String,
        /// Participant age (1-120)
        #[arg(short = 'a', long = "age", allow_negative_numbers = true)]
        age: i64,
    },
    /// Answer the current question
    Answer {
        /// Question number (1-3)
        question: u8,
        /// Answer text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Keep waiting for the administrator's decision
    Wait,
    /// Return to the question after a rejected answer
    Retry,
    /// Rate the experience
    Rate {
        /// Rating from 1 to 5
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Acknowledge the completion screen
    Finish,
    /// Discard the current session
    Restart,
    /// Run the flow interactively
    Play,
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration file
    InitConfig {
        /// Target path (defaults to ./quizflow.toml)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long = "force")]
        force: bool,
    },
}

impl Args {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn options(&self) -> RunOptions {
        RunOptions {
            config_override: self.config.clone(),
            state_dir_override: self.state_dir.clone(),
            json: self.json,
            verbose: self.verbose,
        }
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        let flow = |action: FlowAction| {
            Ok(ExecutionMode::Flow {
                action,
                options: self.options(),
            })
        };

        match &self.command {
            Some(Commands::Status) => flow(FlowAction::Status),
            Some(Commands::Register { name, age }) => flow(FlowAction::Register {
                name: name.clone(),
                age: *age,
            }),
            Some(Commands::Answer { question, text }) => {
                let text = text.join(" ");
                if text.trim().is_empty() {
                    return Err("Answer text must not be empty".to_string());
                }
                flow(FlowAction::Answer {
                    question: *question,
                    text,
                })
            }
            Some(Commands::Wait) => flow(FlowAction::Wait),
            Some(Commands::Retry) => flow(FlowAction::Retry),
            Some(Commands::Rate { value }) => flow(FlowAction::Rate(*value)),
            Some(Commands::Finish) => flow(FlowAction::Finish),
            Some(Commands::Restart) => flow(FlowAction::Restart),
            Some(Commands::Play) => Ok(ExecutionMode::Play(self.options())),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig {
                config_override: self.config.clone(),
            }),
            Some(Commands::InitConfig { path, force }) => Ok(ExecutionMode::InitConfig {
                path: path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(crate::env::LOCAL_CONFIG_FILE_NAME)),
                force: *force,
            }),
            None => Err(
                "No command specified. Use 'quizflow --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: Commands) -> Args {
        Args {
            config: None,
            state_dir: None,
            json: false,
            verbose: false,
            command: Some(command),
        }
    }

    #[test]
    fn test_answer_joins_words() {
        let mode = args(Commands::Answer {
            question: 1,
            text: vec!["New".to_string(), "York".to_string()],
        })
        .mode()
        .unwrap();

        if let ExecutionMode::Flow { action, .. } = mode {
            assert_eq!(
                action,
                FlowAction::Answer {
                    question: 1,
                    text: "New York".to_string()
                }
            );
        } else {
            panic!("Expected Flow mode");
        }
    }

    #[test]
    fn test_blank_answer_rejected() {
        let result = args(Commands::Answer {
            question: 2,
            text: vec!["  ".to_string()],
        })
        .mode();
        assert!(result.is_err());
    }

    #[test]
    fn test_global_options_carried() {
        let mut parsed = args(Commands::Status);
        parsed.json = true;
        parsed.state_dir = Some(PathBuf::from("/tmp/quiz-state"));

        if let ExecutionMode::Flow { action, options } = parsed.mode().unwrap() {
            assert_eq!(action, FlowAction::Status);
            assert!(options.json);
            assert_eq!(options.state_dir_override, Some(PathBuf::from("/tmp/quiz-state")));
        } else {
            panic!("Expected Flow mode");
        }
    }

    #[test]
    fn test_parse_register_from_command_line() {
        let parsed =
            Args::try_parse_from(["quizflow", "register", "--name", "Ana", "--age", "29"]).unwrap();

        if let ExecutionMode::Flow { action, .. } = parsed.mode().unwrap() {
            assert_eq!(
                action,
                FlowAction::Register {
                    name: "Ana".to_string(),
                    age: 29
                }
            );
        } else {
            panic!("Expected Flow mode");
        }
    }

    #[test]
    fn test_init_config_default_path() {
        let mode = args(Commands::InitConfig {
            path: None,
            force: false,
        })
        .mode()
        .unwrap();

        if let ExecutionMode::InitConfig { path, force } = mode {
            assert_eq!(path, PathBuf::from("quizflow.toml"));
            assert!(!force);
        } else {
            panic!("Expected InitConfig mode");
        }
    }

    #[test]
    fn test_no_command_error() {
        let parsed = Args {
            config: None,
            state_dir: None,
            json: false,
            verbose: false,
            command: None,
        };
        assert!(parsed.mode().is_err());
    }
}
