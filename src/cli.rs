use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "code-word-roulette")]
#[command(version)]
#[command(about = "Track who types the code word in a live chat and roll a winner")]
pub struct Args {
    /// Channel whose chat to follow (default: everonn)
    #[arg(long, short)]
    pub channel: Option<String>,

    /// Code word senders must type to enter; omit to only watch chat
    #[arg(long, short = 'w')]
    pub code_word: Option<String>,

    /// Seconds the winner has to respond
    #[arg(long, short = 't')]
    pub response_time: Option<i64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `code_word_roulette=trace` (overrides RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub const HELP_TEXT: &str = "\
commands:
  roll                             pick a winner among participants
  remove <name>                    drop a participant before rolling
  list                             show participants
  close                            dismiss the winner view, stopping the countdown
  clear                            clear chat history
  reset                            clear everything, including the code word
  config <channel> <word> <secs>   change channel, code word and response time
  help                             show this text
  quit                             exit";

/// A line typed by the operator on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Roll,
    Remove(String),
    List,
    Close,
    Clear,
    Reset,
    Configure {
        channel: String,
        code_word: String,
        response_time: i64,
    },
    Help,
    Quit,
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();

    let cmd = match verb.to_lowercase().as_str() {
        "roll" | "spin" | "start" => ConsoleCommand::Roll,
        "remove" | "rm" => {
            if rest.is_empty() {
                return Err("usage: remove <name>".into());
            }
            ConsoleCommand::Remove(rest.join(" "))
        }
        "list" | "ls" => ConsoleCommand::List,
        "close" | "back" => ConsoleCommand::Close,
        "clear" => ConsoleCommand::Clear,
        "reset" => ConsoleCommand::Reset,
        "config" | "settings" => {
            if rest.len() < 3 {
                return Err("usage: config <channel> <code word> <seconds>".into());
            }
            let secs = rest[rest.len() - 1];
            let response_time = secs.parse::<i64>().map_err(|_| {
                "Please enter a valid response time (at least 1 second).".to_string()
            })?;
            ConsoleCommand::Configure {
                channel: rest[0].to_string(),
                code_word: rest[1..rest.len() - 1].join(" "),
                response_time,
            }
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}', type `help`")),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["cwr"]);
        assert!(args.channel.is_none());
        assert!(args.code_word.is_none());
        assert!(args.response_time.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "cwr",
            "--channel",
            "everonn",
            "--code-word",
            "join",
            "--response-time",
            "45",
            "--config",
            "roulette.toml",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.channel.as_deref(), Some("everonn"));
        assert_eq!(args.code_word.as_deref(), Some("join"));
        assert_eq!(args.response_time, Some(45));
        assert_eq!(args.config, Some(PathBuf::from("roulette.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_args_parse_short_flags() {
        let args = Args::parse_from(["cwr", "-c", "chan", "-w", "go", "-t", "10"]);
        assert_eq!(args.channel.as_deref(), Some("chan"));
        assert_eq!(args.code_word.as_deref(), Some("go"));
        assert_eq!(args.response_time, Some(10));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(parse_command("roll"), Ok(Some(ConsoleCommand::Roll)));
        assert_eq!(parse_command("SPIN"), Ok(Some(ConsoleCommand::Roll)));
        assert_eq!(parse_command("close"), Ok(Some(ConsoleCommand::Close)));
        assert_eq!(parse_command("clear"), Ok(Some(ConsoleCommand::Clear)));
        assert_eq!(parse_command("reset"), Ok(Some(ConsoleCommand::Reset)));
        assert_eq!(parse_command("list"), Ok(Some(ConsoleCommand::List)));
        assert_eq!(parse_command("quit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_parse_remove_requires_name() {
        assert_eq!(
            parse_command("remove alice"),
            Ok(Some(ConsoleCommand::Remove("alice".into())))
        );
        assert!(parse_command("remove").is_err());
    }

    #[test]
    fn test_parse_config_with_multi_word_code_word() {
        assert_eq!(
            parse_command("config everonn free stuff 20"),
            Ok(Some(ConsoleCommand::Configure {
                channel: "everonn".into(),
                code_word: "free stuff".into(),
                response_time: 20,
            }))
        );
    }

    #[test]
    fn test_parse_config_bad_seconds() {
        let err = parse_command("config everonn join soon").unwrap_err();
        assert!(err.contains("response time"), "{err}");
        assert!(parse_command("config everonn 20").is_err());
    }

    #[test]
    fn test_parse_unknown_verb() {
        assert!(parse_command("dance").unwrap_err().contains("unknown command"));
    }
}
