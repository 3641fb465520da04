use std::io;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use code_word_roulette::cli::{parse_command, Args, ConsoleCommand, HELP_TEXT};
use code_word_roulette::config::AppConfig;
use code_word_roulette::selector::{Selector, ThreadRngSource};
use code_word_roulette::sink::TerminalSink;
use code_word_roulette::{
    ConnectionManager, KickRoomLookup, PusherTransport, RouletteError, Runtime, RuntimeHandle,
    Session,
};

const DEFAULT_LOG_FILTER: &str = "code_word_roulette=info";

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Run one console command. Returns `false` when the operator asked to quit.
async fn dispatch(handle: &RuntimeHandle, cmd: ConsoleCommand) -> Result<bool, RouletteError> {
    match cmd {
        ConsoleCommand::Roll => match handle.start_selection().await {
            Ok(_) => {}
            Err(RouletteError::NoParticipants) => {
                eprintln!("{}", "No participants to choose from!".bright_red());
            }
            Err(e) => return Err(e),
        },
        ConsoleCommand::Remove(name) => {
            if !handle.remove_participant(&name).await? {
                eprintln!("{} {}", "not a participant:".bright_red(), name);
            }
        }
        ConsoleCommand::List => {
            let participants = handle.participants().await?;
            if participants.is_empty() {
                println!("{}", "No participants yet.".dimmed());
            }
            for p in participants {
                println!("  {} ({} messages)", p.name, p.message_count);
            }
        }
        ConsoleCommand::Close => {
            handle.close_winner_view().await?;
        }
        ConsoleCommand::Clear => handle.clear_chat_history().await?,
        ConsoleCommand::Reset => handle.reset_session().await?,
        ConsoleCommand::Configure {
            channel,
            code_word,
            response_time,
        } => match handle.configure(&channel, &code_word, response_time).await {
            Ok(()) => {}
            Err(RouletteError::Config(e)) => eprintln!("{}", e.to_string().bright_red()),
            Err(e) => return Err(e),
        },
        ConsoleCommand::Help => println!("{HELP_TEXT}"),
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let app = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let session_config = app.session_config(
        args.channel.as_deref(),
        args.code_word.as_deref(),
        args.response_time,
    )?;
    let connection_config = app.connection_config();

    info!(
        channel = session_config.channel(),
        code_word = session_config.code_word(),
        watch_only = session_config.is_watch_only(),
        "starting session"
    );

    let lookup = Arc::new(KickRoomLookup::new(connection_config.channel_api_base.clone()));
    let transport = Arc::new(PusherTransport::new(connection_config.pusher_url.clone()));
    let (connection, events) = ConnectionManager::new(connection_config, lookup, transport);

    let selector = Selector::new(Box::new(ThreadRngSource), app.reveal_delay());
    let session = Session::new(session_config, selector, TerminalSink::new(io::stdout()));
    let (runtime, handle) = Runtime::new(session, connection, events);
    let runtime_task = tokio::spawn(runtime.run());

    eprintln!("{}", "Type `help` for commands.".bright_blue());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if !dispatch(&handle, cmd).await? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => eprintln!("{}", msg.bright_red()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "runtime already stopped");
    }
    let session = runtime_task.await?;
    info!(
        participants = session.tracker().len(),
        messages = session.chat_history().len(),
        "session ended"
    );
    Ok(())
}
