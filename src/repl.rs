use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use pluto_core::{ChatRole, ChatSession, QueryDispatcher, ScheduleState, SchedulerClient};

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Mock(bool),
    Token(Option<String>),
    Start { symbol: String, interval_seconds: u64 },
    Stop,
    Status,
    History,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(ReplCommand::Say(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let command = match (parts.next(), parts.next(), parts.next()) {
            (Some("mock"), Some("on"), None) => ReplCommand::Mock(true),
            (Some("mock"), Some("off"), None) => ReplCommand::Mock(false),
            (Some("token"), Some("clear"), None) => ReplCommand::Token(None),
            (Some("token"), Some(value), None) => ReplCommand::Token(Some(value.to_string())),
            (Some("start"), Some(symbol), Some(interval)) if parts.next().is_none() => {
                match interval.parse::<u64>() {
                    Ok(secs) if secs > 0 => ReplCommand::Start {
                        symbol: symbol.to_lowercase(),
                        interval_seconds: secs,
                    },
                    _ => ReplCommand::Invalid(format!("Invalid interval: {}", interval)),
                }
            }
            (Some("stop"), None, None) => ReplCommand::Stop,
            (Some("status"), None, None) => ReplCommand::Status,
            (Some("history"), None, None) => ReplCommand::History,
            (Some("help"), None, None) => ReplCommand::Help,
            (Some("quit"), None, None) | (Some("exit"), None, None) => ReplCommand::Quit,
            _ => ReplCommand::Invalid(format!("Unknown command: {}", line)),
        };
        Some(command)
    }
}

const HELP: &str = "\
Type a question to chat. Commands:
  /mock on|off                  answer locally or try the orchestrator
  /token <value>|clear          bearer token for the scheduler
  /start <symbol> <seconds>     start the price refresh schedule
  /stop                         stop the schedule
  /status                       show the schedule state
  /history                      show this conversation
  /quit                         leave";

/// Run the chat loop until EOF or `/quit`.
///
/// The schedule is polled in the background for as long as the loop runs.
pub async fn run(
    dispatcher: QueryDispatcher,
    scheduler: SchedulerClient,
    initial_token: Option<String>,
) -> Result<()> {
    let mut session = ChatSession::new(dispatcher);
    let (token_tx, token_rx) = watch::channel(initial_token);
    let mut states = scheduler.subscribe();
    let _poller = scheduler.spawn_poller(token_rx);
    let mut shown = ScheduleState::Unknown;

    println!(
        "Pluto ({}). Type /help for commands.",
        session.dispatcher().resolve_mode().display_name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = ReplCommand::parse(&line) else { continue };
                let token = token_tx.borrow().clone();

                match command {
                    ReplCommand::Say(text) => {
                        println!("Thinking...");
                        if let Some(reply) = session.send(&text).await {
                            println!("pluto> {}", reply.text());
                        }
                    }
                    ReplCommand::Mock(enabled) => {
                        session.dispatcher().set_use_mock(enabled)?;
                        println!("Mode: {}", session.dispatcher().resolve_mode().display_name());
                    }
                    ReplCommand::Token(value) => {
                        let set = value.is_some();
                        token_tx.send_replace(value);
                        println!("{}", if set { "Token set" } else { "Token cleared" });
                    }
                    ReplCommand::Start { symbol, interval_seconds } => {
                        // Detached; the settle refresh reports back through `states`.
                        let settle = scheduler.start(&symbol, interval_seconds, token.as_deref()).await;
                        drop(settle);
                        println!("Start requested for {} every {}s", symbol, interval_seconds);
                    }
                    ReplCommand::Stop => {
                        let settle = scheduler.stop(token.as_deref()).await;
                        drop(settle);
                        println!("Stop requested");
                    }
                    ReplCommand::Status => {
                        println!("Schedule: {}", scheduler.state());
                    }
                    ReplCommand::History => {
                        for message in session.log().messages() {
                            let who = match message.sender() {
                                ChatRole::User => "you",
                                ChatRole::Assistant => "pluto",
                            };
                            println!("[{}] {}> {}", message.id(), who, message.text());
                        }
                    }
                    ReplCommand::Help => println!("{}", HELP),
                    ReplCommand::Quit => break,
                    ReplCommand::Invalid(reason) => println!("{}", reason),
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    continue;
                }
                let current = states.borrow_and_update().clone();
                if current != shown {
                    println!("\nSchedule: {}", current);
                    shown = current;
                }
            }
        }
    }

    Ok(())
}

fn prompt() -> Result<()> {
    print!("you> ");
    std::io::stdout().flush()?;
    Ok(())
}
