use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;

use pluto_core::mock_server::{self, MockServerOptions};
use pluto_core::{
    Config, DispatchResult, FilePreferences, QueryDispatcher, ReqwestTransport, SchedulerClient,
};

mod repl;

#[derive(Parser)]
#[command(name = "pluto")]
#[command(about = "Chat with the Pluto crypto assistant, with a local simulation when the orchestrator is away")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session (default)
    Chat,
    /// Send one query and print the reply
    Ask {
        /// Your question
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show or change the local simulation toggle
    Mock {
        #[arg(value_enum)]
        action: MockAction,
    },
    /// Control the remote price refresh schedule
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
        /// Bearer token for the scheduler (defaults to PLUTO_SCHEDULER_TOKEN)
        #[arg(long, global = true)]
        token: Option<String>,
    },
    /// Run a local mock orchestrator
    ServeMock {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 8001)]
        port: u16,
        /// Require this bearer token on scheduler routes
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MockAction {
    On,
    Off,
    Show,
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Start refreshing a coin's price periodically
    Start {
        /// Coin id, e.g. bitcoin
        symbol: String,
        /// Seconds between refreshes
        interval_seconds: u64,
    },
    /// Stop the schedule
    Stop,
    /// Print the current schedule state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let (dispatcher, scheduler) = build_clients(&config)?;
            repl::run(dispatcher, scheduler, config.scheduler_token.clone()).await?
        }
        Commands::Ask { text } => ask(&config, &text.join(" ")).await?,
        Commands::Mock { action } => mock(&config, action)?,
        Commands::Schedule { command, token } => {
            let token = token.or_else(|| config.scheduler_token.clone());
            schedule(&config, command, token.as_deref()).await?
        }
        Commands::ServeMock { host, port, token } => {
            let listener = TcpListener::bind((host.as_str(), port)).await?;
            mock_server::serve(listener, MockServerOptions { token }).await?
        }
    }

    Ok(())
}

fn build_clients(config: &Config) -> Result<(QueryDispatcher, SchedulerClient)> {
    let transport = Arc::new(ReqwestTransport::new());
    let preferences = Arc::new(FilePreferences::default_location()?);

    let dispatcher = QueryDispatcher::new(config, transport.clone(), preferences);
    let scheduler = SchedulerClient::new(config.scheduler_url.clone(), transport);
    Ok((dispatcher, scheduler))
}

async fn ask(config: &Config, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(anyhow!("Nothing to ask"));
    }

    let (dispatcher, _) = build_clients(config)?;
    match dispatcher.dispatch(text.trim()).await {
        DispatchResult::Reply { text, .. } => println!("{}", text),
        DispatchResult::Failed { error } => println!("Error: {}", error),
    }
    Ok(())
}

fn mock(config: &Config, action: MockAction) -> Result<()> {
    let (dispatcher, _) = build_clients(config)?;
    match action {
        MockAction::On => dispatcher.set_use_mock(true)?,
        MockAction::Off => dispatcher.set_use_mock(false)?,
        MockAction::Show => {}
    }
    println!("{}", dispatcher.resolve_mode().display_name());
    Ok(())
}

async fn schedule(config: &Config, command: ScheduleCommand, token: Option<&str>) -> Result<()> {
    let (_, scheduler) = build_clients(config)?;
    match command {
        ScheduleCommand::Start {
            symbol,
            interval_seconds,
        } => scheduler.start(&symbol, interval_seconds, token).await.await?,
        ScheduleCommand::Stop => scheduler.stop(token).await.await?,
        ScheduleCommand::Status => {
            scheduler.refresh_status(token).await;
        }
    }
    println!("Schedule: {}", scheduler.state());
    Ok(())
}
