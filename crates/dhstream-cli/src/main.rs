//! dhstream CLI - Command line interface for the digital-human stream backend.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dhstream_client::{
    ApiClient, ConfigStore, TaskController, TaskEvent, DEFAULT_ROOM_PREFIX,
};
use dhstream_core::{DigitalHumanInfo, DriveType, OutputMode, Task, TaskId, UserId};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// dhstream CLI - digital human stream task tool
#[derive(Parser)]
#[command(name = "dhstream")]
#[command(about = "CLI for the digital-human stream backend", long_about = None)]
struct Cli {
    /// Backend URL, overrides the saved config for this run
    #[arg(short, long, env = "DHSTREAM_SERVER_URL")]
    server: Option<String>,

    /// App id sent as X-App-Id
    #[arg(long, env = "DHSTREAM_APP_ID")]
    app_id: Option<i64>,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the digital human profile
    Info {
        /// User ID (generated when omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Create a stream task
    Create {
        /// User ID (generated when omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Output mode: small or large
        #[arg(short, long, default_value = "small")]
        output_mode: OutputMode,
    },

    /// Stop a stream task
    Stop {
        /// Task ID
        id: String,
    },

    /// List stream tasks
    List {
        /// Only show tasks whose room starts with this prefix
        #[arg(long)]
        room_prefix: Option<String>,
    },

    /// Drive a task: text, audio or ws-tts
    Drive {
        /// Drive type
        kind: DriveType,

        /// Task ID
        id: String,
    },

    /// Interrupt a task's current drive
    Interrupt {
        /// Task ID
        id: String,
    },

    /// Stop every task whose room starts with the prefix
    Destroy {
        #[arg(long, default_value = DEFAULT_ROOM_PREFIX)]
        room_prefix: String,
    },

    /// Create a task, drive it once, then stop it
    Session {
        /// User ID (generated when omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Drive type
        #[arg(short, long, default_value = "text")]
        drive: DriveType,
    },

    /// Manage the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the saved configuration
    Show,

    /// Save a new backend URL
    #[command(name = "set-server")]
    SetServer {
        url: String,
    },

    /// Restore the defaults
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dhstream=debug" } else { "dhstream=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult {
    let mut store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location()?,
    };

    if let Commands::Config { action } = &cli.command {
        return run_config(&mut store, action);
    }

    let server_url = store.server_url(cli.server.clone())?;
    debug!(server_url = %server_url, "Using backend");

    let mut client = ApiClient::new(&server_url);
    if let Some(app_id) = cli.app_id {
        client.set_app_id(app_id);
    }

    match cli.command {
        Commands::Info { user } => {
            let info = client.get_digital_human_info(&user_id(user)).await?;
            if cli.json {
                print_json(&info)?;
            } else {
                print_digital_human(&info);
            }
        }
        Commands::Create { user, output_mode } => {
            let mut controller = TaskController::new(client);
            let started = controller.create_task(user_id(user), output_mode).await?;
            println!("Task created:");
            print_task(&started.task);
            println!("  Config:     {} bytes (base64)", started.base64_config.len());
        }
        Commands::Stop { id } => {
            client.stop_stream_task(&TaskId::new(id.clone())).await?;
            println!("Task stopped: {}", id);
        }
        Commands::List { room_prefix } => {
            let mut tasks = client.query_stream_tasks().await?;
            if let Some(prefix) = room_prefix {
                tasks.retain(|t| t.room_id().starts_with(&prefix));
            }
            if cli.json {
                print_json(&tasks)?;
            } else {
                list_tasks(&tasks);
            }
        }
        Commands::Drive { kind, id } => {
            client.drive(kind, &TaskId::new(id.clone())).await?;
            println!("Drive '{}' sent to task {}", kind, id);
        }
        Commands::Interrupt { id } => {
            client.interrupt_drive_task(&TaskId::new(id.clone())).await?;
            println!("Task interrupted: {}", id);
        }
        Commands::Destroy { room_prefix } => {
            let mut controller = TaskController::new(client);
            let report = controller.destroy_tasks(&room_prefix).await?;
            println!("Destroyed {} task(s)", report.stopped.len());
            for (id, err) in &report.failed {
                println!("  failed: {} ({})", id, err);
            }
        }
        Commands::Session { user, drive } => {
            run_session(client, user_id(user), drive).await?;
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

async fn run_session(client: ApiClient, user: UserId, drive: DriveType) -> CliResult {
    let mut controller = TaskController::new(client);
    let mut events = controller.subscribe();

    let started = controller.create_task(user, OutputMode::default()).await?;
    println!("Task running:");
    print_task(&started.task);

    let drive_result = controller.drive(drive).await;
    let stopped = controller.stop_task().await?;
    drive_result?;
    println!("Task {} {}", stopped.task_id(), stopped.status());

    while let Ok(event) = events.try_recv() {
        match event {
            TaskEvent::StatusChanged { task_id, status } => {
                println!("  event: {} -> {}", task_id, status)
            }
            TaskEvent::Driven { task_id, drive } => println!("  event: {} driven by {}", task_id, drive),
            TaskEvent::Failed {
                action,
                code,
                message,
            } => println!("  event: {} failed [{}] {}", action, code, message),
        }
    }

    Ok(())
}

fn run_config(store: &mut ConfigStore, action: &ConfigCommand) -> CliResult {
    match action {
        ConfigCommand::Show => {
            store.load()?;
            println!("Config file: {}", store.path().display());
            println!("  Server URL: {}", store.current().server_url);
        }
        ConfigCommand::SetServer { url } => {
            store.set_server_url(url.clone())?;
            println!("Server URL saved: {}", url);
        }
        ConfigCommand::Reset => {
            store.reset()?;
            println!("Config reset: {}", store.current().server_url);
        }
    }
    Ok(())
}

fn user_id(user: Option<String>) -> UserId {
    user.map(UserId::new).unwrap_or_else(UserId::generate)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_tasks(tasks: &[Task]) {
    println!("Tasks ({}):", tasks.len());
    println!("{:<36}  {:<20}  {:<20}  {}", "ID", "ROOM", "STREAM", "USER");
    println!("{}", "-".repeat(90));

    for task in tasks {
        println!(
            "{:<36}  {:<20}  {:<20}  {}",
            task.task_id(),
            task.room_id(),
            task.stream_id(),
            task.user_id()
        );
    }
}

fn print_task(task: &Task) {
    println!("  ID:         {}", task.task_id());
    println!("  Status:     {}", task.status());
    println!("  Room:       {}", task.room_id());
    println!("  Stream:     {}", task.stream_id());
    println!("  User:       {}", task.user_id());
    println!("  App ID:     {}", task.app_id());
}

fn print_digital_human(info: &DigitalHumanInfo) {
    println!("  ID:         {}", info.id);
    println!("  Name:       {}", info.name);
    println!("  Public:     {}", info.is_public);
    println!("  App ID:     {}", info.app_id);
    if let Some(url) = &info.cover_url {
        println!("  Cover:      {}", url);
    }
    if let Some(url) = &info.preview_url {
        println!("  Preview:    {}", url);
    }
    let token_state = if info.current_token().is_some() {
        "valid"
    } else {
        "missing or expired"
    };
    println!("  Token:      {} (expires {})", token_state, format_timestamp(info.expire_time_ms));
}

fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
