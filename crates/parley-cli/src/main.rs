use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use parley_config::{Config, ConfigManager, LogLevel};
use parley_core::{
    guard, AuthFlow, ChatBackend, ChatController, ClientError, FileTokenStorage, Message,
    MemoryTokenStorage, Role, Route, SessionStore,
};
use parley_observability::{conversation_span, LogManager, LogTarget};
use tracing::{debug, Instrument};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Command line client for the Parley chat backend")]
#[command(version)]
struct Cli {
    /// Backend URL, overriding the config file
    #[arg(long)]
    server_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "PARLEY_CONFIG", default_value = "~/.parley/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CredentialArgs {
    email: String,

    /// Prompted for when not given
    #[arg(long, env = "PARLEY_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login(CredentialArgs),
    /// Create an account (does not log in)
    Register(CredentialArgs),
    /// Forget the stored session token
    Logout,
    /// Show session and backend information
    Status,
    /// List conversations
    Conversations,
    /// Start a new conversation
    New,
    /// Print the history of a conversation
    History {
        conversation_id: String,
    },
    /// Send one message and print the reconciled history tail
    Send {
        conversation_id: String,
        message: String,
    },
    /// Interactive chat
    Chat {
        /// Conversation to open; defaults to the most recent one
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Read a value (e.g. backend.base_url, logging.level)
    Get { key: String },
    /// Set a value
    Set { key: String, value: String },
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// Print the current configuration
    Show,
}

/// Everything a backend command needs
struct Context {
    config: Config,
    server_url: String,
    session: SessionStore,
    backend: Arc<dyn ChatBackend>,
}

impl Context {
    fn build(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let server_url = cli
            .server_url
            .clone()
            .unwrap_or_else(|| config.backend.base_url.clone());
        let session = match config.session.resolved_token_path() {
            Some(path) => SessionStore::open(FileTokenStorage::new(path)),
            None => SessionStore::open(MemoryTokenStorage::new()),
        };
        let backend = parley_core::connect(
            &server_url,
            session.clone(),
            config.backend.timeout_seconds.map(Duration::from_secs),
        )?;
        debug!("Using backend {}", server_url);

        Ok(Self {
            config,
            server_url,
            session,
            backend,
        })
    }

    fn auth(&self) -> AuthFlow {
        AuthFlow::new(Arc::clone(&self.backend), self.session.clone())
    }

    fn controller(&self) -> anyhow::Result<ChatController> {
        if guard(Route::Chat, &self.session) != Route::Chat {
            anyhow::bail!("Not logged in. Run `parley login <email>` first.");
        }
        Ok(ChatController::new(
            Arc::clone(&self.backend),
            self.session.clone(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path =
        parley_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if let Commands::Config(args) = &cli.command {
        return handle_config(args.clone(), config_path).await;
    }

    let config = ConfigManager::load(&config_path).await?.snapshot().await;
    let _log = LogManager::init(
        &config.logging,
        LogTarget::Stderr,
        level_override(cli.debug).as_deref(),
    )?;
    debug!("Loaded config from {}", config_path.display());

    let ctx = Context::build(&cli, config)?;

    match cli.command {
        Commands::Login(args) => login(&ctx, args).await,
        Commands::Register(args) => register(&ctx, args).await,
        Commands::Logout => {
            ctx.auth().logout();
            println!("{}", "Logged out".green());
            Ok(())
        }
        Commands::Status => status(&ctx),
        Commands::Conversations => list_conversations(&ctx).await,
        Commands::New => new_conversation(&ctx).await,
        Commands::History { conversation_id } => show_history(&ctx, &conversation_id).await,
        Commands::Send {
            conversation_id,
            message,
        } => send_message(&ctx, &conversation_id, &message).await,
        Commands::Chat { conversation } => run_interactive_chat(&ctx, conversation).await,
        Commands::Config(_) => Ok(()),
    }
}

/// `--debug` wins over the configured level; otherwise the config decides
fn level_override(debug: bool) -> Option<String> {
    debug.then(|| LogLevel::Debug.to_string())
}

fn read_password(args: &CredentialArgs) -> anyhow::Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

async fn login(ctx: &Context, args: CredentialArgs) -> anyhow::Result<()> {
    let password = read_password(&args)?;
    match ctx.auth().login(&args.email, &password).await {
        Ok(_) => {
            println!("{}", format!("Logged in as {}", args.email.trim()).green());
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("Login failed: {}", e).red());
            std::process::exit(1);
        }
    }
}

async fn register(ctx: &Context, args: CredentialArgs) -> anyhow::Result<()> {
    let password = read_password(&args)?;
    match ctx.auth().register(&args.email, &password).await {
        Ok(result) => {
            println!("{}", result.message.green());
            println!(
                "{}",
                format!("Run `parley login {}` to start chatting", args.email.trim()).dimmed()
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("Registration failed: {}", e).red());
            std::process::exit(1);
        }
    }
}

fn status(ctx: &Context) -> anyhow::Result<()> {
    println!("{}", "Parley status".cyan().bold());
    println!("  Backend:  {}", ctx.server_url);
    match ctx.config.session.resolved_token_path() {
        Some(path) => println!("  Token:    {}", path.display()),
        None => println!("  Token:    (memory only)"),
    }
    if ctx.session.is_authenticated() {
        println!("  Session:  {}", "logged in".green());
    } else {
        println!("  Session:  {}", "logged out".yellow());
    }
    Ok(())
}

async fn list_conversations(ctx: &Context) -> anyhow::Result<()> {
    let mut controller = ctx.controller()?;
    controller.load_all().await?;

    if controller.registry().is_empty() {
        println!("{}", "No conversations yet. Run `parley new` to start one.".dimmed());
        return Ok(());
    }
    for conversation in controller.conversations() {
        println!("{}  {}", conversation.id.dimmed(), conversation.title);
    }
    Ok(())
}

async fn new_conversation(ctx: &Context) -> anyhow::Result<()> {
    let mut controller = ctx.controller()?;
    let id = controller.create().await?;
    println!("{}", format!("Started conversation {}", id).green());
    Ok(())
}

/// Load the list and open one conversation with its history
async fn open_conversation(ctx: &Context, conversation_id: &str) -> anyhow::Result<ChatController> {
    let mut controller = ctx.controller()?;
    controller.load_all().await?;
    controller.select_and_load(Some(conversation_id)).await?;
    Ok(controller)
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{} {}", "You:".cyan().bold(), message.content),
        Role::Assistant => println!("{} {}", "Assistant:".green().bold(), message.content),
    }
}

async fn show_history(ctx: &Context, conversation_id: &str) -> anyhow::Result<()> {
    let controller = open_conversation(ctx, conversation_id)
        .instrument(conversation_span(conversation_id))
        .await?;
    if controller.messages().is_empty() {
        println!("{}", "Start a conversation".dimmed());
    }
    for message in controller.messages() {
        print_message(message);
    }
    Ok(())
}

async fn send_message(ctx: &Context, conversation_id: &str, message: &str) -> anyhow::Result<()> {
    let span = conversation_span(conversation_id);
    let mut controller = open_conversation(ctx, conversation_id)
        .instrument(span.clone())
        .await?;
    let before = controller.messages().len();

    let outcome = controller.send(message).instrument(span).await;
    let messages = controller.messages();
    for message in messages.iter().skip(before) {
        print_message(message);
    }
    outcome?;
    Ok(())
}

async fn run_interactive_chat(ctx: &Context, conversation: Option<String>) -> anyhow::Result<()> {
    let mut controller = ctx.controller()?;
    controller.load_all().await?;
    match conversation {
        Some(id) => controller.select_and_load(Some(&id)).await?,
        None if controller.current().is_none() => {
            controller.create().await?;
        }
        None => {}
    }

    let title = controller
        .active_conversation()
        .map(|c| c.title.clone())
        .unwrap_or_default();
    println!("{}", format!("Parley: {}", title).cyan().bold());
    println!("{}", "Type '/new' for a new conversation, 'exit' or 'quit' to leave".dimmed());
    println!();
    for message in controller.messages() {
        print_message(message);
    }

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("{}", "Goodbye!".cyan());
            break;
        }
        if input == "/new" {
            let id = controller.create().await?;
            println!("{}", format!("Started conversation {}", id).green());
            continue;
        }

        let before = controller.messages().len();
        match controller.send(input).await {
            Ok(()) => {
                for message in controller.messages().iter().skip(before) {
                    if message.role == Role::Assistant {
                        print_message(message);
                    }
                }
            }
            Err(ClientError::Unauthenticated) => {
                println!(
                    "{}",
                    "Session expired. Run `parley login <email>` again.".red()
                );
                break;
            }
            Err(e) => {
                println!("{}", e.to_string().red());
                controller.dismiss_notice();
            }
        }
        println!();
    }

    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: PathBuf) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => println!("{}", format!("{} = {}", key, value).green()),
                None => {
                    println!("{}", format!("Key not found or unset: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(&config_path).await?;
            if let Err(e) = manager
                .update(|config| config.set_value(&key, &value))
                .await
            {
                eprintln!("{}", format!("Failed to set value: {}", e).red());
                std::process::exit(1);
            }
            println!("{}", format!("Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            parley_config::init_parley_dirs().await?;

            let manager = ConfigManager::new(Config::default(), config_path.clone());
            manager.save().await?;
            println!(
                "{}",
                format!("Config initialized at {:?}", config_path).green()
            );
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "Current configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
