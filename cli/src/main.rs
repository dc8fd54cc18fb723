use std::path::PathBuf;

use chat_client::config::{ConfigError, parse_send_policy};
use chat_client::directory::{self, Directory};
use chat_client::net::{ApiClient, ApiError, SignupRequest};
use chat_client::session::{self, SessionError};
use chat_client::{ChatError, ClientConfig, CredentialContext, PeerId};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod chat;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("not logged in; run `matchchat login` first")]
    NotLoggedIn,
    #[error("unknown send policy `{0}`; expected optimistic or echo")]
    InvalidPolicy(String),
    #[error("health check failed with HTTP {0}")]
    HealthCheck(u16),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "matchchat", about = "Connections and realtime chat from the terminal")]
struct Cli {
    /// REST and relay base URL; overrides MATCHCHAT_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Session file; overrides MATCHCHAT_SESSION.
    #[arg(long)]
    session: Option<PathBuf>,

    /// `optimistic` or `echo`; overrides MATCHCHAT_SEND_POLICY.
    #[arg(long)]
    send_policy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server answers /healthz.
    Ping,
    Login {
        username: String,
        #[arg(long, env = "MATCHCHAT_PASSWORD")]
        password: String,
    },
    Logout,
    Signup {
        username: String,
        email: String,
        #[arg(long, env = "MATCHCHAT_PASSWORD")]
        password: String,
    },
    /// List every other user.
    Users,
    /// List interests sent and received.
    Interests,
    Interest(InterestCommand),
    /// List the peers you can chat with.
    Peers,
    /// Open the interactive chat, optionally with a peer selected.
    Chat { peer: Option<String> },
}

#[derive(Args, Debug)]
struct InterestCommand {
    #[command(subcommand)]
    command: InterestSubcommand,
}

#[derive(Subcommand, Debug)]
enum InterestSubcommand {
    Send { user_id: String },
    Accept { user_id: String },
    Reject { user_id: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let api = ApiClient::new(&config.base_url);

    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::Login { username, password } => run_login(&config, &api, &username, &password).await,
        Command::Logout => {
            session::clear_session(&config.session_path)?;
            eprintln!("logged out");
            Ok(())
        }
        Command::Signup { username, email, password } => {
            let created = api.signup(&SignupRequest { username, email, password }).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
            Ok(())
        }
        Command::Users => run_users(&config, &api).await,
        Command::Interests => run_interests(&config, &api).await,
        Command::Interest(interest) => run_interest(&config, &api, interest).await,
        Command::Peers => run_peers(&config, &api).await,
        Command::Chat { peer } => {
            let context = load_context(&config)?;
            chat::run(&config, context, peer.map(PeerId::from)).await
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(path) = &cli.session {
        config.session_path.clone_from(path);
    }
    if let Some(raw) = &cli.send_policy {
        config.send_policy = parse_send_policy(raw).ok_or_else(|| CliError::InvalidPolicy(raw.clone()))?;
    }
    Ok(config)
}

fn load_context(config: &ClientConfig) -> Result<CredentialContext, CliError> {
    Ok(CredentialContext::new(session::load_session(&config.session_path)?))
}

fn require_token(context: &CredentialContext) -> Result<&str, CliError> {
    context.token().ok_or(CliError::NotLoggedIn)
}

async fn run_ping(config: &ClientConfig) -> Result<(), CliError> {
    let url = format!("{}/healthz", config.base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HealthCheck(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_login(config: &ClientConfig, api: &ApiClient, username: &str, password: &str) -> Result<(), CliError> {
    let session = api.login(username, password).await?;
    session::save_session(&config.session_path, &session)?;
    eprintln!("logged in as {} ({})", session.username.as_deref().unwrap_or(username), session.email);
    Ok(())
}

async fn run_users(config: &ClientConfig, api: &ApiClient) -> Result<(), CliError> {
    let context = load_context(config)?;
    let users = api.users(require_token(&context)?).await?;
    for user in directory::other_users(&users, &context) {
        println!("{}\t{}\t{}", user.id, user.username, user.email);
    }
    Ok(())
}

async fn run_interests(config: &ClientConfig, api: &ApiClient) -> Result<(), CliError> {
    let context = load_context(config)?;
    let interests = api.interests(require_token(&context)?).await?;
    for row in directory::interest_rows(&interests, &context) {
        let marker = if row.actionable { "  (accept/reject)" } else { "" };
        println!(
            "{}\t{}\t{}\t{}{marker}",
            row.interest_id, row.peer.peer_id, row.peer.display_name, row.status
        );
    }
    Ok(())
}

async fn run_interest(config: &ClientConfig, api: &ApiClient, interest: InterestCommand) -> Result<(), CliError> {
    let context = load_context(config)?;
    let token = require_token(&context)?;
    let response = match interest.command {
        InterestSubcommand::Send { user_id } => api.send_interest(token, &user_id).await?,
        InterestSubcommand::Accept { user_id } => api.accept_interest(token, &user_id).await?,
        InterestSubcommand::Reject { user_id } => api.reject_interest(token, &user_id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_peers(config: &ClientConfig, api: &ApiClient) -> Result<(), CliError> {
    let context = load_context(config)?;
    let mut directory = Directory::new();
    for peer in directory.peers(api, &context).await? {
        println!("{}\t{}\t{}", peer.peer_id, peer.display_name, peer.email);
    }
    Ok(())
}
