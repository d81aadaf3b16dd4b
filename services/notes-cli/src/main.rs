//! Notes CLI
//!
//! Command-line client for the notes backend:
//! 1. Loads config (file, then env overrides)
//! 2. Restores the stored session tokens
//! 3. Runs one subcommand through the API client, refreshing expired tokens
//! 4. Prints the result as JSON on stdout; logs go to stderr

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use api_client::{ApiClient, ClientError};
use clap::Parser;
use common::Secret;
use serde_json::json;
use session_auth::{CredentialStore, FileBackend, RegisterData};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, NotesCommand, RegisterArgs};
use crate::config::Config;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let source = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&source)
        .with_context(|| format!("failed to load config from {}", source.path.display()))?;

    info!(
        base_url = %config.api.base_url,
        credentials = %config.storage.credentials_path.display(),
        headers = config.headers.len(),
        "configuration loaded"
    );

    let backend = FileBackend::new(&config.storage.credentials_path);
    let store = CredentialStore::load(backend).with_context(|| {
        format!(
            "failed to read credentials from {}",
            config.storage.credentials_path.display()
        )
    })?;
    let client = ApiClient::new(config.client_config(), Arc::new(store))
        .context("failed to build API client")?;

    let output = run(&client, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute one subcommand and return what to print.
async fn run(client: &ApiClient, command: Command) -> Result<serde_json::Value> {
    let output = match command {
        Command::Login(args) => {
            let password = password(args.password)?;
            let user = client
                .login(&args.identifier, &password)
                .await
                .map_err(explain)?;
            json!({ "logged_in": true, "user": user })
        }
        Command::Logout => {
            client.logout().context("failed to clear stored credentials")?;
            json!({ "logged_in": false })
        }
        Command::Whoami => {
            require_session(client)?;
            json!(client.current_user().await.map_err(explain)?)
        }
        Command::Register(args) => {
            let data = register_data(args)?;
            let user = client.register(&data).await.map_err(explain)?;
            json!({ "logged_in": true, "user": user })
        }
        Command::Notes { command } => {
            require_session(client)?;
            match command {
                NotesCommand::List => json!(client.list_notes().await.map_err(explain)?),
                NotesCommand::Create { content } => {
                    json!(client.create_note(&content).await.map_err(explain)?)
                }
                NotesCommand::Update { id, content } => {
                    json!(client.update_note(id, &content).await.map_err(explain)?)
                }
                NotesCommand::Delete { id } => {
                    client.delete_note(id).await.map_err(explain)?;
                    json!({ "deleted": id })
                }
            }
        }
        Command::Jobs { role } => {
            require_session(client)?;
            let role = match role {
                Some(role) => session_auth::Role::from(role).as_str().to_string(),
                None => client.current_user().await.map_err(explain)?.role,
            };
            json!(client.list_job_posts(&role).await.map_err(explain)?)
        }
    };
    Ok(output)
}

fn require_session(client: &ApiClient) -> Result<()> {
    if !client.is_authenticated() {
        bail!("not logged in; run `notes login <identifier>` first");
    }
    Ok(())
}

fn password(arg: Option<String>) -> Result<Secret<String>> {
    match arg.map(Secret::new) {
        Some(password) if !password.is_blank() => Ok(password),
        _ => bail!("a password is required (--password or NOTES_PASSWORD)"),
    }
}

fn register_data(args: RegisterArgs) -> Result<RegisterData> {
    Ok(RegisterData {
        password: password(args.password)?,
        username: args.username,
        email: args.email,
        phone: args.phone,
        role: args.role.into(),
        license_number: args.license_number,
        frequent_location: args.frequent_location,
        personal_id: args.personal_id,
    })
}

/// Attach a next step to errors that end the session.
fn explain(err: ClientError) -> anyhow::Error {
    if err.requires_login() {
        anyhow::Error::new(err).context("session expired; run `notes login <identifier>` again")
    } else {
        anyhow::Error::new(err)
    }
}
