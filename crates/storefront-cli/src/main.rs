//! Storefront CLI - a command-line session controller for the storefront
//! console API.
//!
//! Logs in, keeps the credential in the token store, and runs requests
//! through the same authenticated pipeline the console screens use. When
//! the pipeline ends the session, the CLI reports the login redirect.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use serde_json::Value;
use storefront_core::{ApiClient, ApiRequest, Config, CredentialStore, RefreshPolicy, SessionEvent, SessionEvents};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code when the backend ended the session
const EXIT_SESSION_ENDED: u8 = 2;

#[derive(Parser)]
#[command(name = "storefront", version, about = "Talk to the storefront console API")]
struct Cli {
    /// API base URL (overrides config and STOREFRONT_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// When to refresh the credential
    #[arg(long, global = true, value_enum)]
    policy: Option<PolicyArg>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    EveryCall,
    OnUnauthorized,
}

impl From<PolicyArg> for RefreshPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::EveryCall => RefreshPolicy::EveryCall,
            PolicyArg::OnUnauthorized => RefreshPolicy::OnUnauthorized,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the credential
    Login {
        /// Email or user name (defaults to the last one used)
        #[arg(long, short)]
        user: Option<String>,

        /// Keep the credential across restarts
        #[arg(long)]
        remember: bool,
    },
    /// Forget the stored credential
    Logout,
    /// Show the stored credential's state
    Status,
    /// GET one or more paths concurrently and print the JSON bodies
    Get {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Send a request with an optional JSON body
    Send {
        method: String,
        path: String,

        /// JSON request body
        #[arg(long, short)]
        data: Option<String>,

        /// Unwrap the response envelope and print only its value
        #[arg(long)]
        envelope: bool,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "storefront.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref());

    let mut config = Config::load()?;
    if let Some(ref url) = cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(policy) = cli.policy {
        config.refresh_policy = policy.into();
    }

    let (client, mut events) = config.connect()?;
    info!(base_url = %config.base_url, "Storefront CLI starting");

    let result = run(cli.command, &client, &mut config).await;
    let session_ended = report_session_events(&mut events);

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if session_ended {
                Ok(ExitCode::from(EXIT_SESSION_ENDED))
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

async fn run(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { user, remember } => login(client, config, user, remember).await,
        Command::Logout => {
            client.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            status(client);
            Ok(())
        }
        Command::Get { paths } => get_all(client, &paths).await,
        Command::Send {
            method,
            path,
            data,
            envelope,
        } => send(client, &method, &path, data.as_deref(), envelope).await,
    }
}

async fn login(client: &ApiClient, config: &mut Config, user: Option<String>, remember: bool) -> Result<()> {
    let user = match user.or_else(|| config.last_username.clone()) {
        Some(user) => user,
        None => prompt("Email or user name: ")?,
    };
    if user.is_empty() {
        bail!("A user name is required");
    }
    let password = rpassword::prompt_password(format!("Password for {}: ", user))
        .context("Failed to read password")?;

    let credential = client.login(&user, &password, remember).await?;

    config.last_username = Some(user.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!(
        "Logged in as {} (session valid until {})",
        user,
        credential.refresh_expiry.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
    );
    if !remember {
        eprintln!("Credential is not kept after this command exits; pass --remember to keep it.");
    }
    Ok(())
}

fn status(client: &ApiClient) {
    let store = client.store();
    match store.credential() {
        Some(credential) if credential.is_expired() => {
            println!("Session expired at {}", credential.refresh_expiry.to_rfc3339());
        }
        Some(credential) => {
            println!("Logged in ({} scope)", if credential.remember_me { "durable" } else { "ephemeral" });
            println!(
                "Refresh token valid for {} more minutes",
                credential.minutes_until_expiry()
            );
        }
        None if store.access_token().is_some() => println!("Partially stored credential"),
        None => println!("Not logged in"),
    }
}

async fn get_all(client: &ApiClient, paths: &[String]) -> Result<()> {
    let requests: Vec<ApiRequest> = paths.iter().map(ApiRequest::get).collect();
    let results = join_all(requests.iter().map(|r| client.execute_json::<Value>(r))).await;

    let mut failed = 0;
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(body) => {
                if requests.len() > 1 {
                    println!("# {}", request.path());
                }
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", request.path(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} requests failed", failed, requests.len());
    }
    Ok(())
}

async fn send(client: &ApiClient, method: &str, path: &str, data: Option<&str>, envelope: bool) -> Result<()> {
    let mut request = build_request(method, path)?;
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(body);
    }

    if envelope {
        let value: Value = client.execute_envelope(&request).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let response = client.execute(&request).await?;
    let text = response.text().await.context("Failed to read response body")?;
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        Err(_) if text.is_empty() => {}
        Err(_) => println!("{}", text),
    }
    Ok(())
}

fn build_request(method: &str, path: &str) -> Result<ApiRequest> {
    Ok(match method.to_ascii_uppercase().as_str() {
        "GET" => ApiRequest::get(path),
        "POST" => ApiRequest::post(path),
        "PUT" => ApiRequest::put(path),
        "PATCH" => ApiRequest::patch(path),
        "DELETE" => ApiRequest::delete(path),
        other => bail!("Unsupported method: {}", other),
    })
}

/// Print any session transitions; returns true if the session ended
fn report_session_events(events: &mut SessionEvents) -> bool {
    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::LoginRequired { route } => {
                if !ended {
                    eprintln!("Session ended. Log in again with `storefront login` ({}).", route);
                }
                ended = true;
            }
        }
    }
    ended
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::sync::Arc;
    use storefront_core::auth::SessionRedirector;
    use storefront_core::TokenStore;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "storefront",
            "--policy",
            "on-unauthorized",
            "send",
            "patch",
            "/orders/7",
            "--data",
            r#"{"status":"shipped"}"#,
        ])
        .unwrap();
        assert!(matches!(cli.policy, Some(PolicyArg::OnUnauthorized)));
        match cli.command {
            Command::Send { method, path, data, envelope } => {
                assert_eq!(method, "patch");
                assert_eq!(path, "/orders/7");
                assert!(data.is_some());
                assert!(!envelope);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_build_request() {
        let request = build_request("delete", "vendors/3").unwrap();
        assert_eq!(request.method().as_str(), "DELETE");
        assert_eq!(request.path(), "/vendors/3");
        assert!(build_request("TRACE", "/").is_err());
    }

    #[test]
    fn test_report_session_events() {
        let store: Arc<dyn CredentialStore> = Arc::new(TokenStore::ephemeral());
        let (redirector, mut events) = SessionRedirector::new(store, "/auth");
        assert!(!report_session_events(&mut events));

        redirector.on_unauthorized();
        redirector.on_unauthorized();
        assert!(report_session_events(&mut events));
        assert!(!report_session_events(&mut events));
    }
}
