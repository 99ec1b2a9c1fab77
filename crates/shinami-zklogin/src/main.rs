/*
[INPUT]:  CLI arguments, YAML configuration file, provider callback URLs
[OUTPUT]: Local zkLogin sessions, provider auth URLs, completed logins, auth API server
[POS]:    Binary entry point
[UPDATE]: When changing CLI commands or startup flow
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shinami_zklogin::auth_url::{AuthUrlParams, auth_url};
use shinami_zklogin::providers::RelativeMaxEpoch;
use shinami_zklogin::{
    AuthApiClient, AuthRouter, CallbackHandler, LocalSessionStore, OidProvider, SessionStore,
    ZkLoginConfig, create_local_session, load_client_session,
};

#[derive(Parser, Debug)]
#[command(name = "shinami-zklogin", version, about = "Shinami zkLogin client tools")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and list enabled providers
    CheckConfig,
    /// Serve the auth API (login, logout, me, apple) under /api/auth
    Serve,
    /// Log out and start a new local session
    NewSession {
        /// Fixed max epoch instead of current epoch plus the configured offset
        #[arg(long)]
        max_epoch: Option<u64>,
    },
    /// Print the provider authorization URL for the local session
    AuthUrl {
        #[arg(long)]
        provider: OidProvider,
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        redirect_uri: String,
        #[arg(long, default_value = "/")]
        redirect_to: String,
        /// Page Apple's form post is forwarded to
        #[arg(long)]
        apple_callback: Option<String>,
    },
    /// Complete a login from the URL the provider redirected to
    Callback {
        #[arg(long)]
        provider: OidProvider,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "sub")]
        key_claim_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = ZkLoginConfig::load(&args.config_path)
        .with_context(|| format!("load config {}", args.config_path.display()))?;
    info!(config_path = %args.config_path.display(), "configuration loaded");

    match args.command {
        Command::CheckConfig => check_config(&config),
        Command::Serve => serve(&config).await,
        Command::NewSession { max_epoch } => new_session(&config, max_epoch).await,
        Command::AuthUrl {
            provider,
            client_id,
            redirect_uri,
            redirect_to,
            apple_callback,
        } => {
            let store = config.local_session_store();
            let session = store
                .load()
                .context("read local session")?
                .context("no local session; run new-session first")?;
            let url = auth_url(
                provider,
                &AuthUrlParams {
                    client_id: &client_id,
                    redirect_uri: &redirect_uri,
                    nonce: &session.nonce,
                    redirect_to: &redirect_to,
                    extra_scopes: &[],
                },
                apple_callback.as_deref(),
            )
            .context("build auth url")?;
            println!("{url}");
            Ok(())
        }
        Command::Callback {
            provider,
            url,
            key_claim_name,
        } => callback(&config, provider, &url, &key_claim_name).await,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn check_config(config: &ZkLoginConfig) -> Result<()> {
    let apps = config.allowed_apps().context("allowed_apps")?;
    let mut enabled: Vec<_> = apps
        .iter()
        .filter(|(_, apps)| !apps.is_empty())
        .map(|(provider, _)| provider.to_string())
        .collect();
    enabled.sort();
    config.session_store().context("session")?;
    info!(
        providers = %enabled.join(","),
        local_session = %config.local_session_path().display(),
        "configuration valid"
    );
    Ok(())
}

async fn serve(config: &ZkLoginConfig) -> Result<()> {
    let login = Arc::new(config.login_handler().context("login handler")?);
    let sessions: Arc<dyn SessionStore> = Arc::new(config.session_store().context("session")?);
    let providers: Vec<String> = login
        .enabled_providers()
        .iter()
        .map(ToString::to_string)
        .collect();

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("while binding tcp listener")?;
    let router = Router::new()
        .nest("/api/auth", AuthRouter::new(login, sessions).router())
        .layer(TraceLayer::new_for_http());
    info!(
        addr = %listener.local_addr().context("local addr")?,
        providers = %providers.join(","),
        "starting auth api server"
    );

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    info!("auth api server shutdown");
    result.context("axum server")
}

/// CTRL+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn new_session(config: &ZkLoginConfig, max_epoch: Option<u64>) -> Result<()> {
    let api = AuthApiClient::with_config(&config.auth_api_base, &config.client_config())
        .context("auth api client")?;
    let store = config.local_session_store();

    let session = match max_epoch {
        Some(max_epoch) => create_local_session(&api, &store, &max_epoch).await,
        None => {
            let node = config.node_client().context("node client")?;
            let source = RelativeMaxEpoch::new(node, config.max_epoch_offset);
            create_local_session(&api, &store, &source).await
        }
    }
    .context("create local session")?;

    info!(
        path = %config.local_session_path().display(),
        max_epoch = session.max_epoch,
        "local session saved"
    );
    println!("{}", session.nonce);
    Ok(())
}

async fn callback(
    config: &ZkLoginConfig,
    provider: OidProvider,
    url: &str,
    key_claim_name: &str,
) -> Result<()> {
    let api = Arc::new(
        AuthApiClient::with_config(&config.auth_api_base, &config.client_config())
            .context("auth api client")?,
    );
    let store = Arc::new(config.local_session_store());

    let mut handler = CallbackHandler::new(provider, api.clone(), store.clone())
        .with_key_claim_name(key_claim_name);
    let redirect_to = handler.handle(url).await.context("complete login")?;

    let session = load_client_session(api.as_ref(), store.as_ref())
        .await
        .context("load client session")?;
    match session.user() {
        Some(user) => info!(wallet = %user.wallet, redirect_to = %redirect_to, "session active"),
        None => info!(redirect_to = %redirect_to, "login finished without an active session"),
    }
    println!("{redirect_to}");
    Ok(())
}
