// authd - SRP-6a authentication server for game clients
//
// One binary, three verbs:
// - serve: run the UDP handshake daemon
// - adduser: provision an account (salt + verifier, never the password)
// - login: check a username/password pair against the store

mod auth_codes;
mod auth_server;
mod protocol;
mod session;
mod user_store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::UdpSocket;

use styx_shared::auth::SrpEngine;
use styx_shared::config::get_config;
use styx_shared::database::{database_url, Database};
use styx_shared::log::initialize_logging;

use auth_server::AuthServer;
use user_store::{SqlUserStore, UserStore};

/// Default config file name
const DEFAULT_CONFIG: &str = "authd.conf";

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "authd")]
#[command(about = "styx - SRP-6a game authentication server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the authentication server
    Serve,
    /// Create an account
    Adduser {
        username: String,
        email: String,
        password: String,
    },
    /// Check a username/password pair against the store
    Login { username: String, password: String },
}

/// Global stop signal
static STOP_EVENT: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    {
        let mut config = get_config().lock();
        if !config.set_source(&args.config, "Authd_") {
            eprintln!("Could not find configuration file {}.", args.config);
            return Err(anyhow::anyhow!("Configuration file not found"));
        }
    }

    match args.command {
        Command::Serve => serve().await,
        Command::Adduser {
            username,
            email,
            password,
        } => {
            let store = open_store().await?;
            store.add_user(&username, &email, &password).await?;
            println!("Added user {}", username);
            Ok(())
        }
        Command::Login { username, password } => {
            let store = open_store().await?;
            store.login_user(&username, &password).await?;
            println!("Login OK");
            Ok(())
        }
    }
}

/// Build the SRP engine from the configured group
fn configured_engine() -> anyhow::Result<Arc<SrpEngine>> {
    let group = {
        let config = get_config().lock();
        config.get_string_default("srp.group", "rfc5054.2048")
    };
    Ok(Arc::new(SrpEngine::new(&group)?))
}

/// Connect the user store per the database configuration
async fn open_store() -> anyhow::Result<SqlUserStore> {
    let (driver, dsn) = {
        let config = get_config().lock();
        (
            config.get_string_default("database.driver", "sqlite"),
            config.get_string("database.dsn"),
        )
    };
    if dsn.is_empty() {
        return Err(anyhow::anyhow!("database.dsn not configured"));
    }

    let mut db = Database::new("Auth");
    db.initialize(&database_url(&driver, &dsn)).await?;

    let store = SqlUserStore::new(db, configured_engine()?);
    store.ensure_schema().await?;
    Ok(store)
}

async fn serve() -> anyhow::Result<()> {
    let (log_dir, log_level) = {
        let config = get_config().lock();
        let dir = config.get_string("log.directory");
        let level = config.get_string_default("log.level", "info");
        (if dir.is_empty() { None } else { Some(dir) }, level)
    };
    initialize_logging(log_dir.as_deref(), &log_level);

    tracing::info!("styx authd v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("<Ctrl-C> to stop.");

    let engine = configured_engine()?;
    tracing::info!("SRP group: {}", engine.group().name);

    let store = Arc::new(open_store().await?);

    let (listen, ttl) = {
        let config = get_config().lock();
        (
            config.get_string_default("listen.address", "0.0.0.0:16666"),
            config.get_int_default("session.ttl_seconds", 5),
        )
    };
    if ttl <= 0 {
        return Err(anyhow::anyhow!("session.ttl_seconds must be positive"));
    }

    let server = AuthServer::new(engine, store, Duration::from_secs(ttl as u64));

    let socket = UdpSocket::bind(&listen).await?;

    ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal");
        STOP_EVENT.store(true, Ordering::SeqCst);
    })?;

    tokio::select! {
        result = server.run(socket) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
            Ok(())
        }
    }
}
