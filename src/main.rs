//! NovelHub server entry point.

use clap::Parser;
use novelhub::{
    auth::generate_token,
    catalog::{CatalogService, CreateUserInput, Validate},
    config::{Cli, Command, Config, UserCommand},
    db::{Database, timestamp_to_datetime},
    server,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: novelhub user add <username> --email <email> --admin");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let catalog = CatalogService::new(db, config.catalog.delete_recount);

    match action {
        UserCommand::Add {
            username,
            email,
            password,
            admin,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(|| generate_token()[..16].to_string());

            let input = CreateUserInput {
                email,
                username,
                password: password.clone(),
                is_admin: Some(admin),
            };
            input.validate()?;

            let user = catalog.create_user(input)?;
            println!(
                "Created user: {} <{}> (admin: {}, id: {})",
                user.username, user.email, user.is_admin, user.id
            );
            if generated {
                println!("Generated password: {}", password);
            }
        }

        UserCommand::Del { id } => match catalog.delete_user(id) {
            Ok(_) => println!("Deleted user: {}", id),
            Err(novelhub::AppError::NotFound(_)) => println!("User not found: {}", id),
            Err(e) => return Err(e.into()),
        },

        UserCommand::List => {
            let users = catalog.get_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<6} {:<20} {:<32} {:<6} CREATED",
                    "ID", "USERNAME", "EMAIL", "ADMIN"
                );
                println!("{}", "-".repeat(80));
                for user in users {
                    println!(
                        "{:<6} {:<20} {:<32} {:<6} {}",
                        user.id,
                        user.username,
                        user.email,
                        if user.is_admin { "yes" } else { "no" },
                        timestamp_to_datetime(user.created_at).format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novelhub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        require_admin = config.auth.require_admin,
        delete_recount = ?config.catalog.delete_recount,
        "Starting NovelHub server"
    );

    let bind = config.server.bind;
    let state = server::AppState::new_with_db(config, db);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
