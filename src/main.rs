use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keysmith::config::Config;
use keysmith::db::{AppState, create_pool, init_db, queries};
use keysmith::issuance;
use keysmith::models::{BatchParams, CreateAccount, CreateSalesPoint};

#[derive(Parser, Debug)]
#[command(name = "keysmith")]
#[command(about = "Activation key issuance and redemption service")]
struct Cli {
    /// Seed the database with dev data (sales points, an account, a batch)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

fn dev_sales_point(code: &str, name: &str, location: &str) -> CreateSalesPoint {
    CreateSalesPoint {
        code: code.to_string(),
        name: name.to_string(),
        location: Some(location.to_string()),
        contact_name: None,
        contact_phone: None,
        contact_email: None,
        is_active: true,
        commission_rate: 10.0,
        notes: None,
    }
}

/// Seeds the database with dev data for manual testing.
/// Only runs in dev mode and when no sales points exist yet.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::list_sales_points(&conn).expect("Failed to list sales points");
    if !existing.is_empty() {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let algiers = queries::create_sales_point(
        &conn,
        &dev_sales_point("ALG", "Librairie du Centre", "Alger"),
        Some("seed"),
    )
    .expect("Failed to create dev sales point");
    let oran = queries::create_sales_point(
        &conn,
        &dev_sales_point("ORN", "Papeterie El Bahia", "Oran"),
        Some("seed"),
    )
    .expect("Failed to create dev sales point");
    tracing::info!("Sales points: {} ({}), {} ({})", algiers.code, algiers.id, oran.code, oran.id);

    let account = queries::create_account(
        &conn,
        &CreateAccount {
            email: "student@keysmith.local".to_string(),
            full_name: Some("Dev Student".to_string()),
            year_of_study: Some(3),
            ..Default::default()
        },
    )
    .expect("Failed to create dev account");
    tracing::info!("Account: {} ({})", account.email, account.id);

    let batch = issuance::generate_batch_codes(
        &mut conn,
        &BatchParams {
            sales_point_id: algiers.id.clone(),
            duration_days: 365,
            quantity: 5,
            notes: Some("Dev seed".to_string()),
            price_paid: Some(1000),
        },
        Some("seed"),
    )
    .expect("Failed to issue dev batch");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    println!();
    println!("--- COPY FROM HERE ---");
    println!("  account_id: {}", account.id);
    println!("  sales_point_id: {}", algiers.id);
    println!("  batch_id: {}", batch.batch_id);
    for code in &batch.codes {
        println!("  code: {}", code);
    }
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keysmith=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    tracing::info!(
        "Analytics scope: {} ({} production sales points), pricing: {}",
        config.analytics.mode.as_ref(),
        config.analytics.production_sales_points.len(),
        config.pricing.name()
    );

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        analytics: config.analytics.clone(),
        pricing: config.pricing.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set KEYSMITH_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = keysmith::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Keysmith server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
