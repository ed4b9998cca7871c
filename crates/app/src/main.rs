use anyhow::Context;
use app::config::{Cli, Command, normalize_sqlite_url, prepare_sqlite_file};
use app::{AppState, CookieSettings, build_router, seed};
use clap::Parser;
use services::{AppServices, Clock};
use tokio::net::TcpListener;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.service_settings()?;
    let db_url = normalize_sqlite_url(&cli.db_url);

    // Open + migrate SQLite at startup so handlers never see an unmigrated store.
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system(), settings)
        .await
        .with_context(|| format!("opening {db_url}"))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState {
                services,
                cookies: CookieSettings {
                    secure: cli.secure_cookie,
                },
            };
            let router = build_router(state, &cli.cors_origins);
            let listener = TcpListener::bind(cli.bind_addr)
                .await
                .with_context(|| format!("binding {}", cli.bind_addr))?;
            tracing::info!(
                addr = %cli.bind_addr,
                policy = ?settings.submission_policy,
                "assessment server listening"
            );
            axum::serve(listener, router).await?;
        }
        Command::Seed { questions } => {
            let forms = seed::seed_questions(&services.catalog(), &questions).await?;
            tracing::info!(forms, file = %questions.display(), "question bank seeded");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,app=debug,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
}
