use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strips::aggregator::{start_background_crawl, Aggregator};
use strips::comics;
use strips::config::Config;
use strips::db::Database;
use strips::routes::{self, AppState};

#[derive(Parser)]
#[command(name = "strips", about = "Webcomic aggregator")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "strips.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web interface with scheduled crawls
    Serve,
    /// Crawl comics once and exit
    Crawl {
        /// Comic slugs to crawl (default: all active comics)
        #[arg(short = 'c', long = "comic")]
        comics: Vec<String>,
        /// First date to crawl (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to crawl (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Create a user and print the secret key for feed access
    AddUser {
        handle: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strips=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    // Initialize database and mirror the comic catalog into it
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:strips.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    let metas: Vec<_> = comics::all().iter().map(|crawler| crawler.meta()).collect();
    db.sync_comics(&metas).await?;
    info!("Database initialized with {} comics", metas.len());

    let db = Arc::new(db);
    let aggregator = Arc::new(Aggregator::new(db.clone(), &config.user_agent));

    match cli.command {
        Command::Serve => serve(config, db, aggregator).await,
        Command::Crawl {
            comics: slugs,
            from,
            to,
        } => {
            if slugs.is_empty() {
                aggregator.crawl_all(from, to).await
            } else {
                aggregator.crawl_slugs(&slugs, from, to).await
            }
        }
        Command::AddUser { handle } => {
            let user = db.create_user(&handle).await?;
            println!(
                "Created user {} with secret key {}",
                user.handle, user.secret_key
            );
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    db: Arc<Database>,
    aggregator: Arc<Aggregator>,
) -> anyhow::Result<()> {
    // Start background crawl task
    let bg_aggregator = aggregator.clone();
    let crawl_interval = config.crawl_interval;
    tokio::spawn(async move {
        start_background_crawl(bg_aggregator, crawl_interval).await;
    });

    // Create app state
    let state = Arc::new(AppState {
        db,
        aggregator,
        site_url: config.site_url.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/crawl", post(routes::trigger_crawl))
        .route("/crawl/status", get(routes::crawl_status))
        .route("/my", get(routes::my_latest))
        .route("/my/feed.xml", get(routes::my_feed))
        .route("/my/toggle", post(routes::toggle_subscription))
        .route("/my/:year/:month/:day", get(routes::my_day))
        .route("/:slug", get(routes::comic_latest))
        .route("/:slug/website", get(routes::comic_website))
        .route("/:slug/feed.xml", get(routes::comic_feed))
        .route("/:slug/:year/:month", get(routes::comic_month))
        .route("/:slug/:year/:month/:day", get(routes::comic_day))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
