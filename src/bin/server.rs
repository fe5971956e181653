use std::{fs::OpenOptions, net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use sales_dashboard::{
    AppState, Config, DEFAULT_CACHE_PATH, DEFAULT_CACHE_TTL_MINUTES, build_router,
    graceful_shutdown, logging_middleware,
};

/// The web server for the sales dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The URL that serves the sales rows as JSON.
    #[arg(long)]
    sales_url: String,

    /// The URL that serves the receivables summary as JSON.
    #[arg(long)]
    receivables_url: String,

    /// File path to the SQLite database used to cache fetched data.
    #[arg(long, default_value = DEFAULT_CACHE_PATH)]
    cache_path: PathBuf,

    /// How many minutes fetched data is served before it is refetched.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_MINUTES)]
    cache_ttl_minutes: i64,

    /// The port to serve the dashboard from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Log the headers and bodies of every request and response.
    #[arg(long)]
    log_bodies: bool,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let config = Config {
        sales_url: args.sales_url,
        receivables_url: args.receivables_url,
        cache_path: args.cache_path,
        cache_ttl: time::Duration::minutes(args.cache_ttl_minutes),
    };

    let loader = config
        .create_loader()
        .expect("Could not open the cache database.");
    let app_state = AppState::new(loader.handle());

    // Load in the background so the dashboard can show a loading page meanwhile.
    let initial_loader = loader.clone();
    tokio::spawn(async move {
        if let Err(error) = initial_loader.initialize().await {
            tracing::error!("Could not load sales data: {error}");
        }
    });
    let _refresh_task = loader.spawn_refresh_loop(config.refresh_interval());

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(app_state);
    let router = if args.log_bodies {
        router.layer(middleware::from_fn(logging_middleware))
    } else {
        router
    };
    let router = add_tracing_layer(router);

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(stdout_filter))
        .with(debug_log.with_filter(filter::LevelFilter::DEBUG))
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
