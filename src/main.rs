use std::sync::Arc;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::{
    extract::connect_info::IntoMakeServiceWithConnectInfo,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use property_sla_backend::{
    config::Config,
    db::{
        issue_repository::IssueRepository, postgres_issue_repository::PostgresIssueRepository,
        postgres_provider_repository::PostgresProviderRepository,
        postgres_sla_repository::PostgresSlaTrackingRepository,
        provider_repository::ProviderRepository, sla_repository::SlaTrackingRepository,
    },
    responses::JsonResponse,
    routes::sla_router,
    services::smtp_mailer::SmtpMailer,
    worker, AppState,
};
use sqlx::PgPool;
use std::net::SocketAddr;
#[cfg(not(feature = "tls"))]
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit.per_millisecond)
            .burst_size(config.rate_limit.burst_size)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .context("invalid rate limiter settings")?,
    );

    // Background task to cleanup old IPs
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let pg_pool = establish_connection(&config.database_url).await?;
    let issue_repo = Arc::new(PostgresIssueRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn IssueRepository>;
    let provider_repo = Arc::new(PostgresProviderRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn ProviderRepository>;
    let sla_repo = Arc::new(PostgresSlaTrackingRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn SlaTrackingRepository>;

    // Initialize mailer
    let mailer = Arc::new(SmtpMailer::new().context("Failed to initialize mailer")?);

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("FRONTEND_ORIGIN is not a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let addr: SocketAddr = config.bind_addr;
    let state = AppState::new(issue_repo, provider_repo, sla_repo, mailer, config);
    let state_for_worker = state.clone();

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/sla", sla_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    worker::start_background_workers(state_for_worker).await;

    serve(addr, make_service).await
}

type MakeService = IntoMakeServiceWithConnectInfo<Router, SocketAddr>;

#[cfg(feature = "tls")]
async fn serve(addr: SocketAddr, make_service: MakeService) -> anyhow::Result<()> {
    let tls_config = RustlsConfig::from_pem_file(
        std::env::var("DEV_CERT_LOCATION").context("DEV_CERT_LOCATION must be set")?,
        std::env::var("DEV_KEY_LOCATION").context("DEV_KEY_LOCATION must be set")?,
    )
    .await
    .context("Failed to load TLS certs")?;

    info!(%addr, "running with TLS");
    axum_server::bind_rustls(addr, tls_config)
        .serve(make_service)
        .await?;
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn serve(addr: SocketAddr, make_service: MakeService) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "running without TLS");
    axum::serve(listener, make_service).await?;
    Ok(())
}

async fn root() -> Response {
    JsonResponse::success("Property SLA service").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("Failed to verify database connection")?;

    info!("Successfully connected to the database");
    Ok(pool)
}
