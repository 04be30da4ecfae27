//! Question bank API server implementation
//!
//! HTTP server using Axum. Opens the store, makes sure the default admin
//! exists, then serves until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{admin, handlers, transfer};
use crate::auth::{ensure_admin_user, AdminAccount, SessionStore, DEFAULT_COST};
use crate::store::Store;

/// Largest accepted spreadsheet upload
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// API Server configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    /// bcrypt cost for newly hashed passwords
    pub password_cost: u32,
    pub admin: AdminAccount,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: PathBuf::from("quizbank.db"),
            password_cost: DEFAULT_COST,
            admin: AdminAccount::default(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub store: Mutex<Store>,
    pub sessions: SessionStore,
    pub password_cost: u32,
}

impl AppState {
    pub fn new(store: Store, password_cost: u32) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: Mutex::new(store),
            sessions: SessionStore::new(),
            password_cost,
        }
    }

    /// Lock the store. The guard must not be held across an `.await`.
    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Build the router with every endpoint mounted
pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Sessions
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/api/user/change_password", post(handlers::change_password))
        // Public browsing
        .route("/api/papers", get(handlers::list_papers))
        .route("/api/papers/:id", get(handlers::view_paper))
        .route("/api/search", get(handlers::search))
        // Admin: questions
        .route("/admin/api/dashboard", get(admin::dashboard))
        .route(
            "/admin/api/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/admin/api/questions/summary", get(admin::question_summaries))
        .route(
            "/admin/questions/:id",
            get(admin::question_form)
                .post(admin::save_question_form)
                .delete(admin::delete_question),
        )
        .route(
            "/api/question/:id",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/admin/questions/bulk-delete", post(admin::bulk_delete_questions))
        .route("/admin/questions/clear-all", post(admin::clear_all_questions))
        // Admin: Excel transfer
        .route("/admin/questions/template", get(transfer::download_template))
        .route("/admin/questions/export", get(transfer::export_questions))
        .route(
            "/admin/questions/import",
            post(transfer::import_questions).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Admin: papers
        .route(
            "/admin/api/papers",
            get(admin::list_papers).post(admin::create_paper),
        )
        .route(
            "/admin/papers/:id",
            get(admin::paper_form)
                .post(admin::update_paper)
                .delete(admin::delete_paper),
        )
        // Admin: users
        .route("/admin/api/users", get(admin::list_users))
        .route("/api/user", post(admin::create_user))
        .route(
            "/api/user/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizbank=info,tower_http=info".into()),
        )
        .init();

    let mut store = Store::open(&config.database)?;
    ensure_admin_user(&mut store, &config.admin, config.password_cost)?;
    let state = Arc::new(AppState::new(store, config.password_cost));

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Question bank server starting on http://{}", addr);
    info!("   Database: {}", config.database.display());
    info!("   Public: /api/papers, /api/search   Admin: /admin/...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Question bank server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
