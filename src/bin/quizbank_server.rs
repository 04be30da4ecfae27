//! Quizbank API Server binary
//!
//! HTTP API for browsing papers, searching questions and administering the
//! question bank, including Excel import and export.

use clap::Parser;
use quizbank::api::{run_api_server, ApiConfig};
use quizbank::auth::{AdminAccount, DEFAULT_COST};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quizbank-server")]
#[command(version)]
#[command(about = "Quizbank API Server - question bank and exam paper management over HTTP")]
#[command(long_about = r#"
Quizbank API Server

Public endpoints:
  - GET  /api/papers             - Paper list, newest first
  - GET  /api/papers/{id}        - One paper with its questions
  - GET  /api/search?q=          - Search question content and answers

Admin endpoints (login first with POST /login):
  - GET  /admin/questions/template  - Download the import template
  - GET  /admin/questions/export    - Export questions (?ids=1,2 or ?paper_id=7)
  - POST /admin/questions/import    - Import questions (multipart field "file")

The default admin account is created on first start.

Example usage:
  quizbank-server                            # Start on localhost:8080
  quizbank-server --host 0.0.0.0 --port 3000 --db /var/lib/quizbank.db
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "QUIZBANK_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "QUIZBANK_PORT")]
    port: u16,

    /// SQLite database file
    #[arg(long, default_value = "quizbank.db", env = "QUIZBANK_DB")]
    db: PathBuf,

    /// Password for the default admin account when it is first created
    #[arg(long, default_value = "admin123", env = "QUIZBANK_ADMIN_PASSWORD")]
    admin_password: String,

    /// bcrypt cost for stored passwords
    #[arg(long, default_value_t = DEFAULT_COST)]
    password_cost: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        database: args.db,
        password_cost: args.password_cost,
        admin: AdminAccount {
            password: args.admin_password,
            ..AdminAccount::default()
        },
    };

    run_api_server(config).await
}
