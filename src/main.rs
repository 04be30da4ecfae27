use clap::{Parser, Subcommand};
use quizbank::auth::DEFAULT_COST;
use quizbank::cli;
use quizbank::error::BankResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quizbank")]
#[command(about = "Question bank and exam paper manager with Excel import/export")]
#[command(long_about = "Quizbank - question bank and exam paper manager

COMMANDS:
  init      - Create the database and the default admin account
  import    - Import questions from an Excel workbook (.xlsx)
  export    - Export questions to a timestamped Excel workbook
  template  - Write the import template
  stats     - Show question, paper and user counts

EXAMPLES:
  quizbank init
  quizbank template question_template.xlsx
  quizbank import questions.xlsx --user admin
  quizbank export out/ --paper 7
  quizbank export out/ --ids 1,2,3

Run the HTTP API with quizbank-server.")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "quizbank.db", env = "QUIZBANK_DB")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and the default admin account
    Init {
        /// Password for the admin account if it has to be created
        #[arg(long, default_value = "admin123", env = "QUIZBANK_ADMIN_PASSWORD")]
        admin_password: String,

        /// bcrypt cost for the admin password
        #[arg(long, default_value_t = DEFAULT_COST)]
        password_cost: u32,
    },

    #[command(long_about = "Import questions from an Excel workbook.

The first sheet must have the columns 题目类型, 题目内容 and 正确答案.
选项 (options separated by |) and 解析 are optional.

Rows with problems are reported and skipped; every valid row is written
in a single transaction.")]
    /// Import questions from an Excel workbook (.xlsx)
    Import {
        /// Workbook to import
        file: PathBuf,

        /// Record the questions as created by this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Export questions to a timestamped Excel workbook
    Export {
        /// Directory to write the workbook into
        dir: PathBuf,

        /// Export the questions of one paper
        #[arg(long, conflicts_with = "ids")]
        paper: Option<i64>,

        /// Export selected question ids (comma separated)
        #[arg(long)]
        ids: Option<String>,
    },

    /// Write the import template
    Template {
        /// Output path (.xlsx)
        output: PathBuf,
    },

    /// Show question, paper and user counts
    Stats,
}

fn main() -> BankResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            admin_password,
            password_cost,
        } => cli::init(cli.db, admin_password, password_cost),

        Commands::Import { file, user } => cli::import(cli.db, file, user),

        Commands::Export { dir, paper, ids } => cli::export(cli.db, dir, paper, ids),

        Commands::Template { output } => cli::template(output),

        Commands::Stats => cli::stats(cli.db),
    }
}
