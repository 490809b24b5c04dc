//! Ad Console CLI - the console's session manager from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (prompts for the password when -p is omitted)
//! adctl login -u ops
//!
//! # Show the logged-in user and selected account
//! adctl whoami
//!
//! # List accounts and select one
//! adctl accounts
//! adctl switch 12
//!
//! # List ad plans of the selected account
//! adctl plans --page 2 --name spring
//!
//! # Log out
//! adctl logout
//! ```
//!
//! The session (token, profile, selected account) is kept in a JSON file,
//! `.adctl-session.json` in the working directory unless `--state` says
//! otherwise.
//!
//! # Environment Variables
//!
//! - `API_BASE_URL` - Backend REST root (default: <http://localhost:3000/api>)
//! - `API_TIMEOUT_MS` - Backend request timeout (default: 10000)

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adctl")]
#[command(author, version, about = "Ad console command-line client")]
struct Cli {
    /// Session state file
    #[arg(long, global = true, default_value = ".adctl-session.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with username and password
    Login {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List the accounts available to the user
    Accounts,
    /// Select another account
    Switch {
        /// Account ID
        id: i64,
    },
    /// List ad plans of the selected account
    Plans {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Filter by plan name
        #[arg(long)]
        name: Option<String>,

        /// Rows per page
        #[arg(long, default_value_t = ad_console_core::page::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; command output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let ctx = commands::Context::open(cli.state).await?;
    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => commands::read_password()?,
            };
            commands::auth::login(&ctx, &username, &password).await
        }
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Whoami => commands::auth::whoami(&ctx),
        Commands::Accounts => commands::accounts::list(&ctx),
        Commands::Switch { id } => commands::accounts::switch(&ctx, id).await,
        Commands::Plans {
            page,
            name,
            page_size,
        } => commands::plans::list(&ctx, page, page_size, name.as_deref()).await,
    }
}
