//! Vitals CLI
//!
//! A command-line client for the Vitals pipeline query API: log in, inspect
//! buffered readings, read the latest efficiency prediction and fetch the
//! trend chart.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, query, session};
use std::path::PathBuf;

/// Vitals pipeline CLI
#[derive(Parser)]
#[command(name = "vitals")]
#[command(author, version, about = "CLI for the Vitals pipeline", long_about = None)]
pub struct Cli {
    /// API endpoint URL
    #[arg(long, env = "VITALS_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store an access token
    Login {
        #[arg(long, short, default_value = "admin")]
        username: String,

        /// Password (prompting is not supported; prefer the env var)
        #[arg(long, short, env = "VITALS_PASSWORD")]
        password: String,
    },

    /// Forget the stored access token
    Logout,

    /// Show buffered readings
    Data {
        /// Show only the newest N readings
        #[arg(long, short = 'n')]
        last: Option<usize>,
    },

    /// Show the latest efficiency prediction
    Prediction,

    /// Download the efficiency trend chart
    Plot {
        /// Output file path
        #[arg(long, short, default_value = "efficiency.png")]
        output: PathBuf,
    },

    /// Show server health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let token = config::Config::load()?
        .token_for(&cli.api_url)
        .map(str::to_string);
    let client = client::ApiClient::new(&cli.api_url)?.with_token(token);

    match cli.command {
        Commands::Login { username, password } => {
            session::login(&cli.api_url, &username, &password).await?;
        }
        Commands::Logout => session::logout()?,
        Commands::Data { last } => query::show_data(&client, last, cli.format).await?,
        Commands::Prediction => query::show_prediction(&client, cli.format).await?,
        Commands::Plot { output } => query::save_plot(&client, &output).await?,
        Commands::Health => health::show_health(&client, cli.format).await?,
    }

    Ok(())
}
