//! CLI entry point for Tollgate.
//!
//! This binary provides the `tollgate` command with subcommands for
//! signing up, logging in, walking through the screen flow, and checking
//! the store status.

mod cli;
mod flow;
mod helpers;
mod repl;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tollgate_store::{AccountStore, StoreConfig};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::flow::{LoginForm, Page, SessionFlow, SignupForm, WELCOME};
use crate::helpers::{init_tracing, load_config, password_or_prompt};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    let config = load_config(cli.config.as_deref(), cli.db.as_deref())?;

    // The store is opened once and shared by whatever the command runs.
    let store = AccountStore::initialize(&config)
        .await
        .with_context(|| format!("failed to open account store at {}", config.path.display()))?;
    info!(path = %config.path.display(), "store initialized");

    match cli.command {
        Commands::Signup {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            cmd_signup(
                store,
                SignupForm {
                    username,
                    email,
                    password,
                },
            )
            .await
        }
        Commands::Login { username, password } => {
            let password = password_or_prompt(password)?;
            cmd_login(store, LoginForm { username, password }).await
        }
        Commands::Run => repl::cmd_run(SessionFlow::new(store)).await,
        Commands::Status { json } => cmd_status(&store, &config, json).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_signup(store: AccountStore, form: SignupForm) -> Result<()> {
    let mut flow = SessionFlow::new(store);
    flow.go_to_signup();

    let feedback = flow.sign_up(&form).await;
    if !feedback.is_success() {
        bail!(feedback.message);
    }
    println!("{}", feedback.message);
    Ok(())
}

async fn cmd_login(store: AccountStore, form: LoginForm) -> Result<()> {
    let mut flow = SessionFlow::new(store);

    let feedback = flow.log_in(&form).await;
    if !feedback.is_success() {
        bail!(feedback.message);
    }
    println!("{}", feedback.message);
    if let Page::Home { username } = flow.page() {
        println!("{WELCOME}, {username}");
    }
    Ok(())
}

async fn cmd_status(store: &AccountStore, config: &StoreConfig, json: bool) -> Result<()> {
    let accounts = store.count().await.context("failed to count accounts")?;

    if json {
        let status = serde_json::json!({
            "path": config.path,
            "username_collation": config.username_collation,
            "password_storage": config.password_storage,
            "accounts": accounts,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("  Database:            {}", config.path.display());
        println!("  Username collation:  {}", config.username_collation);
        println!("  Accounts:            {accounts}");
    }
    Ok(())
}
