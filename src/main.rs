#![warn(clippy::pedantic)]

mod cli;
mod fileio;

use anyhow::{bail, Context, Result};
use cli::{Command, LoginArgs};
use kuaiwan_auth::{
    blob, is_start_game_failure, Credentials, EndpointResult, Endpoints, SessionPipeline,
    StageResults,
};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Args::parse_args();
    match args.command {
        Command::Login(login) => run_login(&login).await,
        Command::Parse {
            blob,
            offline,
            server,
        } => run_parse(&blob, offline, &server).await,
    }
}

async fn run_login(args: &LoginArgs) -> Result<()> {
    let accounts = match (&args.accounts, &args.username, &args.password) {
        (Some(path), _, _) => fileio::read_acc_file(path)?,
        (None, Some(username), Some(password)) => vec![fileio::Account {
            username: username.clone(),
            password: password.clone(),
        }],
        _ => bail!("Either --accounts or both --username and --password are required"),
    };
    let pipeline = SessionPipeline::with_endpoints(args.endpoints())
        .with_context(|| "Error creating the session pipeline")?;

    let mut failed = 0;
    for account in &accounts {
        let credentials = Credentials::new(
            args.platform.as_str(),
            args.server.as_str(),
            account.username.as_str(),
            account.password.as_str(),
        );
        let outcome = pipeline.acquire(&credentials, &args.cancellation()).await;
        let login = &outcome.login;
        println!(
            "[{}] login {}: {}",
            account.username,
            if login.success { "ok" } else { "failed" },
            login.message
        );
        if let Some(token) = login.token() {
            println!("online_token: {}", token);
        }
        match &outcome.stages {
            Some(stages) => print_stages(stages),
            None => failed += 1,
        }
    }
    if failed == accounts.len() {
        bail!("No account obtained an online token");
    }
    Ok(())
}

async fn run_parse(path: &Path, offline: bool, server: &str) -> Result<()> {
    let session = blob::parse(&fileio::read_blob(path)?);
    println!("{}", session);
    if offline {
        return Ok(());
    }
    let pipeline = SessionPipeline::with_endpoints(Endpoints::for_server(server))
        .with_context(|| "Error creating the session pipeline")?;
    let stages = pipeline
        .resume(&session, &kuaiwan_auth::Cancellation::never())
        .await
        .with_context(|| "The captured session has no online token")?;
    print_stages(&stages);
    Ok(())
}

fn print_stages(stages: &StageResults) {
    print_endpoint("user-info", &stages.user_info);
    print_endpoint("game-info", &stages.game_info);
    if is_start_game_failure(&stages.start_game) {
        println!("start-game failed: {}", stages.start_game);
    } else {
        println!("start-game:\n{}", stages.start_game);
    }
}

fn print_endpoint(stage: &str, result: &EndpointResult) {
    let status = if result.ok { "ok" } else { "failed" };
    match &result.message {
        Some(message) => println!("{} {}: {}", stage, status, message),
        None => println!("{} {}", stage, status),
    }
    if let Some(raw) = &result.raw {
        println!("{}", raw);
    }
}
