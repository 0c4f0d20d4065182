//! mongo-bootstrap - idempotent MongoDB schema bootstrapper

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::fmt::Display;
use std::process::ExitCode;
use tracing::{error, info};

use mongo_bootstrap::{
    bootstrap, check,
    config::{Args, OutputFormat},
    db::MongoStore,
    logging,
};

/// Exit status when --check finds missing entities
const EXIT_INCOMPLETE: u8 = 3;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format, args.output);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        return Ok(ExitCode::from(2));
    }

    let plan = match args.resolve_plan() {
        Ok(plan) => plan,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    info!("======================================");
    info!(
        "  mongo-bootstrap {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_SHORT"),
        env!("BUILD_TIMESTAMP")
    );
    info!("======================================");
    info!("MongoDB: {}", args.redacted_uri());
    info!("Database: {}", plan.database);
    match args.plan_file {
        Some(ref path) => info!("Plan: {}", path.display()),
        None => info!("Plan: preset {:?}", args.preset),
    }
    info!(
        "Steps: {} collection(s), {} user, {} index(es)",
        plan.collections.len(),
        usize::from(plan.user.is_some()),
        plan.indexes.len()
    );
    info!("Mode: {}", if args.check { "CHECK" } else { "APPLY" });
    info!("======================================");

    // Connection failure is the only fatal condition
    let store = match MongoStore::connect(args.uri(), &plan.database, args.connect_timeout()).await {
        Ok(store) => store,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    if args.check {
        let report = match check(&store, &plan).await {
            Ok(report) => report,
            Err(e) => {
                error!("Check failed: {}", e);
                return Ok(ExitCode::from(e.exit_code()));
            }
        };
        emit(args.output, &report)?;
        return Ok(if report.is_complete() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_INCOMPLETE)
        });
    }

    let report = match bootstrap(&store, plan).await {
        Ok(report) => report,
        Err(e) => {
            error!("Bootstrap aborted: {}", e);
            return Ok(ExitCode::from(e.exit_code()));
        }
    };
    emit(args.output, &report)?;

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Write the final report to stdout
fn emit<T>(format: OutputFormat, report: &T) -> anyhow::Result<()>
where
    T: Serialize + Display,
{
    match format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}
