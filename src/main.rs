mod api;
mod database;
mod error;
mod filter;
mod rest;
mod seed;
mod settings;
mod web;

use std::{process::exit, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    database::Database,
    filter::Catalog,
    settings::{Args, Settings},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{error:#}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("cannot load settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log.level)),
        )
        .init();

    let catalog = Arc::new(Catalog::ticket_fields().context("invalid field catalog")?);

    let path = settings.database.resolved_path()?;
    let db = Database::connect(&path)?;
    info!(path = %path.display(), "database opened");
    if settings.database.seed && db.is_empty() {
        seed::seed(&db, &catalog).context("cannot seed the database")?;
    }

    let schema = api::schema(db.clone(), catalog.clone());
    web::serve(schema, db, catalog, settings.web.address, args.tls()).await;
    Ok(())
}
