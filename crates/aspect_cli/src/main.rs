//! CLI probe for the aspect store.
//!
//! # Responsibility
//! - Load (or create) the engine config in a directory and open the store.
//! - Print the crate version and every persisted catalog id.

use aspect_core::{
    core_version, init_logging_from_config, open_from_config, CatalogRepository, EngineConfig,
    PersistenceContext, SqliteCatalogRepository,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

fn run(base_dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::load_or_init(&base_dir)?;
    if let Some(logging) = &config.logging {
        init_logging_from_config(logging)?;
    }

    let conn = open_from_config(&config, &base_dir)?;
    let ctx = PersistenceContext::from_config(&config);
    let repo = SqliteCatalogRepository::try_new(&conn, &ctx)?;
    let ids = repo.list_catalog_ids()?;
    info!(
        "event=cli_list module=cli status=ok backend={} catalogs={}",
        config.backend_name(),
        ids.len()
    );

    println!("aspect_core version={}", core_version());
    println!("backend={} catalogs={}", config.backend_name(), ids.len());
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let base_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    match run(base_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("aspect_cli: {err}");
            ExitCode::FAILURE
        }
    }
}
