pub mod cli;
pub mod data;
pub mod depara;
pub mod error;
pub mod fuzzy;
pub mod io_utils;
pub mod join;
pub mod preview;
pub mod reader;
pub mod table;
pub mod writer;

pub mod transform {
    pub mod string_ops;
}

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Merge(args) => join::execute(&args),
        Commands::Depara(args) => depara::execute(&args),
        Commands::Fuzzy(args) => fuzzy::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}
