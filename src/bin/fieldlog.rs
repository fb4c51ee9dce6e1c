//! `fieldlog`: run one logged field operation described by a config file.
//!
//! Usage:
//!   fieldlog <config.json>
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use fieldlog::{Config, Engine, JsonlProcessLog, JsonlStore};
use log::{error, info};

fn run(config_path: &str) -> fieldlog::Result<()> {
    let config = Config::load(config_path)?;
    info!(
        "{} on {} by {}",
        config.command.operation(),
        config.collection,
        config.name
    );

    let store = JsonlStore::open(&config.data_dir, &config.collection)?;
    let processes = JsonlProcessLog::open(&config.data_dir)?;
    let mut engine = Engine::builder(store, processes)
        .actor(&config.name)
        .method(&config.method)
        .collection(&config.collection)
        .build();

    for report in config.command.execute(&mut engine)? {
        println!("{report}");
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(config_path) = args.get(1) else {
        eprintln!("usage: fieldlog <config.json>");
        std::process::exit(2);
    };

    if let Err(e) = run(config_path) {
        error!("{e}");
        std::process::exit(1);
    }
}
