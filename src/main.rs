mod app;
mod cache;
mod cli;
mod collision;
mod constants;
mod data;
mod debug;
mod draw;
mod error;
mod factory;
mod gameobj;
mod gameplay;
mod geometry;
mod input;
mod mission;
mod physics;
mod scheduler;
mod sim;
mod util;

use clap::Parser;

fn main() {
    // Invalid flag combinations exit here, before any window or data is touched
    let cli = cli::Cli::parse();

    env_logger::init();
    log::info!("Orbit Ribbon starting up");

    if let Err(e) = app::run(&cli) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
    log::info!("Orbit Ribbon exited cleanly");
}
