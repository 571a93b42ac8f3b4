use std::path::PathBuf;

use clap::Parser;

use crate::constants::DEFAULT_DATA_PATH;

#[derive(Parser, Debug)]
#[command(name = "orbit-ribbon", version, about = "Physics-driven 3D orbital platformer")]
pub struct Cli {
    /// Start in fullscreen mode.
    #[arg(long, conflicts_with = "windowed")]
    pub fullscreen: bool,

    /// Start in a window (the default).
    #[arg(long)]
    pub windowed: bool,

    /// Area to start in, numbered from 1. Requires --mission.
    #[arg(long, requires = "mission", value_parser = clap::value_parser!(u32).range(1..))]
    pub area: Option<u32>,

    /// Mission to start, numbered from 1. Requires --area.
    #[arg(long, requires = "area", value_parser = clap::value_parser!(u32).range(1..))]
    pub mission: Option<u32>,

    /// Scenario data file.
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    pub data: PathBuf,
}

impl Cli {
    /// (area, mission) to load first.
    pub fn selection(&self) -> (usize, usize) {
        match (self.area, self.mission) {
            (Some(a), Some(m)) => (a as usize, m as usize),
            _ => (1, 1),
        }
    }
}
