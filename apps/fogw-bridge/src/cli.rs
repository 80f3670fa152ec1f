use crate::units::UnitSystem;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fogw-bridge",
    version,
    about = "Poll a Fine Offset WiFi weather gateway and print canonical records"
)]
pub struct Args {
    /// JSON config file; overrides FOGW_CONFIG_PATH.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub unit_system: Option<UnitSystem>,
    /// Poll once, print the record and exit.
    #[arg(long, default_value_t = false)]
    pub once: bool,
}
