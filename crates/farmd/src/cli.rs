use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "farmd", version, about = "Print-farm coordinator daemon")]
pub struct Cli {
    /// TOML configuration file. Values here are overridden by the flags below.
    #[arg(long, env = "FARMD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the operator REST API binds to, overriding the config file.
    #[arg(long, env = "FARMD_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// `tracing-subscriber` env-filter directive, e.g. "info" or "farm_engine=debug".
    #[arg(long, env = "FARMD_LOG", default_value = "info")]
    pub log: String,
}
