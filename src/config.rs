use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "logscope", about = "Browse CloudWatch log groups, streams and events")]
pub struct Config {
    /// Address the web interface listens on.
    #[arg(
        long = "bind",
        alias = "bind-addr",
        env = "LOGSCOPE_BIND",
        value_name = "ADDR",
        default_value = "127.0.0.1:8000"
    )]
    pub bind_addr: SocketAddr,

    /// JSON document holding favorite groups and streams.
    #[arg(
        long = "favorites",
        env = "LOGSCOPE_FAVORITES",
        value_name = "FILE",
        default_value = "favorites.json"
    )]
    pub favorites_path: PathBuf,

    /// AWS region override; defaults to the usual AWS configuration chain.
    #[arg(long, env = "AWS_REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// Named AWS profile to load credentials from.
    #[arg(long, env = "AWS_PROFILE", value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Number of log groups listed on the start page.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(i32).range(1..=50))]
    pub group_limit: i32,

    /// Number of streams listed per group, most recently active first.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(i32).range(1..=50))]
    pub stream_limit: i32,
}
