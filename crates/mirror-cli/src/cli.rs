//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;

use crate::config::{MirrorConfig, parse_mirror};

/// Mirror etcd subtrees into local directories and keep them up to date
#[derive(Parser, Debug)]
#[command(name = "etcd-mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror a subtree into a directory; may be repeated
    ///
    /// Example: --mirror /stiitops=/run/power/stiitops
    #[arg(short, long = "mirror", value_name = "SUBTREE=DIR", value_parser = parse_mirror)]
    pub mirrors: Vec<MirrorConfig>,

    /// etcd host
    #[arg(long, env = "ETCD_HOST")]
    pub etcd_host: Option<String>,

    /// etcd client port
    #[arg(long, env = "ETCD_PORT")]
    pub etcd_port: Option<u16>,

    /// Full etcd endpoint URL; overrides host and port
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
