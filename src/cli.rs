use clap::{Parser, Subcommand};
use std::path::PathBuf;

use urlstash::config::CredentialPolicy;

#[derive(Parser, Debug)]
#[command(name = "urlstash")]
#[command(about = "Cached URL retrieval", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a resource and emit its content
    Get(GetArgs),
    /// Read a resource and list the links discovered in it
    Links(LinksArgs),
    /// Remove the cached entry for a resource
    Clear(ClearArgs),
}

#[derive(clap::Args, Debug)]
pub struct CommonArgs {
    /// Resource identifier: URL or local path
    pub url: String,

    /// Enable the local cache
    #[arg(long)]
    pub cache: bool,

    /// Cache root, repeatable; order decides priority
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dirs: Vec<PathBuf>,

    /// Treat the body as raw bytes instead of text
    #[arg(long)]
    pub binary: bool,

    /// Credential escalation policy
    #[arg(long, value_enum, default_value = "optional")]
    pub auth: CredentialPolicy,

    /// Debug-level diagnostics
    #[arg(long, short)]
    pub verbose: bool,

    /// Append diagnostics to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Save to this file instead of resolving a cache path
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct LinksArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Emit the links as a JSON array
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}
