mod cli;

use clap::Parser;
use cli::{Cli, Commands, CommonArgs};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use urlstash::config::Options;
use urlstash::resource::Resource;

type MainResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn main() -> MainResult {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let common = match &cli.command {
        Commands::Get(args) => &args.common,
        Commands::Links(args) => &args.common,
        Commands::Clear(args) => &args.common,
    };
    init_tracing(common.verbose, common.log.as_deref())?;

    run(cli)
}

fn run(cli: Cli) -> MainResult {
    match cli.command {
        Commands::Get(args) => {
            let opts = options_from(&args.common, args.output.clone());
            let mut resource = Resource::new(&args.common.url, opts)?;
            let content = resource.read()?;
            if args.output.is_none() {
                std::io::stdout().write_all(content.as_bytes())?;
            }
        }
        Commands::Links(args) => {
            let opts = options_from(&args.common, None);
            let mut resource = Resource::new(&args.common.url, opts)?;
            resource.read()?;
            if args.json {
                let urls: Vec<String> = resource
                    .links()
                    .iter()
                    .map(|link| link.url().to_string())
                    .collect();
                println!("{}", serde_json::to_string_pretty(&urls)?);
            } else {
                for link in resource.links() {
                    println!("{}", link.url());
                }
            }
        }
        Commands::Clear(args) => {
            let opts = options_from(&args.common, None);
            let mut resource = Resource::new(&args.common.url, opts)?;
            resource.clear();
        }
    }

    Ok(())
}

fn options_from(common: &CommonArgs, output: Option<PathBuf>) -> Options {
    let cache_roots = if common.cache_dirs.is_empty() {
        Options::default().cache_roots
    } else {
        common.cache_dirs.clone()
    };
    Options {
        ofile: output,
        binary: common.binary,
        cache: common.cache,
        cache_roots,
        credential_policy: common.auth,
        credentials: None,
        verbose: common.verbose,
        log: common.log.clone(),
    }
}

fn init_tracing(verbose: bool, log: Option<&Path>) -> MainResult {
    let default = if verbose {
        "urlstash=debug"
    } else {
        "urlstash=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match log {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
