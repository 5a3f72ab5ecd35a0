mod host;
mod http;
mod kitsu;
mod mangadex;
mod reader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use manga_reader_core::log::{self, LogConfig, LogLevel};
use manga_reader_core::store::FileStore;
use manga_reader_core::{Keymap, OpenRequest, ReaderAddress, ReaderConfig, ReaderSession, SessionDeps};

use crate::host::TerminalHost;
use crate::http::HttpImageFetcher;
use crate::kitsu::KitsuClient;
use crate::mangadex::MangaDexClient;
use crate::reader::Reader;

const USAGE: &str = "usage: manga-reader [--verbose] [--config <file>] [--state <dir>] <manga>[?chapter=<id>&page=<n>]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    address: Option<ReaderAddress>,
    config: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    verbose: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    parsed.config = Some(args.next().context("--config needs a path")?.into());
                }
                "--state" => {
                    parsed.state_dir = Some(args.next().context("--state needs a directory")?.into());
                }
                "-v" | "--verbose" => parsed.verbose = true,
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ if parsed.address.is_some() => bail!("unexpected argument {arg}\n{USAGE}"),
                _ => parsed.address = Some(arg.parse()?),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    let Some(address) = args.address else {
        bail!(USAGE);
    };

    let mut log_config = LogConfig::default().with_prefix("manga-reader");
    if args.verbose {
        log_config = log_config.with_console_level(LogLevel::DEBUG);
    }
    if let Err(err) = log::init(log_config) {
        eprintln!("failed to initialise logging: {err:#}");
    }

    let config = match &args.config {
        Some(path) => ReaderConfig::load(path)?,
        None => ReaderConfig::load_default()?,
    };

    let store = match args.state_dir {
        Some(dir) => FileStore::new(dir)?,
        None => FileStore::open_default()?,
    };
    tracing::info!(root = %store.root().display(), "state store ready");

    let client = http::build_client()?;
    let (host, navigations) = TerminalHost::channel();
    let deps = SessionDeps {
        chapters: Arc::new(MangaDexClient::new(client.clone())),
        metadata: Arc::new(KitsuClient::new(client.clone())),
        images: Arc::new(HttpImageFetcher::new(client)),
        store: Arc::new(store),
        host: Arc::new(host),
    };
    let session = ReaderSession::new(config, deps);

    Reader::new(session, Keymap::default()).run(OpenRequest::from(&address), navigations).await
}
