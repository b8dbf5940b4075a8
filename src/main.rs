use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mtproxy_harvester::{
    checkpoint::CheckpointWriter,
    config::HarvestConfig,
    logging,
    proxy::{default_catalog, load_catalog, CrawlerConfig, ProxyParser},
    shutdown::spawn_signal_listener,
    stats::Statistics,
    store::RecordStore,
    Harvester,
};
use std::path::PathBuf;
use std::time::Duration;

/// Continuously harvests MTProto proxies from public sources
#[derive(Parser)]
#[command(name = "mtproxy-harvester")]
#[command(about = "Continuously harvests MTProto proxies from public sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the source catalog in cycles until interrupted (default)
    Run(RunArgs),
    /// Extract proxies from a local file
    Parse {
        /// File to scan
        input: PathBuf,
        /// Write a JSON checkpoint here (only the requested files are written)
        #[arg(long)]
        json_output: Option<PathBuf>,
        /// Write a plain-text checkpoint here (only the requested files are written)
        #[arg(long)]
        txt_output: Option<PathBuf>,
    },
    /// Print the effective source catalog
    Sources {
        /// File containing source URLs (one per line)
        #[arg(short = 'f', long)]
        url_file: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// File containing source URLs (one per line); replaces the built-in catalog
    #[arg(short = 'f', long)]
    url_file: Option<PathBuf>,
    /// JSON checkpoint path [default: proxies.json]
    #[arg(long)]
    json_output: Option<PathBuf>,
    /// Plain-text checkpoint path [default: proxies.txt]
    #[arg(long)]
    txt_output: Option<PathBuf>,
    /// URLs fetched concurrently per batch [default: 20]
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,
    /// Ceiling on concurrent fetches [default: 50]
    #[arg(short = 'n', long)]
    max_workers: Option<usize>,
    /// Total request timeout in seconds [default: 25]
    #[arg(long)]
    timeout: Option<u64>,
    /// Minimum seconds between checkpoints [default: 10]
    #[arg(long)]
    save_interval: Option<u64>,
    /// Minimum seconds between statistics displays [default: 30]
    #[arg(long)]
    stats_interval: Option<u64>,
    /// Seconds to pause between cycles [default: 8]
    #[arg(long)]
    pause: Option<u64>,
    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,
    /// Disable the random delays before fetches and between launches
    #[arg(long)]
    no_throttle: bool,
    /// Verify TLS certificates of sources
    #[arg(long)]
    strict_tls: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::new()
            .with_throttle(!self.no_throttle)
            .with_max_cycles(self.cycles);

        if let Some(path) = &self.url_file {
            let sources = load_catalog(path)
                .with_context(|| format!("failed to read URL file {:?}", path))?;
            config = config.with_sources(sources);
        }
        if let Some(path) = self.json_output {
            config.json_path = path;
        }
        if let Some(path) = self.txt_output {
            config.txt_path = path;
        }
        if let Some(size) = self.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(workers) = self.max_workers {
            config = config.with_max_workers(workers);
        }
        if let Some(secs) = self.save_interval {
            config = config.with_save_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.stats_interval {
            config = config.with_stats_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.pause {
            config = config.with_cycle_pause(Duration::from_secs(secs));
        }

        let mut crawler = CrawlerConfig::new().with_accept_invalid_certs(!self.strict_tls);
        if let Some(secs) = self.timeout {
            crawler = crawler.with_timeout(Duration::from_secs(secs));
        }

        Ok(config.with_crawler(crawler))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli
        .command
        .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    {
        Commands::Run(args) => {
            let harvester = Harvester::new(args.into_config()?)?;
            let listener = spawn_signal_listener(harvester.cancellation_token());

            let snapshot = harvester.run().await;
            listener.await?;

            println!("{}", snapshot);
        }
        Commands::Parse {
            input,
            json_output,
            txt_output,
        } => {
            let proxies = ProxyParser::new()
                .parse_file(&input)
                .with_context(|| format!("failed to read {:?}", input))?;

            println!("Parsed {} proxies from {:?}", proxies.len(), input);

            if json_output.is_none() && txt_output.is_none() {
                for proxy in &proxies {
                    println!("{}", proxy);
                }
                return Ok(());
            }

            let store = RecordStore::new();
            let stats = Statistics::new();
            stats.record_processed_url();
            stats.record_merge(&store.merge(proxies));

            let writer = CheckpointWriter::with_outputs(json_output, txt_output);
            let summary = writer.write(&store, &stats)?;
            for path in [writer.json_path(), writer.txt_path()].into_iter().flatten() {
                println!("Saved {} proxies to {:?}", summary.written, path);
            }
        }
        Commands::Sources { url_file } => {
            let sources = match url_file {
                Some(path) => load_catalog(&path)
                    .with_context(|| format!("failed to read URL file {:?}", path))?,
                None => default_catalog(),
            };

            for (index, url) in sources.iter().enumerate() {
                println!("{:3}. {}", index + 1, url);
            }
            println!("\n{} sources", sources.len());
        }
    }

    Ok(())
}
