use std::sync::Arc;

use clap::{Parser, Subcommand};
use spotlens::{
    parse_range, ByteRangeFetcher, FeatureAndGroup, FeatureValues, FetchConfig, Hydrate,
    HttpFetcher, LocalDirectory, RetrievalConfig, Sample,
};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "spotlens CLI - query features of remote or local spatial-omics samples")]
struct Cli {
    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List coordinate sets and feature sources of a sample
    Info {
        /// URL of `sample.json`, or a local folder containing it
        sample: String,
    },
    /// Retrieve one feature
    Query {
        /// URL of `sample.json`, or a local folder containing it
        sample: String,

        /// Feature source, or `Misc` for plain tables
        #[arg(long)]
        group: String,

        #[arg(long)]
        feature: String,

        /// Print at most this many values
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Fetch a raw byte range
    Range {
        url: String,

        /// Byte range (format: start:end)
        #[arg(long)]
        range: String,
    },
}

async fn open_sample(sample: &str, fetcher: Arc<HttpFetcher>) -> spotlens::Result<Sample> {
    let config = RetrievalConfig::default();
    if std::path::Path::new(sample).is_dir() {
        Sample::load_local(LocalDirectory::open(sample)?, fetcher, config).await
    } else {
        Sample::load(sample, fetcher, config).await
    }
}

async fn handle_info(sample: &Sample) -> spotlens::Result<()> {
    sample.hydrate().await?;
    println!("Sample: {}", sample.name());
    if let Some(image) = sample.image() {
        println!("  image scale: {:?} m/px", image.m_per_px());
    }
    for name in sample.coord_names() {
        let len = sample.coords(name).and_then(|coords| coords.len());
        println!("  coords `{name}`: {len:?} positions");
    }
    for group in sample.groups() {
        let Some(source) = sample.source(group) else {
            continue;
        };
        let names = source.feature_names().unwrap_or_default();
        let preview: Vec<_> = names.iter().take(5).collect();
        println!(
            "  features `{group}` ({}): {} features, e.g. {preview:?}",
            source.data_type(),
            names.len()
        );
    }
    Ok(())
}

async fn handle_query(sample: &Sample, fg: &FeatureAndGroup, limit: usize) -> spotlens::Result<()> {
    let Some(result) = sample.get_feature(fg).await? else {
        println!("{fg}: not found");
        return Ok(());
    };

    println!("{fg} on `{}` ({})", result.coords.name(), result.data_type);
    println!("  positions: {}", result.data.len());
    println!("  range: {:?} {}", result.minmax, result.unit.as_deref().unwrap_or(""));
    match result.data.as_ref() {
        FeatureValues::Quantitative(values) => {
            println!("  values: {:?}", &values[..limit.min(values.len())])
        }
        FeatureValues::Categorical(labels) => {
            println!("  labels: {:?}", &labels[..limit.min(labels.len())])
        }
    }
    Ok(())
}

async fn handle_range(fetcher: &HttpFetcher, url: &str, range: &str) -> Result<(), Box<dyn std::error::Error>> {
    let range = parse_range(range).map_err(|e| e.to_string())?;
    if !url.starts_with("file://") && !fetcher.supports_range_requests(url).await? {
        println!("warning: server does not advertise byte ranges");
    }
    let bytes = fetcher.fetch_range(url, range.clone()).await?;
    println!("{} bytes from {url} [{}, {})", bytes.len(), range.start, range.end);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    let mut fetch = FetchConfig::default().with_user_agent("spotlens-cli");
    if let Some(secs) = cli.timeout {
        fetch = fetch.with_timeout(std::time::Duration::from_secs(secs));
    }
    let fetcher = Arc::new(HttpFetcher::with_config(&fetch)?);

    match &cli.command {
        Commands::Info { sample } => {
            let sample = open_sample(sample, fetcher).await?;
            handle_info(&sample).await?;
        }
        Commands::Query {
            sample,
            group,
            feature,
            limit,
        } => {
            let sample = open_sample(sample, fetcher).await?;
            handle_query(&sample, &FeatureAndGroup::new(group, feature), *limit).await?;
        }
        Commands::Range { url, range } => {
            handle_range(&fetcher, url, range).await?;
        }
    }

    let elapsed = start_time.elapsed();
    println!("Completed in {elapsed:.2?}");

    Ok(())
}
