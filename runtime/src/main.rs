use clap::{Parser, Subcommand};
use listing_harvester::cli::{self, output::OutputMode, run_cmd::RunOptions};
use listing_harvester::config::OutputFormat;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "harvester", version, about = "Extract property listings from sitemap indexes")]
struct Cli {
    /// Machine-readable JSON output on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress and summaries
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one extraction job in the foreground
    Run {
        /// JSON job configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Category to extract: a built-in label or LABEL=SITEMAP_URL (repeatable)
        #[arg(long = "category", short = 'c')]
        categories: Vec<String>,

        /// Extract every built-in category
        #[arg(long)]
        all: bool,

        /// Output format: csv or json
        #[arg(long, short)]
        format: Option<OutputFormat>,

        /// Concurrent workers (1-64)
        #[arg(long, short)]
        workers: Option<usize>,

        /// Directory for output files and the job log
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// Start a new part file after this many rows per category
        #[arg(long)]
        max_rows_per_file: Option<u64>,
    },

    /// Serve the HTTP control surface
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        #[arg(long, short, default_value_t = 5000)]
        port: u16,
    },

    /// List the built-in category sitemaps
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("listing_harvester=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::output::init(OutputMode {
        json: args.json,
        quiet: args.quiet,
        no_color: args.no_color,
    });

    match args.command {
        Command::Run {
            config,
            categories,
            all,
            format,
            workers,
            output_dir,
            max_rows_per_file,
        } => {
            cli::run_cmd::run(RunOptions {
                config,
                categories,
                all,
                format,
                workers,
                output_dir,
                max_rows_per_file,
            })
            .await
        }
        Command::Serve { host, port } => cli::serve_cmd::run(host, port).await,
        Command::Categories => cli::categories_cmd::run(),
    }
}
