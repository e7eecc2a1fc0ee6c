//! bitcaskv CLI
//!
//! One-shot command-line access to a store directory.

use std::path::PathBuf;
use std::process;

use bitcaskv::{Config, MergeStrategy, Segment, Store, HashStore, SortedStore};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// bitcaskv CLI
#[derive(Parser, Debug)]
#[command(name = "bitcaskv-cli")]
#[command(about = "CLI for the bitcaskv embedded key-value store")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./bitcaskv_data")]
    data_dir: PathBuf,

    /// Segment variant the store was created with
    #[arg(short, long, value_enum, default_value_t = Variant::Hash)]
    variant: Variant,

    /// Segment size in KiB before rolling over
    #[arg(short = 's', long, default_value = "8")]
    max_segment_kb: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Full in-memory hash index
    Hash,
    /// Sorted segments with a sparse index
    Sorted,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Merge the oldest original segments once
    Compact,

    /// Show segment versions and sizes
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,bitcaskv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .max_segment_size(args.max_segment_kb * 1024)
        .compaction_enabled(false)
        .build();

    let result = match args.variant {
        Variant::Hash => HashStore::open(config).and_then(|store| run(store, args.command)),
        Variant::Sorted => SortedStore::open(config).and_then(|store| run(store, args.command)),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run<S: Segment, M: MergeStrategy<S>>(store: Store<S, M>, command: Commands) -> bitcaskv::Result<()> {
    match command {
        Commands::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            store.put(&key, &value)?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.remove(&key)?;
            println!("OK");
        }
        Commands::Compact => match store.compact()? {
            Some(version) => println!("compacted into segment {}", version),
            None => println!("nothing to compact"),
        },
        Commands::Stats => {
            println!("directory:      {}", store.data_dir().display());
            println!("frozen:         {:?}", store.frozen_versions());
            println!("active:         {}", store.active_version());
            println!("total bytes:    {}", store.total_size());
        }
    }

    store.close()
}
