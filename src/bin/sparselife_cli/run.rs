use anyhow::{anyhow, Result};
use clap::Args;
use sparselife::{EngineConfig, Pattern, SparseLifeEngine};

#[derive(Args, Debug)]
pub(super) struct RunArgs {
    /// Path to the pattern file; supports .rle and .rle.gz formats
    pattern: Option<String>,

    /// Fill a box with a random soup instead of loading a pattern file
    #[arg(long, conflicts_with = "pattern")]
    random: Option<u32>,

    /// Live-cell probability for --random
    #[arg(long, default_value_t = 0.3)]
    density: f64,

    /// The number of worker threads to use, default is one per core
    #[arg(short, long)]
    threads: Option<usize>,

    /// Edge length of a static-region tile; must be a power of two
    #[arg(short, long, default_value_t = 4)]
    static_size: u32,

    /// Round-robin chunk length for the cell-resolution phase
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,
}

pub(super) fn run_run(args: RunArgs) -> Result<()> {
    let pattern = match (&args.pattern, args.random) {
        (Some(path), _) => Pattern::from_file(path)?,
        (None, Some(extent)) => Pattern::random(extent, extent, args.density, None),
        (None, None) => {
            return Err(anyhow!("either a pattern file or --random is required"));
        }
    };

    let mut config = EngineConfig::default()
        .static_size(args.static_size)
        .chunk_size(args.chunk_size);
    if let Some(threads) = args.threads {
        config = config.threads(threads);
    }

    let mut engine = SparseLifeEngine::new(config)?;
    engine.load_pattern(&pattern)?;
    engine.run_interactive()
}
