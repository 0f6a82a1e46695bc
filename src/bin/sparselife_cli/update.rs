use anyhow::Result;
use chrono::Local;
use clap::Args;
use num_format::{CustomFormat, Grouping, ToFormattedString};
use sparselife::{EngineConfig, Pattern, SparseLifeEngine};

#[derive(Args, Debug)]
pub(super) struct UpdateArgs {
    /// Path to the pattern file; supports .rle and .rle.gz formats
    pattern: String,

    /// Path to the file where the resulting pattern will be saved
    #[arg(short, long)]
    output: String,

    /// How many generations to simulate
    #[arg(short, long)]
    generations: u64,

    /// The number of worker threads to use, default is one per core
    #[arg(short, long)]
    threads: Option<usize>,

    /// Edge length of a static-region tile; must be a power of two
    #[arg(short, long, default_value_t = 4)]
    static_size: u32,

    /// Count population of the resulting pattern
    #[arg(short, long)]
    population: bool,
}

fn stamp() -> impl std::fmt::Display {
    Local::now().format("%H:%M:%S%.3f")
}

pub(super) fn run_update(args: UpdateArgs) -> Result<()> {
    let mut config = EngineConfig::default().static_size(args.static_size);
    if let Some(threads) = args.threads {
        config = config.threads(threads);
    }
    let mut engine = SparseLifeEngine::new(config)?;

    let timer = std::time::Instant::now();
    let pattern = Pattern::from_file(&args.pattern)?;
    engine.load_pattern(&pattern)?;
    println!(
        "[{}] Loaded pattern in {:.1} secs",
        stamp(),
        timer.elapsed().as_secs_f64()
    );

    let timer = std::time::Instant::now();
    // Report roughly every 5% so million-generation runs stay observable.
    let report_every = (args.generations / 20).max(1);
    let mut done = 0;
    while done < args.generations {
        let batch = report_every.min(args.generations - done);
        engine.step_n(batch);
        done += batch;
        println!(
            "[{}] Updated by {} out of {} generations",
            stamp(),
            done,
            args.generations
        );
    }
    let elapsed = timer.elapsed().as_secs_f64();
    println!(
        "[{}] Updated pattern by {} generations in {:.1} secs ({:.0} gen/s), births {} deaths {}",
        stamp(),
        args.generations,
        elapsed,
        args.generations as f64 / elapsed.max(f64::EPSILON),
        engine.births(),
        engine.deaths(),
    );

    let updated = engine.current_state();
    if args.population {
        let groups = CustomFormat::builder()
            .grouping(Grouping::Standard)
            .separator("_")
            .build()?;
        println!(
            "Population: {}",
            updated.population().to_formatted_string(&groups)
        );
    }
    updated.to_file(&args.output)
}
