use anyhow::Result;
use clap::Args;
use num_format::{CustomFormat, Grouping, ToFormattedString};
use sparselife::{Pattern, ORIGIN};

#[derive(Args, Debug)]
pub(super) struct StatsArgs {
    /// Path to the pattern file; supports .rle and .rle.gz formats
    pattern: String,
}

pub(super) fn run_stats(args: StatsArgs) -> Result<()> {
    let pattern = Pattern::from_file(&args.pattern)?;

    let groups = CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator("_")
        .build()?;
    println!(
        "Population: {}",
        pattern.population().to_formatted_string(&groups)
    );

    match pattern.bounding_box() {
        Some((min_x, min_y, max_x, max_y)) => {
            println!(
                "Bounding box: ({}, {}) to ({}, {}) [{} x {}]",
                min_x.wrapping_sub(ORIGIN) as i32,
                min_y.wrapping_sub(ORIGIN) as i32,
                max_x.wrapping_sub(ORIGIN) as i32,
                max_y.wrapping_sub(ORIGIN) as i32,
                max_x - min_x + 1,
                max_y - min_y + 1,
            );
        }
        None => println!("Bounding box: empty"),
    }
    println!("Hash: {:016x}", pattern.hash());
    Ok(())
}
