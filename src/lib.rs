#![warn(clippy::all)]

//! Parallel sparse Conway's Game of Life engine.
//!
//! The engine simulates Life on an effectively unbounded 2^32 x 2^32 torus
//! at high throughput for large, long-running patterns. Per generation it
//! runs two barrier-synchronised parallel phases over a lock-free
//! multi-producer spatial hash, while 4x4 tiles that saw no births or
//! deaths in the previous generation are skipped entirely and their cells
//! carried over untouched.
//!
//! ```no_run
//! use sparselife::{EngineConfig, Pattern, SparseLifeEngine};
//!
//! let mut engine = SparseLifeEngine::new(EngineConfig::default()).unwrap();
//! let glider = Pattern::from_rle(b"bo$2bo$3o!").unwrap();
//! engine.load_pattern(&glider).unwrap();
//! engine.step_n(1000);
//! println!("population {}", engine.population());
//! ```

mod config;
mod display;
mod engine;
mod naive;
mod pattern;
mod point;
mod traits;

pub use config::EngineConfig;
pub use engine::SparseLifeEngine;
pub use naive::NaiveLife;
pub use pattern::Pattern;
pub use point::{Point, ORIGIN};
pub use traits::LifeEngine;

pub const VERSION: &str = "1.0";
