use crate::point::ORIGIN;
use anyhow::{anyhow, Result};

/// Configuration for a [`SparseLifeEngine`](crate::SparseLifeEngine) instance.
///
/// Use `EngineConfig::default()` for auto-tuned defaults, or customise
/// individual knobs via the builder methods. Validation happens once when
/// the engine is built; a bad combination is a startup error, never a
/// runtime one.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of worker threads. `None` means auto-detect from the number
    /// of available cores.
    pub threads: Option<usize>,
    /// Edge length of a static-region tile; must be a power of two.
    /// 4 is optimal for most patterns, 2 and 8 are acceptable.
    pub static_size: u32,
    /// Round-robin block length used when resolving arena cells.
    pub chunk_size: usize,
    /// Initial arena and alive-set capacity, in multiples of `chunk_size`.
    pub num_chunks: usize,
    /// World anchor for loaded patterns; keep near 2^30.
    pub origin: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            static_size: 4,
            chunk_size: 1000,
            num_chunks: 64,
            origin: ORIGIN,
        }
    }
}

impl EngineConfig {
    /// Set an explicit worker thread count.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    /// Set the static-region tile edge length.
    pub fn static_size(mut self, size: u32) -> Self {
        self.static_size = size;
        self
    }

    /// Set the cell-resolution chunk length.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the initial capacity multiplier.
    pub fn num_chunks(mut self, n: usize) -> Self {
        self.num_chunks = n;
        self
    }

    /// Set the world anchor.
    pub fn origin(mut self, origin: u32) -> Self {
        self.origin = origin;
        self
    }

    /// Validate and freeze the configuration.
    pub(crate) fn resolve(&self) -> Result<ResolvedConfig> {
        let threads = match self.threads {
            Some(0) => return Err(anyhow!("thread count must be at least 1")),
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };
        if !self.static_size.is_power_of_two() {
            return Err(anyhow!(
                "static_size {} is not a power of two",
                self.static_size
            ));
        }
        if !(2..=256).contains(&self.static_size) {
            return Err(anyhow!(
                "static_size {} is outside the supported range [2, 256]",
                self.static_size
            ));
        }
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be at least 1"));
        }
        Ok(ResolvedConfig {
            threads,
            static_mask: self.static_size - 1,
            chunk_size: self.chunk_size,
            num_chunks: self.num_chunks.max(1),
            origin: self.origin,
        })
    }
}

/// Validated configuration as consumed by the engine.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedConfig {
    pub threads: usize,
    /// `static_size - 1`; ORing a coordinate with the mask yields the tile
    /// representative, ANDing yields the position within the tile.
    pub static_mask: u32,
    pub chunk_size: usize,
    pub num_chunks: usize,
    pub origin: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves() {
        let cfg = EngineConfig::default().resolve().unwrap();
        assert!(cfg.threads >= 1);
        assert_eq!(cfg.static_mask, 3);
    }

    #[test]
    fn rejects_zero_threads() {
        assert!(EngineConfig::default().threads(0).resolve().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_tiles() {
        assert!(EngineConfig::default().static_size(6).resolve().is_err());
        assert!(EngineConfig::default().static_size(0).resolve().is_err());
    }
}
