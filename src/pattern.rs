//! Sparse cell patterns and their serialized forms.
//!
//! A [`Pattern`] is a flat list of world points, anchored so that row 0,
//! column 0 of the source text lands on the configured origin. The
//! interchange format is [Extended RLE](https://golly.sourceforge.io/Help/formats.html#rle)
//! with optional gzip compression for `.gz` files; only two-state B3/S23
//! patterns are accepted.

use crate::point::{Point, ORIGIN};
use anyhow::{anyhow, Context, Result};
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use rand::{Rng, SeedableRng};
use std::io::Read;
use std::path::Path;

/// A set of live cells in world coordinates, kept sorted row-major.
#[derive(Clone, Debug, Default)]
pub struct Pattern {
    cells: Vec<Point>,
}

impl Pattern {
    /// Wrap raw world points. Duplicates are removed so population and
    /// comparison semantics stay set-like.
    pub fn from_points(mut cells: Vec<Point>) -> Self {
        cells.sort_unstable_by_key(|p| p.packed());
        cells.dedup();
        Self { cells }
    }

    pub fn points(&self) -> &[Point] {
        &self.cells
    }

    /// Number of live cells.
    pub fn population(&self) -> u64 {
        self.cells.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Smallest rectangle containing every live cell, as
    /// `(min_x, min_y, max_x, max_y)`. `None` for a blank pattern.
    pub fn bounding_box(&self) -> Option<(u32, u32, u32, u32)> {
        let first = self.cells.first()?;
        let (mut min_x, mut max_x) = (first.x, first.x);
        let (mut min_y, mut max_y) = (first.y, first.y);
        for p in &self.cells {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some((min_x, min_y, max_x, max_y))
    }

    /// 64-bit digest for fast probabilistic comparison of populations.
    /// Identical cell sets hash identically regardless of input order.
    pub fn hash(&self) -> u64 {
        let combine = |x: u64, y: u64| -> u64 {
            x ^ y
                .wrapping_add(0x9e3779b9)
                .wrapping_add(x << 6)
                .wrapping_add(x >> 2)
        };
        self.cells
            .iter()
            .fold(self.cells.len() as u64, |acc, p| combine(acc, p.packed()))
    }

    /// Create a random pattern anchored at `ORIGIN`.
    ///
    /// `density` is the live probability per cell; `seed` of `None` seeds
    /// from the OS.
    pub fn random(width: u32, height: u32, density: f64, seed: Option<u64>) -> Self {
        let mut rng = if let Some(x) = seed {
            rand_chacha::ChaCha8Rng::seed_from_u64(x)
        } else {
            rand_chacha::ChaCha8Rng::from_os_rng()
        };
        let mut cells = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if rng.random::<f64>() < density {
                    cells.push(Point::new(ORIGIN + x, ORIGIN + y));
                }
            }
        }
        Self::from_points(cells)
    }

    /// Read a pattern from a file; `.gz` suffixes are decompressed first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read pattern file {}", path.display()))?;
        if path.extension().is_some_and(|e| e == "gz") {
            let mut decoder = GzDecoder::new(&data[..]);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .context("failed to decompress pattern data")?;
            Self::from_rle(&decompressed)
        } else {
            Self::from_rle(&data)
        }
    }

    /// Write the pattern to a file; `.gz` suffixes are compressed.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let rle = self.to_rle()?;
        let data = if path.extension().is_some_and(|e| e == "gz") {
            let mut encoder = GzEncoder::new(&rle[..], Compression::default());
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .context("failed to compress pattern data")?;
            compressed
        } else {
            rle
        };
        std::fs::write(path, data)
            .with_context(|| format!("failed to write pattern file {}", path.display()))
    }

    /// Parse Extended RLE. Grammar: `b` = dead, `o` = alive, digit
    /// run-lengths precede either, `$` ends a row, `!` ends the pattern.
    /// The optional header carries the extent and rule; `#` lines are
    /// comments. Row 0, column 0 anchors at `ORIGIN`.
    pub fn from_rle(data: &[u8]) -> Result<Self> {
        let mut lines = data
            .split(|&b| b == b'\n')
            .map(|x| x.strip_suffix(b"\r").unwrap_or(x))
            .filter(|x| !x.is_empty() && x[0] != b'#')
            .peekable();

        let mut declared: Option<(usize, usize)> = None;
        if lines.peek().is_some_and(|line| line.starts_with(b"x")) {
            declared = Some(Self::parse_header(lines.next().unwrap())?);
        }

        let mut cells = Vec::new();
        let mut x = 0usize;
        let mut y = 0usize;
        let mut count = 0usize;
        let mut done = false;

        'outer: for line in lines {
            for &b in line {
                match b {
                    b'0'..=b'9' => count = count * 10 + (b - b'0') as usize,
                    b'b' => {
                        x += if count == 0 { 1 } else { count };
                        count = 0;
                    }
                    b'o' => {
                        let c = if count == 0 { 1 } else { count };
                        for i in 0..c {
                            if let Some((width, height)) = declared {
                                if x + i >= width || y >= height {
                                    return Err(anyhow!(
                                        "pattern data out of bounds: x = {}, y = {}",
                                        x + i,
                                        y
                                    ));
                                }
                            }
                            cells.push(Point::new(
                                ORIGIN.wrapping_add((x + i) as u32),
                                ORIGIN.wrapping_add(y as u32),
                            ));
                        }
                        x += c;
                        count = 0;
                    }
                    b'$' => {
                        y += if count == 0 { 1 } else { count };
                        x = 0;
                        count = 0;
                    }
                    b'!' => {
                        done = true;
                        break 'outer;
                    }
                    b' ' | b'\t' => continue,
                    _ => return Err(anyhow!("invalid RLE character: '{}'", b as char)),
                }
                if let Some((width, _)) = declared {
                    if x > width {
                        return Err(anyhow!("pattern data out of bounds: x = {x}, y = {y}"));
                    }
                }
            }
        }
        if !done {
            return Err(anyhow!("missing '!' pattern terminator"));
        }
        Ok(Self::from_points(cells))
    }

    fn parse_header(line: &[u8]) -> Result<(usize, usize)> {
        let mut parts = line.split(|&b| b == b',').map(|x| x.trim_ascii());

        let extract_value = |part: &[u8], expected_key: &[u8]| -> Result<Vec<u8>> {
            let mut items = part.split(|&b| b == b'=');
            let key = items.next().unwrap_or(&[]).trim_ascii_end();
            if key != expected_key {
                return Err(anyhow!(
                    "invalid header: expected {}, got {}",
                    String::from_utf8_lossy(expected_key),
                    String::from_utf8_lossy(key)
                ));
            }
            Ok(items.next().unwrap_or(&[]).trim_ascii_start().to_vec())
        };

        let value = extract_value(
            parts
                .next()
                .ok_or_else(|| anyhow!("invalid header: missing \"x\""))?,
            b"x",
        )?;
        let width = std::str::from_utf8(&value)?.parse()?;

        let value = extract_value(
            parts
                .next()
                .ok_or_else(|| anyhow!("invalid header: missing \"y\""))?,
            b"y",
        )?;
        let height = std::str::from_utf8(&value)?.parse()?;

        // The rule is optional but must be B3/S23 when present.
        if let Some(part) = parts.next() {
            let rule = extract_value(part, b"rule")?;
            if rule != b"B3/S23" {
                return Err(anyhow!("only B3/S23 rule is supported"));
            }
        }
        Ok((width, height))
    }

    /// Serialize to Extended RLE, anchored at the bounding box and wrapped
    /// at 70 columns.
    pub fn to_rle(&self) -> Result<Vec<u8>> {
        let Some((min_x, min_y, max_x, max_y)) = self.bounding_box() else {
            return Ok(b"x = 0, y = 0, rule = B3/S23\n!".to_vec());
        };
        let width = max_x.wrapping_sub(min_x) as u64 + 1;
        let height = max_y.wrapping_sub(min_y) as u64 + 1;

        let mut result = format!("x = {width}, y = {height}, rule = B3/S23\n").into_bytes();
        let mut line_length = 0usize;
        let mut push_token = |result: &mut Vec<u8>, count: u64, ch: u8| {
            let mut token = Vec::new();
            if count > 1 {
                token.extend_from_slice(count.to_string().as_bytes());
            }
            token.push(ch);
            if line_length + token.len() > 70 {
                result.push(b'\n');
                line_length = 0;
            }
            line_length += token.len();
            result.extend_from_slice(&token);
        };

        let mut i = 0;
        let mut prev_y = min_y;
        while i < self.cells.len() {
            let y = self.cells[i].y;
            if y != prev_y {
                push_token(&mut result, y.wrapping_sub(prev_y) as u64, b'$');
            }
            let mut cursor_x = min_x;
            while i < self.cells.len() && self.cells[i].y == y {
                let gap = self.cells[i].x.wrapping_sub(cursor_x) as u64;
                if gap > 0 {
                    push_token(&mut result, gap, b'b');
                }
                let mut run = 1u64;
                while i + 1 < self.cells.len()
                    && self.cells[i + 1].y == y
                    && self.cells[i + 1].x == self.cells[i].x.wrapping_add(1)
                {
                    run += 1;
                    i += 1;
                }
                cursor_x = self.cells[i].x.wrapping_add(1);
                i += 1;
                push_token(&mut result, run, b'o');
            }
            prev_y = y;
        }
        result.push(b'!');
        Ok(result)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Eq for Pattern {}

#[cfg(test)]
mod tests {
    use super::*;

    const GLIDER: &[u8] = b"x = 3, y = 3, rule = B3/S23\nbo$2bo$3o!";

    fn rel(pattern: &Pattern) -> Vec<(u32, u32)> {
        pattern
            .points()
            .iter()
            .map(|p| (p.x - ORIGIN, p.y - ORIGIN))
            .collect()
    }

    #[test]
    fn parses_a_glider() {
        let glider = Pattern::from_rle(GLIDER).unwrap();
        assert_eq!(glider.population(), 5);
        assert_eq!(rel(&glider), vec![(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn parses_without_header() {
        let p = Pattern::from_rle(b"#C blinker\n3o!").unwrap();
        assert_eq!(rel(&p), vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn rejects_foreign_rules() {
        assert!(Pattern::from_rle(b"x = 1, y = 1, rule = B36/S23\no!").is_err());
    }

    #[test]
    fn rejects_out_of_bounds_runs() {
        assert!(Pattern::from_rle(b"x = 2, y = 1, rule = B3/S23\n3o!").is_err());
    }

    #[test]
    fn rejects_missing_terminator() {
        assert!(Pattern::from_rle(b"x = 3, y = 1, rule = B3/S23\n3o").is_err());
    }

    #[test]
    fn round_trips_a_glider() {
        let glider = Pattern::from_rle(GLIDER).unwrap();
        let reparsed = Pattern::from_rle(&glider.to_rle().unwrap()).unwrap();
        assert_eq!(glider, reparsed);
    }

    #[test]
    fn round_trips_a_row_gap() {
        // Two blinker rows separated by three blank rows.
        let p = Pattern::from_rle(b"3o4$3o!").unwrap();
        assert_eq!(p.population(), 6);
        let reparsed = Pattern::from_rle(&p.to_rle().unwrap()).unwrap();
        assert_eq!(p, reparsed);
    }

    #[test]
    fn round_trips_random_soup() {
        for seed in 0..4 {
            let soup = Pattern::random(37, 23, 0.31, Some(seed));
            let reparsed = Pattern::from_rle(&soup.to_rle().unwrap()).unwrap();
            // Serialization is bounding-box anchored, so compare shapes.
            let (sx, sy, ..) = soup.bounding_box().unwrap();
            let (rx, ry, ..) = reparsed.bounding_box().unwrap();
            let shape_a: Vec<_> = soup.points().iter().map(|p| (p.x - sx, p.y - sy)).collect();
            let shape_b: Vec<_> = reparsed
                .points()
                .iter()
                .map(|p| (p.x - rx, p.y - ry))
                .collect();
            assert_eq!(shape_a, shape_b);
        }
    }

    #[test]
    fn blank_pattern_serializes() {
        let blank = Pattern::default();
        let rle = blank.to_rle().unwrap();
        assert_eq!(Pattern::from_rle(&rle).unwrap().population(), 0);
    }

    #[test]
    fn hash_ignores_input_order() {
        let a = Pattern::from_points(vec![Point::new(5, 5), Point::new(9, 2)]);
        let b = Pattern::from_points(vec![Point::new(9, 2), Point::new(5, 5)]);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), Pattern::from_points(vec![Point::new(5, 5)]).hash());
    }
}
