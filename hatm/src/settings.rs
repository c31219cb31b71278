//! Model settings file.
//!
//! One key per line followed by its value(s):
//!
//! ```text
//! DEPTH 3
//! ETA 2.0 1.0 0.5
//! GEM_MEAN 0.5
//! GEM_SCALE 100
//! SCALING_SHAPE 1.0
//! SCALING_SCALE 0.5
//! SAMPLE_ETA 0
//! SAMPLE_GEM 1
//! ```
//!
//! Unknown keys are ignored and malformed numbers read as zero.

use crate::input::open_buf_reader;
use anyhow::{ensure, Context};
use log::warn;
use std::io::BufRead;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub depth: usize,
    /// Dirichlet concentration per level (a single value applies to all)
    pub eta: Vec<f64>,
    pub gem_mean: f64,
    pub gem_scale: f64,
    pub scaling_shape: f64,
    pub scaling_scale: f64,
    pub sample_eta: bool,
    pub sample_gem: bool,
}

impl Settings {
    /// Parse settings from text lines.
    pub fn parse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut settings = Settings::default();

        for line in lines {
            let mut fields = line.as_ref().split_whitespace();
            let Some(key) = fields.next() else {
                continue;
            };

            match key {
                "DEPTH" => settings.depth = parse_or_zero(fields.next()),
                "ETA" => settings.eta = fields.map(|x| x.parse().unwrap_or_default()).collect(),
                "GEM_MEAN" => settings.gem_mean = parse_or_zero(fields.next()),
                "GEM_SCALE" => settings.gem_scale = parse_or_zero(fields.next()),
                "SCALING_SHAPE" => settings.scaling_shape = parse_or_zero(fields.next()),
                "SCALING_SCALE" => settings.scaling_scale = parse_or_zero(fields.next()),
                "SAMPLE_ETA" => settings.sample_eta = parse_or_zero::<u32>(fields.next()) != 0,
                "SAMPLE_GEM" => settings.sample_gem = parse_or_zero::<u32>(fields.next()) != 0,
                _ => {}
            }
        }
        settings
    }

    /// Check that the settings describe a usable model and return the
    /// per-level eta vector of length `depth`.
    pub fn validate(&self) -> anyhow::Result<Vec<f64>> {
        ensure!(self.depth >= 2, "DEPTH must be at least 2, got {}", self.depth);
        ensure!(
            self.gem_mean > 0.0 && self.gem_mean < 1.0,
            "GEM_MEAN must lie in (0,1), got {}",
            self.gem_mean
        );
        ensure!(self.gem_scale > 0.0, "GEM_SCALE must be positive, got {}", self.gem_scale);
        ensure!(
            self.scaling_shape > 0.0 && self.scaling_scale > 0.0,
            "SCALING_SHAPE and SCALING_SCALE must be positive, got {} and {}",
            self.scaling_shape,
            self.scaling_scale
        );

        let eta = match self.eta.len() {
            0 => anyhow::bail!("ETA is missing"),
            1 => vec![self.eta[0]; self.depth],
            n if n < self.depth => {
                anyhow::bail!("ETA has {} values for depth {}", n, self.depth)
            }
            n => {
                if n > self.depth {
                    warn!("ignoring {} extra ETA value(s)", n - self.depth);
                }
                self.eta[..self.depth].to_vec()
            }
        };
        ensure!(
            eta.iter().all(|&e| e > 0.0),
            "ETA values must be positive, got {:?}",
            eta
        );
        Ok(eta)
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(field: Option<&str>) -> T {
    field.and_then(|x| x.parse().ok()).unwrap_or_default()
}

/// Read a settings file (optionally gzipped).
pub fn read_settings(path: &str) -> anyhow::Result<Settings> {
    let reader = open_buf_reader(path).with_context(|| format!("opening settings {}", path))?;
    let lines = reader
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading settings {}", path))?;
    Ok(Settings::parse(lines))
}
