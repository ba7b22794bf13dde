use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::topics::lda::LdaParams;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// value has a default, and CLI flags override whatever is loaded here.
#[derive(Debug, Clone)]
pub struct Config {
    /// Labeled training CSV (DIGIT_TOPICS_TRAIN_PATH)
    pub train_path: PathBuf,
    /// Unlabeled test CSV (DIGIT_TOPICS_TEST_PATH)
    pub test_path: PathBuf,
    /// Where predictions are written (DIGIT_TOPICS_OUTPUT_PATH)
    pub output_path: PathBuf,
    pub num_topics: usize,
    pub seed: u64,
    /// Passes over the training data
    pub max_iter: usize,
    pub batch_size: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LdaParams::default();

        Ok(Self {
            train_path: lookup("DIGIT_TOPICS_TRAIN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("../input/train.csv")),
            test_path: lookup("DIGIT_TOPICS_TEST_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("../input/test.csv")),
            output_path: lookup("DIGIT_TOPICS_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("result.csv")),
            num_topics: parse_or(&lookup, "DIGIT_TOPICS_NUM_TOPICS", defaults.num_topics)?,
            seed: parse_or(&lookup, "DIGIT_TOPICS_SEED", defaults.seed)?,
            max_iter: parse_or(&lookup, "DIGIT_TOPICS_MAX_ITER", defaults.max_iter)?,
            batch_size: parse_or(&lookup, "DIGIT_TOPICS_BATCH_SIZE", defaults.batch_size)?,
        })
    }

    /// Model hyperparameters implied by this configuration.
    pub fn lda_params(&self) -> LdaParams {
        LdaParams {
            num_topics: self.num_topics,
            seed: self.seed,
            max_iter: self.max_iter,
            batch_size: self.batch_size,
            ..LdaParams::default()
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        _ => Ok(default),
    }
}
