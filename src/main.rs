use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use digit_topics::assignment::vote::{MissingLabelPolicy, UnassignedPolicy};
use digit_topics::config::Config;
use digit_topics::output::terminal;
use digit_topics::pipeline::evaluate::{evaluate, EvaluateOptions};
use digit_topics::pipeline::run::{run, RunOptions};

/// Digit Topics: learn handwritten digits without labels.
///
/// Treats every image as a document whose words are pixels and whose word
/// counts are pixel intensities, fits an LDA topic model, and names each
/// topic after the digit most of its training images carry.
#[derive(Parser)]
#[command(name = "digit-topics", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit on the training file, predict the test file, write the submission
    Run {
        /// Unlabeled test CSV (default: DIGIT_TOPICS_TEST_PATH or ../input/test.csv)
        #[arg(long)]
        test: Option<PathBuf>,

        /// Output CSV (default: DIGIT_TOPICS_OUTPUT_PATH or result.csv)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write the topic assignment as JSON to this path
        #[arg(long)]
        assignment_json: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Hold out part of the labeled data and report accuracy on it
    Evaluate {
        /// Fraction of labeled rows (from the end of the file) to hold out
        #[arg(long, default_value = "0.2")]
        holdout: f64,

        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Options shared by both subcommands.
#[derive(Args)]
struct ModelArgs {
    /// Labeled training CSV (default: DIGIT_TOPICS_TRAIN_PATH or ../input/train.csv)
    #[arg(long)]
    train: Option<PathBuf>,

    /// Number of topics (default: DIGIT_TOPICS_NUM_TOPICS or 10)
    #[arg(long)]
    topics: Option<usize>,

    /// Random seed (default: DIGIT_TOPICS_SEED or 0)
    #[arg(long)]
    seed: Option<u64>,

    /// Passes over the training data (default: DIGIT_TOPICS_MAX_ITER or 10)
    #[arg(long)]
    max_iter: Option<usize>,

    /// Documents per minibatch (default: DIGIT_TOPICS_BATCH_SIZE or 128)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Treat digits with no training rows as empty instead of failing
    #[arg(long)]
    allow_missing_labels: bool,

    /// Fail on a topic nobody voted for instead of predicting 0
    #[arg(long)]
    strict_topics: bool,

    /// Hide the training progress bar
    #[arg(long)]
    quiet: bool,
}

impl ModelArgs {
    /// Apply CLI overrides on top of the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.train {
            config.train_path = path.clone();
        }
        if let Some(topics) = self.topics {
            config.num_topics = topics;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iter = max_iter;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
    }

    fn missing_labels(&self) -> MissingLabelPolicy {
        if self.allow_missing_labels {
            MissingLabelPolicy::Empty
        } else {
            MissingLabelPolicy::Error
        }
    }

    fn unassigned(&self) -> UnassignedPolicy {
        if self.strict_topics {
            UnassignedPolicy::Error
        } else {
            UnassignedPolicy::default()
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("digit_topics=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            test,
            output,
            assignment_json,
            model,
        } => {
            let mut config = Config::load()?;
            model.apply(&mut config);
            if let Some(path) = test {
                config.test_path = path;
            }
            if let Some(path) = output {
                config.output_path = path;
            }

            info!(
                train = %config.train_path.display(),
                test = %config.test_path.display(),
                topics = config.num_topics,
                "Starting run"
            );
            println!(
                "Fitting {} topics on {}...",
                config.num_topics,
                config.train_path.display()
            );

            let options = RunOptions {
                train_path: config.train_path.clone(),
                test_path: config.test_path.clone(),
                output_path: config.output_path.clone(),
                params: config.lda_params(),
                missing_labels: model.missing_labels(),
                unassigned: model.unassigned(),
                assignment_json,
                show_progress: !model.quiet,
            };
            let summary = run(&options)?;

            terminal::display_assignment(
                &summary.outcome.assignment,
                Some(summary.top_pixels.as_slice()),
            );
            terminal::display_report(
                &format!("Training Agreement ({} images)", summary.training_rows),
                &summary.outcome.report,
            );

            println!(
                "\n{}",
                format!(
                    "Wrote {} predictions to {}",
                    summary.test_rows,
                    config.output_path.display()
                )
                .bold()
            );
            if let Some(path) = &options.assignment_json {
                println!("Assignment saved to {}", path.display());
            }
        }

        Commands::Evaluate { holdout, model } => {
            let mut config = Config::load()?;
            model.apply(&mut config);

            println!(
                "Evaluating {} topics on {} (holding out {:.0}%)...",
                config.num_topics,
                config.train_path.display(),
                holdout * 100.0
            );

            let options = EvaluateOptions {
                train_path: config.train_path.clone(),
                holdout,
                params: config.lda_params(),
                missing_labels: model.missing_labels(),
                unassigned: model.unassigned(),
                show_progress: !model.quiet,
            };
            let summary = evaluate(&options)?;

            terminal::display_assignment(&summary.training.assignment, None);
            terminal::display_report(
                &format!("Training Agreement ({} images)", summary.training_rows),
                &summary.training.report,
            );
            terminal::display_report(
                &format!("Held-out Accuracy ({} images)", summary.holdout_rows),
                &summary.holdout,
            );
            terminal::display_confusion(&summary.holdout);

            match summary.holdout_perplexity {
                Some(p) => println!("  Held-out perplexity: {p:.2}"),
                None => println!("  {}", "Held-out perplexity unavailable".dimmed()),
            }
        }
    }

    Ok(())
}
