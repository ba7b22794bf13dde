// The main pipeline: fit on training images, name the topics, predict the
// test images, write the submission.
//
// Stages are generic over `TopicModel` so they can be driven by a stub
// model in tests; `run` wires them up with the online LDA.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::assignment::predict::{predict, Prediction};
use crate::assignment::vote::{MissingLabelPolicy, TopicAssignment, UnassignedPolicy};
use crate::data::loader;
use crate::data::models::{images_to_matrix, Image, TrainingSet};
use crate::output::assignment::write_assignment_json;
use crate::output::submission::write_submission;
use crate::scoring::accuracy::EvaluationReport;
use crate::topics::lda::{LdaParams, OnlineLda};
use crate::topics::traits::TopicModel;

/// How many pixels per topic to report in the run summary.
const TOP_PIXELS: usize = 5;

/// The fitted assignment plus how well it reproduces the training labels.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub assignment: TopicAssignment,
    pub report: EvaluationReport,
}

/// Fit `model` on the training images (labels withheld), then resolve the
/// topic -> digit assignment from the labels.
pub fn train_assignment<M: TopicModel + ?Sized>(
    model: &mut M,
    training: &TrainingSet,
    missing_labels: MissingLabelPolicy,
) -> Result<TrainingOutcome> {
    let data = training.to_matrix();
    let distributions = model
        .fit_transform(&data)
        .context("Failed to fit the topic model")?;

    let assignment =
        TopicAssignment::from_distributions(&distributions, training.labels(), missing_labels)
            .context("Failed to assign digits to topics")?;
    warn_on_gaps(&assignment);

    // Every training row's dominant topic received at least that row's
    // vote, so no training row can land on an unassigned topic.
    let predictions = predict(&assignment, &distributions, UnassignedPolicy::Error)?;
    let report = EvaluationReport::from_predictions(&predictions, training.labels())?;

    info!(
        rows = training.len(),
        topics = model.num_topics(),
        agreement = report.accuracy(),
        "Resolved topic assignment"
    );

    Ok(TrainingOutcome { assignment, report })
}

/// Infer topics for unlabeled images and map them through the assignment.
pub fn predict_images<M: TopicModel + ?Sized>(
    model: &M,
    assignment: &TopicAssignment,
    images: &[Image],
    unassigned: UnassignedPolicy,
) -> Result<Vec<Prediction>> {
    let data = images_to_matrix(images);
    let distributions = model
        .transform(&data)
        .context("Failed to infer topics for unlabeled images")?;
    predict(assignment, &distributions, unassigned)
}

/// Everything `run` needs; built from `Config` plus CLI overrides.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub output_path: PathBuf,
    pub params: LdaParams,
    pub missing_labels: MissingLabelPolicy,
    pub unassigned: UnassignedPolicy,
    /// Also dump the assignment as JSON here
    pub assignment_json: Option<PathBuf>,
    pub show_progress: bool,
}

/// What a completed run produced, for display.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub training_rows: usize,
    pub test_rows: usize,
    pub outcome: TrainingOutcome,
    /// Strongest pixel indices per topic
    pub top_pixels: Vec<Vec<usize>>,
}

/// Train, assign, predict and write the submission file.
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let training = loader::load_training(&options.train_path)?;

    let mut model = OnlineLda::new(options.params.clone()).with_progress(options.show_progress);
    let outcome = train_assignment(&mut model, &training, options.missing_labels)?;

    let images = loader::load_images(&options.test_path)?;
    let predictions = predict_images(&model, &outcome.assignment, &images, options.unassigned)?;
    let top_pixels = model.top_pixels(TOP_PIXELS)?;

    // Only touch the filesystem once every prediction is in hand. The
    // submission goes last so a failed assignment dump leaves no result.
    if let Some(path) = &options.assignment_json {
        write_assignment_json(path, &outcome.assignment)?;
    }
    write_submission(&options.output_path, &predictions)?;

    Ok(RunSummary {
        training_rows: training.len(),
        test_rows: images.len(),
        outcome,
        top_pixels,
    })
}

fn warn_on_gaps(assignment: &TopicAssignment) {
    let unassigned: Vec<usize> = assignment
        .iter()
        .filter(|(_, digit)| digit.is_none())
        .map(|(topic, _)| topic)
        .collect();
    if !unassigned.is_empty() {
        warn!(topics = ?unassigned, "Some topics received no votes");
    }

    let unclaimed = assignment.unclaimed_digits();
    if !unclaimed.is_empty() {
        warn!(
            digits = ?unclaimed,
            "Some digits are not the majority label of any topic and will never be predicted"
        );
    }
}
