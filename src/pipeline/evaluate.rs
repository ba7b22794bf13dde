// Held-out evaluation: fit and assign on the first part of the labeled data,
// then score predictions on the rest.
//
// The test file has no labels, so this is the only way to see how well the
// unsupervised topics line up with real digits.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use super::run::{predict_images, train_assignment, TrainingOutcome};
use crate::assignment::vote::{MissingLabelPolicy, UnassignedPolicy};
use crate::data::loader;
use crate::data::models::{Digit, TrainingSet};
use crate::scoring::accuracy::EvaluationReport;
use crate::topics::lda::{LdaParams, OnlineLda};

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    pub train_path: PathBuf,
    /// Fraction of rows (taken from the end of the file) to hold out
    pub holdout: f64,
    pub params: LdaParams,
    pub missing_labels: MissingLabelPolicy,
    pub unassigned: UnassignedPolicy,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub training_rows: usize,
    pub holdout_rows: usize,
    pub training: TrainingOutcome,
    pub holdout: EvaluationReport,
    /// `None` if the held-out images carry no ink at all
    pub holdout_perplexity: Option<f64>,
}

/// Fit on the kept rows and score the held-out rows.
pub fn evaluate(options: &EvaluateOptions) -> Result<EvaluationSummary> {
    let labeled = loader::load_training(&options.train_path)?;
    let (train, held) = labeled.split(options.holdout)?;
    info!(
        train = train.len(),
        holdout = held.len(),
        "Split labeled data"
    );
    let unseen = unseen_holdout_digits(&train, &held);
    if !unseen.is_empty() {
        warn!(
            digits = ?unseen,
            "Held-out rows carry digits the training part never sees; is the file sorted by label?"
        );
    }

    let mut model = OnlineLda::new(options.params.clone()).with_progress(options.show_progress);
    let training = train_assignment(&mut model, &train, options.missing_labels)?;

    let predictions = predict_images(
        &model,
        &training.assignment,
        held.images(),
        options.unassigned,
    )?;
    let holdout = EvaluationReport::from_predictions(&predictions, held.labels())?;

    let holdout_perplexity = match model.perplexity(&held.to_matrix()) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(error = %e, "Could not compute held-out perplexity");
            None
        }
    };

    info!(
        accuracy = holdout.accuracy(),
        perplexity = ?holdout_perplexity,
        "Held-out evaluation complete"
    );

    Ok(EvaluationSummary {
        training_rows: train.len(),
        holdout_rows: held.len(),
        training,
        holdout,
        holdout_perplexity,
    })
}

/// Digits present in `held` but absent from `train`.
pub fn unseen_holdout_digits(train: &TrainingSet, held: &TrainingSet) -> Vec<Digit> {
    Digit::all()
        .filter(|d| held.labels().contains(d) && !train.labels().contains(d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::{Image, PIXEL_COUNT};

    fn set(labels: &[u8]) -> TrainingSet {
        let labels: Vec<Digit> = labels.iter().map(|&d| Digit::new(d).unwrap()).collect();
        let images = vec![Image::from_pixels(vec![0; PIXEL_COUNT]).unwrap(); labels.len()];
        TrainingSet::new(labels, images).unwrap()
    }

    #[test]
    fn test_sorted_file_leaves_digits_unseen() {
        let labeled = set(&[0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
        let (train, held) = labeled.split(0.2).unwrap();
        let unseen = unseen_holdout_digits(&train, &held);
        assert_eq!(unseen, vec![Digit::new(4).unwrap()]);
    }

    #[test]
    fn test_interleaved_file_has_no_unseen_digits() {
        let labeled = set(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        let (train, held) = labeled.split(0.3).unwrap();
        assert!(unseen_holdout_digits(&train, &held).is_empty());
    }
}
