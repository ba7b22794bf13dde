// Accuracy and confusion matrix for predictions against known labels.
//
// Used for the training-set agreement after a normal run and for the
// held-out score in `evaluate`.

use anyhow::Result;

use crate::assignment::predict::Prediction;
use crate::data::models::{Digit, DIGIT_COUNT};

/// How a set of predictions lines up with the true labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationReport {
    /// confusion[true][predicted]
    pub confusion: [[usize; DIGIT_COUNT]; DIGIT_COUNT],
    pub rows: usize,
    pub correct: usize,
}

impl EvaluationReport {
    /// Compare predictions with labels row by row.
    pub fn from_predictions(predictions: &[Prediction], labels: &[Digit]) -> Result<Self> {
        if predictions.len() != labels.len() {
            anyhow::bail!(
                "{} predictions but {} labels",
                predictions.len(),
                labels.len()
            );
        }

        let mut confusion = [[0usize; DIGIT_COUNT]; DIGIT_COUNT];
        let mut correct = 0;
        for (prediction, truth) in predictions.iter().zip(labels) {
            confusion[truth.index()][prediction.label.index()] += 1;
            if prediction.label == *truth {
                correct += 1;
            }
        }

        Ok(Self {
            confusion,
            rows: labels.len(),
            correct,
        })
    }

    /// Fraction of rows predicted correctly (0.0 when there are no rows).
    pub fn accuracy(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.correct as f64 / self.rows as f64
        }
    }

    /// Fraction of rows labeled `digit` that were predicted as `digit`.
    /// `None` if the digit never occurs.
    pub fn recall(&self, digit: Digit) -> Option<f64> {
        let row = &self.confusion[digit.index()];
        let total: usize = row.iter().sum();
        if total == 0 {
            None
        } else {
            Some(row[digit.index()] as f64 / total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(image_id: usize, label: u8) -> Prediction {
        Prediction {
            image_id,
            label: Digit::new(label).unwrap(),
        }
    }

    #[test]
    fn test_accuracy_and_confusion() {
        let predictions = vec![prediction(1, 3), prediction(2, 3), prediction(3, 5)];
        let labels: Vec<Digit> = [3, 5, 5].iter().map(|&d| Digit::new(d).unwrap()).collect();

        let report = EvaluationReport::from_predictions(&predictions, &labels).unwrap();
        assert_eq!(report.correct, 2);
        assert!((report.accuracy() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.confusion[5][3], 1);
        assert_eq!(report.recall(Digit::new(5).unwrap()), Some(0.5));
        assert_eq!(report.recall(Digit::ZERO), None);
    }

    #[test]
    fn test_length_mismatch_fails() {
        let predictions = vec![prediction(1, 0)];
        assert!(EvaluationReport::from_predictions(&predictions, &[]).is_err());
    }

    #[test]
    fn test_empty_accuracy_is_zero() {
        let report = EvaluationReport::from_predictions(&[], &[]).unwrap();
        assert_eq!(report.accuracy(), 0.0);
    }
}
