// Turning topic distributions into digit predictions.

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use super::vote::{dominant_topic, TopicAssignment, UnassignedPolicy};
use crate::data::models::Digit;

/// One output row: 1-based image id and its predicted digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub image_id: usize,
    pub label: Digit,
}

/// Predict a digit for every row: dominant topic, then the assignment.
pub fn predict(
    assignment: &TopicAssignment,
    distributions: &Array2<f64>,
    policy: UnassignedPolicy,
) -> Result<Vec<Prediction>> {
    if distributions.ncols() != assignment.num_topics() {
        anyhow::bail!(
            "distributions have {} topics but the assignment covers {}",
            distributions.ncols(),
            assignment.num_topics()
        );
    }

    distributions
        .outer_iter()
        .enumerate()
        .map(|(i, row)| -> Result<Prediction> {
            let image_id = i + 1;
            let topic = dominant_topic(row)?;
            let label = assignment
                .label_for(topic, policy)
                .with_context(|| format!("image {image_id}"))?;
            Ok(Prediction { image_id, label })
        })
        .collect()
}
