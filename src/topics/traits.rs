// Topic model trait: the seam between the pipeline and the model.
//
// The pipeline only needs per-row topic distributions, so anything that can
// produce them (the online LDA, or a fixed stub in tests) plugs in here
// without the assignment or prediction code changing.

use anyhow::Result;
use ndarray::Array2;

/// An unsupervised model producing a distribution over topics per row.
pub trait TopicModel {
    /// Number of latent topics K.
    fn num_topics(&self) -> usize;

    /// Fit on an R x F non-negative count matrix and return the R x K
    /// row-normalized topic distributions for the same rows.
    fn fit_transform(&mut self, data: &Array2<f64>) -> Result<Array2<f64>>;

    /// Infer R' x K distributions for new rows using the fitted parameters,
    /// without updating them. F must match the fitted width.
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
}
