// Online variational Bayes LDA (Hoffman, Blei & Bach, 2010).
//
// Each image is a "document" and each pixel a "word" whose frequency is the
// pixel intensity. Fitting sweeps the corpus in fixed-size minibatches:
// the E-step infers a variational Dirichlet (gamma) per document, the M-step
// blends the minibatch's sufficient statistics into the topic-word
// parameters (lambda) with a decaying step size.
//
// The per-document E-step runs on rayon, but every random draw happens on
// the calling thread and statistics are summed in document order, so a
// given seed always produces bit-identical parameters.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;
use statrs::function::gamma::{digamma, ln_gamma};
use tracing::{debug, info};

use super::traits::TopicModel;

/// Added to normalizers to keep divisions finite.
const EPS: f64 = f64::EPSILON;

/// Gamma(shape, scale) used to initialize lambda and the training-time gamma.
const INIT_SHAPE: f64 = 100.0;
const INIT_SCALE: f64 = 0.01;

/// Hyperparameters for the online LDA.
#[derive(Debug, Clone)]
pub struct LdaParams {
    /// Number of topics K
    pub num_topics: usize,
    /// Dirichlet prior on document-topic proportions (alpha). Defaults to 1/K.
    pub doc_topic_prior: Option<f64>,
    /// Dirichlet prior on topic-pixel distributions (eta). Defaults to 1/K.
    pub topic_word_prior: Option<f64>,
    /// Exponent kappa of the step-size schedule (offset + t)^-kappa
    pub learning_decay: f64,
    /// Offset tau0 of the step-size schedule; downweights early minibatches
    pub learning_offset: f64,
    /// Number of passes over the training data
    pub max_iter: usize,
    /// Documents per minibatch
    pub batch_size: usize,
    /// Per-document E-step stops once mean |delta gamma| drops below this
    pub mean_change_tol: f64,
    /// Cap on per-document E-step iterations
    pub max_doc_update_iter: usize,
    /// Seed for the initialization draws
    pub seed: u64,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self {
            num_topics: 10,
            doc_topic_prior: None,
            topic_word_prior: None,
            learning_decay: 0.7,
            learning_offset: 10.0,
            max_iter: 10,
            batch_size: 128,
            mean_change_tol: 1e-3,
            max_doc_update_iter: 100,
            seed: 0,
        }
    }
}

impl LdaParams {
    pub fn alpha(&self) -> f64 {
        self.doc_topic_prior
            .unwrap_or(1.0 / self.num_topics.max(1) as f64)
    }

    pub fn eta(&self) -> f64 {
        self.topic_word_prior
            .unwrap_or(1.0 / self.num_topics.max(1) as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_topics == 0 {
            anyhow::bail!("num_topics must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.max_iter == 0 {
            anyhow::bail!("max_iter must be at least 1");
        }
        if self.max_doc_update_iter == 0 {
            anyhow::bail!("max_doc_update_iter must be at least 1");
        }
        if !(self.learning_decay > 0.0 && self.learning_decay <= 1.0) {
            anyhow::bail!(
                "learning_decay must be in (0, 1], got {}",
                self.learning_decay
            );
        }
        if !(self.learning_offset >= 0.0) {
            anyhow::bail!(
                "learning_offset must be non-negative, got {}",
                self.learning_offset
            );
        }
        if !(self.alpha() > 0.0 && self.eta() > 0.0) {
            anyhow::bail!("Dirichlet priors must be positive");
        }
        Ok(())
    }
}

/// Nonzero pixels of one image with their intensities.
struct SparseDoc {
    ids: Vec<usize>,
    counts: Array1<f64>,
}

impl SparseDoc {
    fn from_row(row: ArrayView1<'_, f64>) -> Self {
        let (ids, counts): (Vec<usize>, Vec<f64>) = row
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0.0)
            .map(|(i, &c)| (i, c))
            .unzip();
        Self {
            ids,
            counts: Array1::from(counts),
        }
    }
}

/// Result of the per-document E-step.
struct DocInference {
    /// Variational Dirichlet parameters over topics
    gamma: Array1<f64>,
    /// exp(E[log theta]) at the final gamma
    exp_doc_topic: Array1<f64>,
    /// counts / phi normalizer, aligned with the document's ids
    ratio: Array1<f64>,
}

/// Fitted topic-pixel parameters.
struct Fitted {
    /// K x F variational parameters
    lambda: Array2<f64>,
    /// exp(E[log beta]), cached between minibatches
    exp_elog_beta: Array2<f64>,
}

impl Fitted {
    fn new(lambda: Array2<f64>) -> Self {
        let exp_elog_beta = dirichlet_expectation_rows(&lambda).mapv(f64::exp);
        Self {
            lambda,
            exp_elog_beta,
        }
    }

    fn refresh(&mut self) {
        self.exp_elog_beta = dirichlet_expectation_rows(&self.lambda).mapv(f64::exp);
    }

    fn num_features(&self) -> usize {
        self.lambda.ncols()
    }
}

/// Latent Dirichlet Allocation fitted with online variational Bayes.
pub struct OnlineLda {
    params: LdaParams,
    fitted: Option<Fitted>,
    show_progress: bool,
}

impl OnlineLda {
    pub fn new(params: LdaParams) -> Self {
        Self {
            params,
            fitted: None,
            show_progress: false,
        }
    }

    /// Show an indicatif progress bar while fitting.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn params(&self) -> &LdaParams {
        &self.params
    }

    /// The fitted K x F topic-pixel parameters, if fitted.
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.lambda)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit the model, replacing any previous fit.
    pub fn fit(&mut self, data: &Array2<f64>) -> Result<()> {
        self.params.validate()?;
        validate_counts(data)?;
        if data.nrows() == 0 {
            anyhow::bail!("cannot fit a topic model on zero documents");
        }

        let (n_docs, n_features) = data.dim();
        let k = self.params.num_topics;
        let eta = self.params.eta();

        let init = Gamma::new(INIT_SHAPE, INIT_SCALE)
            .map_err(|e| anyhow::anyhow!("invalid initialization prior: {e}"))?;
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let lambda = Array2::from_shape_simple_fn((k, n_features), || init.sample(&mut rng));
        let mut fitted = Fitted::new(lambda);

        let docs: Vec<SparseDoc> = data.outer_iter().map(SparseDoc::from_row).collect();

        let pb = self.progress_bar((self.params.max_iter * n_docs) as u64)?;

        // The step-size schedule starts at t = 1.
        let mut n_batch_iter = 1usize;
        for pass in 0..self.params.max_iter {
            for batch in docs.chunks(self.params.batch_size) {
                let sstats = batch_statistics(&self.params, &fitted, batch, &init, &mut rng);

                let weight = (self.params.learning_offset + n_batch_iter as f64)
                    .powf(-self.params.learning_decay);
                let doc_ratio = n_docs as f64 / batch.len() as f64;

                Zip::from(&mut fitted.lambda)
                    .and(&sstats)
                    .for_each(|l, &s| *l = (1.0 - weight) * *l + weight * (eta + doc_ratio * s));
                fitted.refresh();

                n_batch_iter += 1;
                pb.inc(batch.len() as u64);
            }
            debug!(
                pass = pass + 1,
                passes = self.params.max_iter,
                "Finished LDA pass"
            );
        }
        pb.finish_and_clear();

        info!(
            documents = n_docs,
            features = n_features,
            topics = k,
            passes = self.params.max_iter,
            "Fitted online LDA"
        );

        self.fitted = Some(fitted);

        // The bound touches every pixel of every document, so skip it
        // unless someone is listening.
        if tracing::enabled!(tracing::Level::DEBUG) {
            match self.perplexity(data) {
                Ok(p) => debug!(perplexity = p, "Training perplexity"),
                Err(e) => debug!(error = %e, "Training perplexity unavailable"),
            }
        }
        Ok(())
    }

    /// Approximate perplexity of `data` under the fitted model, from the
    /// variational bound. Lower is better.
    pub fn perplexity(&self, data: &Array2<f64>) -> Result<f64> {
        let fitted = self.fitted()?;
        let gamma = self.infer_gamma(data)?;

        let word_count = data.sum();
        if word_count <= 0.0 {
            anyhow::bail!("cannot compute perplexity of a matrix with no counts");
        }

        let bound = approx_bound(&self.params, fitted, data, &gamma);
        Ok((-bound / word_count).exp())
    }

    /// For each topic, the `n` pixel indices with the largest weight.
    pub fn top_pixels(&self, n: usize) -> Result<Vec<Vec<usize>>> {
        let fitted = self.fitted()?;
        Ok(fitted
            .lambda
            .rows()
            .into_iter()
            .map(|row| {
                let mut idx: Vec<usize> = (0..row.len()).collect();
                idx.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
                idx.truncate(n);
                idx
            })
            .collect())
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("topic model used before it was fitted"))
    }

    /// Unnormalized variational gamma for each row of `data`.
    fn infer_gamma(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        validate_counts(data)?;
        if data.ncols() != fitted.num_features() {
            anyhow::bail!(
                "feature dimension mismatch: model was fitted on {} features, got {}",
                fitted.num_features(),
                data.ncols()
            );
        }

        let k = self.params.num_topics;
        let docs: Vec<SparseDoc> = data.outer_iter().map(SparseDoc::from_row).collect();
        let rows: Vec<Array1<f64>> = docs
            .par_iter()
            .map(|doc| {
                infer_document(doc, &fitted.exp_elog_beta, Array1::ones(k), &self.params).gamma
            })
            .collect();

        let mut out = Array2::zeros((rows.len(), k));
        for (mut dst, src) in out.rows_mut().into_iter().zip(&rows) {
            dst.assign(src);
        }
        Ok(out)
    }

    fn progress_bar(&self, len: u64) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar().template("  Training [{bar:30}] {pos}/{len} ({eta})")?,
        );
        Ok(pb)
    }
}

impl TopicModel for OnlineLda {
    fn num_topics(&self) -> usize {
        self.params.num_topics
    }

    fn fit_transform(&mut self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(data)?;
        self.transform(data)
    }

    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let mut distributions = self.infer_gamma(data)?;
        for mut row in distributions.rows_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
        Ok(distributions)
    }
}

/// E-step over one minibatch; returns the K x F sufficient statistics.
fn batch_statistics(
    params: &LdaParams,
    fitted: &Fitted,
    batch: &[SparseDoc],
    init: &Gamma<f64>,
    rng: &mut StdRng,
) -> Array2<f64> {
    let k = params.num_topics;

    // Draw starting points up front so the RNG stream doesn't depend on
    // thread scheduling.
    let starts: Vec<Array1<f64>> = batch
        .iter()
        .map(|_| Array1::from_iter((0..k).map(|_| init.sample(&mut *rng))))
        .collect();

    let inferences: Vec<DocInference> = batch
        .par_iter()
        .zip(starts)
        .map(|(doc, start)| infer_document(doc, &fitted.exp_elog_beta, start, params))
        .collect();

    let mut sstats = Array2::<f64>::zeros((k, fitted.num_features()));
    for (doc, inference) in batch.iter().zip(&inferences) {
        for (&id, &r) in doc.ids.iter().zip(inference.ratio.iter()) {
            sstats
                .column_mut(id)
                .scaled_add(r, &inference.exp_doc_topic);
        }
    }
    sstats *= &fitted.exp_elog_beta;
    sstats
}

/// Coordinate ascent on one document's gamma with lambda held fixed.
fn infer_document(
    doc: &SparseDoc,
    exp_topic_word: &Array2<f64>,
    start: Array1<f64>,
    params: &LdaParams,
) -> DocInference {
    let alpha = params.alpha();

    // A blank image carries no evidence: gamma collapses to the prior.
    if doc.ids.is_empty() {
        let gamma = Array1::from_elem(exp_topic_word.nrows(), alpha);
        let exp_doc_topic = exp_dirichlet_expectation(&gamma);
        return DocInference {
            gamma,
            exp_doc_topic,
            ratio: Array1::zeros(0),
        };
    }

    let exp_tw = exp_topic_word.select(Axis(1), &doc.ids);

    let mut gamma = start;
    let mut exp_dt = exp_dirichlet_expectation(&gamma);
    for _ in 0..params.max_doc_update_iter {
        let norm_phi = exp_dt.dot(&exp_tw) + EPS;
        let ratio = &doc.counts / &norm_phi;
        let next = &exp_dt * &exp_tw.dot(&ratio) + alpha;
        exp_dt = exp_dirichlet_expectation(&next);

        let change = mean_abs_change(&gamma, &next);
        gamma = next;
        if change < params.mean_change_tol {
            break;
        }
    }

    let norm_phi = exp_dt.dot(&exp_tw) + EPS;
    let ratio = &doc.counts / &norm_phi;
    DocInference {
        gamma,
        exp_doc_topic: exp_dt,
        ratio,
    }
}

/// Variational bound on the log likelihood of `data`.
fn approx_bound(
    params: &LdaParams,
    fitted: &Fitted,
    data: &Array2<f64>,
    gamma: &Array2<f64>,
) -> f64 {
    let k = params.num_topics;
    let elog_theta = dirichlet_expectation_rows(gamma);
    let elog_beta = dirichlet_expectation_rows(&fitted.lambda);

    // E[log p(pixels | theta, beta)]
    let mut score = 0.0;
    for (d, row) in data.outer_iter().enumerate() {
        for (id, &count) in row.iter().enumerate() {
            if count <= 0.0 {
                continue;
            }
            let terms = (0..k).map(|t| elog_theta[[d, t]] + elog_beta[[t, id]]);
            score += count * log_sum_exp(terms);
        }
    }

    // E[log p(theta | alpha) - log q(theta | gamma)]
    score += dirichlet_log_likelihood(params.alpha(), gamma, &elog_theta, k);
    // E[log p(beta | eta) - log q(beta | lambda)]
    score += dirichlet_log_likelihood(
        params.eta(),
        &fitted.lambda,
        &elog_beta,
        fitted.num_features(),
    );
    score
}

fn dirichlet_log_likelihood(
    prior: f64,
    distr: &Array2<f64>,
    elog: &Array2<f64>,
    size: usize,
) -> f64 {
    let mut score = 0.0;
    Zip::from(distr).and(elog).for_each(|&d, &e| {
        score += (prior - d) * e + ln_gamma(d) - ln_gamma(prior);
    });
    let prior_total = ln_gamma(prior * size as f64);
    for row in distr.rows() {
        score += prior_total - ln_gamma(row.sum());
    }
    score
}

/// E[log x] for x ~ Dirichlet(row), applied to every row.
fn dirichlet_expectation_rows(params: &Array2<f64>) -> Array2<f64> {
    let mut out = params.clone();
    for mut row in out.rows_mut() {
        let total = digamma(row.sum());
        row.mapv_inplace(|x| digamma(x) - total);
    }
    out
}

/// exp(E[log x]) for x ~ Dirichlet(params).
fn exp_dirichlet_expectation(params: &Array1<f64>) -> Array1<f64> {
    let total = digamma(params.sum());
    params.mapv(|x| (digamma(x) - total).exp())
}

fn mean_abs_change(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let total: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    total / a.len().max(1) as f64
}

fn log_sum_exp(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn validate_counts(data: &Array2<f64>) -> Result<()> {
    if data.ncols() == 0 {
        anyhow::bail!("count matrix has no feature columns");
    }
    if let Some(bad) = data.iter().find(|v| !v.is_finite() || **v < 0.0) {
        anyhow::bail!("count matrix contains {bad}; LDA needs non-negative finite counts");
    }
    Ok(())
}
