//! # Classifier Trainer
//!
//! Two-class softmax regression on cell embeddings.
//!
//! - Label-stratified, seeded train/test split
//! - Class weights = inverse class frequency in the training split
//! - Weighted cross-entropy (weighted mean over samples)
//! - Adam for a fixed number of epochs, no early stopping
//!
//! Predictions cover every cell; metrics cover the held-out split only.

use crate::primitives::{
    DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_SEED, DEFAULT_TEST_FRACTION, LOSS_LOG_INTERVAL,
};
use crate::{CellGraphError, Congestion};
use ndarray::{Array1, Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const CLASSES: usize = 2;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Trainer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Fraction of cells held out for evaluation.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

// =============================================================================
// STRATIFIED SPLIT
// =============================================================================

/// Train/test indices, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split indices so each class is held out in proportion to its size.
///
/// The test set has `ceil(fraction * n)` members. Each class gets the floor
/// of its proportional share; leftover slots go to the classes with the
/// largest fractional remainder (lower class first on ties). Members are
/// drawn from a seeded shuffle of each class.
pub fn stratified_split(
    labels: &[Congestion],
    test_fraction: f64,
    seed: u64,
) -> Result<StratifiedSplit, CellGraphError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CellGraphError::InvalidConfig(format!(
            "test fraction {} must lie in (0, 1)",
            test_fraction
        )));
    }
    let n = labels.len();
    if n == 0 {
        return Err(CellGraphError::EmptyGraph);
    }

    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);

    let mut by_class: [Vec<usize>; CLASSES] = [Vec::new(), Vec::new()];
    for (i, label) in labels.iter().enumerate() {
        by_class[label.index()].push(i);
    }

    let mut quota = [0usize; CLASSES];
    let mut remainders = Vec::with_capacity(CLASSES);
    for class in 0..CLASSES {
        let exact = by_class[class].len() as f64 * n_test as f64 / n as f64;
        quota[class] = exact.floor() as usize;
        remainders.push((exact - exact.floor(), class));
    }
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut left = n_test.saturating_sub(quota.iter().sum());
    for (_, class) in remainders {
        if left == 0 {
            break;
        }
        if quota[class] < by_class[class].len() {
            quota[class] += 1;
            left -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for class in 0..CLASSES {
        let mut members = by_class[class].clone();
        members.shuffle(&mut rng);
        let (held_out, kept) = members.split_at(quota[class]);
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(StratifiedSplit { train, test })
}

/// Inverse-frequency weight per class.
///
/// A class with no member makes its weight undefined; that is an error.
pub fn class_weights(labels: &[Congestion]) -> Result<[f64; CLASSES], CellGraphError> {
    let mut counts = [0usize; CLASSES];
    for label in labels {
        counts[label.index()] += 1;
    }
    let mut weights = [0.0; CLASSES];
    for class in 0..CLASSES {
        if counts[class] == 0 {
            return Err(CellGraphError::ClassAbsent {
                class: Congestion::from_index(class),
            });
        }
        weights[class] = 1.0 / counts[class] as f64;
    }
    Ok(weights)
}

// =============================================================================
// LINEAR CLASSIFIER
// =============================================================================

/// Single affine layer producing two logits.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    /// `2 x d`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearClassifier {
    /// Zero-initialized classifier for `dim`-wide inputs.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            weights: Array2::zeros((CLASSES, dim)),
            bias: Array1::zeros(CLASSES),
        }
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// `n x 2` logits.
    #[must_use]
    pub fn logits(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut z = x.dot(&self.weights.t());
        z += &self.bias;
        z
    }

    /// Argmax of the softmax for every row. Ties resolve to the clear class.
    #[must_use]
    pub fn predict(&self, x: &Array2<f64>) -> Vec<Congestion> {
        self.logits(x)
            .rows()
            .into_iter()
            .map(|row| {
                if row[1] > row[0] {
                    Congestion::Congested
                } else {
                    Congestion::Clear
                }
            })
            .collect()
    }

    /// Weighted cross-entropy and its gradients w.r.t. weights and bias.
    fn loss_and_gradients(
        &self,
        x: &Array2<f64>,
        labels: &[Congestion],
        class_weights: &[f64; CLASSES],
    ) -> (f64, Array2<f64>, Array1<f64>) {
        let logits = self.logits(x);
        let mut dz = Array2::zeros(logits.raw_dim());
        let mut loss = 0.0;
        let mut norm = 0.0;

        for (i, row) in logits.rows().into_iter().enumerate() {
            let y = labels[i].index();
            let w = class_weights[y];
            let max = row.fold(f64::NEG_INFINITY, |m, v| m.max(*v));
            let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f64>().ln() + max;
            loss += w * (log_sum - row[y]);
            norm += w;
            for c in 0..CLASSES {
                let p = (row[c] - log_sum).exp();
                let target = if c == y { 1.0 } else { 0.0 };
                dz[[i, c]] = w * (p - target);
            }
        }

        if norm > 0.0 {
            loss /= norm;
            dz /= norm;
        }
        let grad_w = dz.t().dot(x);
        let grad_b = dz.sum_axis(Axis(0));
        (loss, grad_w, grad_b)
    }
}

// =============================================================================
// ADAM
// =============================================================================

/// Adam optimizer state for a [`LinearClassifier`].
#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    step: i32,
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Adam {
    fn new(model: &LinearClassifier, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
            m_w: Array2::zeros(model.weights.raw_dim()),
            v_w: Array2::zeros(model.weights.raw_dim()),
            m_b: Array1::zeros(model.bias.raw_dim()),
            v_b: Array1::zeros(model.bias.raw_dim()),
        }
    }

    fn update(&mut self, model: &mut LinearClassifier, grad_w: &Array2<f64>, grad_b: &Array1<f64>) {
        self.step = self.step.saturating_add(1);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let step_size = self.learning_rate / (1.0 - b1.powi(self.step));
        let bc2_sqrt = (1.0 - b2.powi(self.step)).sqrt();

        let apply = |p: &mut f64, m: &mut f64, v: &mut f64, g: f64| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            *p -= step_size * *m / (v.sqrt() / bc2_sqrt + eps);
        };

        Zip::from(&mut model.weights)
            .and(&mut self.m_w)
            .and(&mut self.v_w)
            .and(grad_w)
            .for_each(|p, m, v, g| apply(p, m, v, *g));
        Zip::from(&mut model.bias)
            .and(&mut self.m_b)
            .and(&mut self.v_b)
            .and(grad_b)
            .for_each(|p, m, v, g| apply(p, m, v, *g));
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Held-out metrics; the congested class is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// 0 when nothing was predicted congested.
    pub precision: f64,
    /// 0 when no held-out cell is congested.
    pub recall: f64,
    pub support: usize,
}

/// Compare predictions with ground truth.
#[must_use]
pub fn evaluate(truth: &[Congestion], predicted: &[Congestion]) -> EvaluationMetrics {
    let mut correct = 0usize;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (t, p) in truth.iter().zip(predicted) {
        if t == p {
            correct += 1;
        }
        match (t.is_congested(), p.is_congested()) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let support = truth.len().min(predicted.len());
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    EvaluationMetrics {
        accuracy: ratio(correct, support),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
        support,
    }
}

// =============================================================================
// TRAINER
// =============================================================================

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// One prediction per cell, in index order.
    pub predictions: Vec<Congestion>,
    /// Loss before each epoch's update.
    pub loss_history: Vec<f64>,
    pub class_weights: [f64; CLASSES],
    pub split: StratifiedSplit,
    pub metrics: EvaluationMetrics,
    pub model: LinearClassifier,
}

/// Fits a [`LinearClassifier`] on embeddings and labels.
#[derive(Debug, Clone, Default)]
pub struct ClassifierTrainer {
    config: TrainerConfig,
}

impl ClassifierTrainer {
    #[must_use]
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        embeddings: &Array2<f64>,
        labels: &[Congestion],
    ) -> Result<TrainingOutcome, CellGraphError> {
        if embeddings.nrows() != labels.len() {
            return Err(CellGraphError::DimensionMismatch {
                expected: labels.len(),
                found: embeddings.nrows(),
            });
        }
        if self.config.epochs == 0 || self.config.learning_rate <= 0.0 {
            return Err(CellGraphError::InvalidConfig(
                "epochs and learning rate must be positive".to_string(),
            ));
        }

        let split = stratified_split(labels, self.config.test_fraction, self.config.seed)?;
        let train_x = embeddings.select(Axis(0), &split.train);
        let train_y: Vec<Congestion> = split.train.iter().map(|&i| labels[i]).collect();
        let weights = class_weights(&train_y)?;
        tracing::info!(weights = ?weights, train = split.train.len(), test = split.test.len(), "class weights");

        let mut model = LinearClassifier::new(embeddings.ncols());
        let mut adam = Adam::new(&model, self.config.learning_rate);
        let mut loss_history = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            let (loss, grad_w, grad_b) = model.loss_and_gradients(&train_x, &train_y, &weights);
            adam.update(&mut model, &grad_w, &grad_b);
            if epoch % LOSS_LOG_INTERVAL == 0 {
                tracing::info!(epoch, loss = format!("{:.4}", loss), "training");
            }
            loss_history.push(loss);
        }

        let predictions = model.predict(embeddings);
        let test_truth: Vec<Congestion> = split.test.iter().map(|&i| labels[i]).collect();
        let test_pred: Vec<Congestion> = split.test.iter().map(|&i| predictions[i]).collect();
        let metrics = evaluate(&test_truth, &test_pred);

        Ok(TrainingOutcome {
            predictions,
            loss_history,
            class_weights: weights,
            split,
            metrics,
            model,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
