use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::data::{Dataset, RankedList, SortOrder, Template};
use crate::stat::{mean, median, pearson, std_dev};
use crate::{Error, Result};

/// Function that scores one feature's expression against a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    SignalToNoise,
    TTest,
    RatioOfClasses,
    Log2RatioOfClasses,
    DiffOfClasses,
    Pearson,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::SignalToNoise,
        Metric::TTest,
        Metric::RatioOfClasses,
        Metric::Log2RatioOfClasses,
        Metric::DiffOfClasses,
        Metric::Pearson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::SignalToNoise => "signal_to_noise",
            Metric::TTest => "t_test",
            Metric::RatioOfClasses => "ratio_of_classes",
            Metric::Log2RatioOfClasses => "log2_ratio_of_classes",
            Metric::DiffOfClasses => "diff_of_classes",
            Metric::Pearson => "pearson",
        }
    }

    /// Metrics comparing class A against class B of a categorical template.
    pub fn is_two_class(&self) -> bool {
        !matches!(self, Metric::Pearson)
    }

    /// Fewest samples each class must have.
    pub fn min_samples_per_class(&self) -> usize {
        match self {
            Metric::SignalToNoise | Metric::TTest => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Metric> {
        Metric::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::BadParam(format!("unknown metric `{}`", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    /// Use the class median instead of the mean as the class center. Sigma
    /// is the class standard deviation either way.
    pub use_median: bool,
    /// Divide by n instead of n - 1 for the standard deviation.
    pub use_biased: bool,
    /// Floor each class sigma at 0.2 * |center| (0.2 when the center is 0).
    pub fix_low_variance: bool,
}

impl Default for MetricParams {
    fn default() -> Self {
        MetricParams {
            use_median: false,
            use_biased: false,
            fix_low_variance: true,
        }
    }
}

struct ClassStats {
    center: f64,
    sigma: f64,
    n: usize,
}

impl ClassStats {
    fn of(values: &[f64], params: &MetricParams) -> ClassStats {
        let center = if params.use_median {
            median(values)
        } else {
            mean(values)
        };
        let mut sigma = std_dev(values, params.use_biased);
        if params.fix_low_variance {
            let floor = if center == 0.0 { 0.2 } else { 0.2 * center.abs() };
            sigma = sigma.max(floor);
        }
        ClassStats {
            center,
            sigma,
            n: values.len(),
        }
    }
}

/// Turns a dataset and a template into a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ranker {
    pub metric: Metric,
    pub params: MetricParams,
    pub order: SortOrder,
}

impl Ranker {
    pub fn new(metric: Metric, params: MetricParams, order: SortOrder) -> Ranker {
        Ranker {
            metric,
            params,
            order,
        }
    }

    fn mismatch(&self, template: &Template, reason: impl Into<String>) -> Error {
        Error::MismatchedTemplate {
            template: template.name().to_owned(),
            metric: self.metric.to_string(),
            reason: reason.into(),
        }
    }

    /// Checks that `template` can be scored with this metric.
    ///
    /// # Errors
    ///
    /// [`Error::MismatchedTemplate`] for a template of the wrong kind or
    /// class count, [`Error::InsufficientSamples`] for a class below
    /// [`Metric::min_samples_per_class`].
    pub fn validate(&self, template: &Template) -> Result<()> {
        if !self.metric.is_two_class() {
            if template.is_categorical() {
                return Err(self.mismatch(template, "metric needs a continuous template"));
            }
            if template.num_samples() < 3 {
                return Err(self.mismatch(template, "correlation needs at least 3 samples"));
            }
            return Ok(());
        }
        if !template.is_categorical() {
            return Err(self.mismatch(template, "metric needs a categorical template"));
        }
        if !template.is_biphasic() {
            return Err(self.mismatch(
                template,
                format!("expected 2 classes, found {}", template.num_classes()),
            ));
        }
        let required = self.metric.min_samples_per_class();
        for (class, &found) in template.class_sizes().iter().enumerate() {
            if found < required {
                return Err(Error::InsufficientSamples {
                    class: template.class_name(class).unwrap_or_default().to_owned(),
                    metric: self.metric.to_string(),
                    found,
                    required,
                });
            }
        }
        Ok(())
    }

    fn score_row(&self, row: ArrayView1<'_, f64>, template: &Template) -> f64 {
        match template {
            Template::Continuous { values, .. } => {
                let x: Vec<f64> = row.iter().copied().collect();
                pearson(&x, values)
            }
            Template::Categorical { assignments, .. } => {
                let mut a = Vec::new();
                let mut b = Vec::new();
                for (&v, &class) in row.iter().zip(assignments.iter()) {
                    if class == 0 {
                        a.push(v);
                    } else {
                        b.push(v);
                    }
                }
                let a = ClassStats::of(&a, &self.params);
                let b = ClassStats::of(&b, &self.params);
                match self.metric {
                    Metric::SignalToNoise => (a.center - b.center) / (a.sigma + b.sigma),
                    Metric::TTest => {
                        (a.center - b.center)
                            / (a.sigma * a.sigma / a.n as f64 + b.sigma * b.sigma / b.n as f64)
                                .sqrt()
                    }
                    Metric::RatioOfClasses => a.center / b.center,
                    Metric::Log2RatioOfClasses => (a.center / b.center).log2(),
                    Metric::DiffOfClasses => a.center - b.center,
                    Metric::Pearson => f64::NAN,
                }
            }
        }
    }

    /// Scores every feature of `dataset` against `template` and sorts.
    /// Features whose score is undefined or infinite get NaN and sink to the
    /// bottom.
    pub fn rank(&self, dataset: &Dataset, template: &Template) -> Result<RankedList> {
        self.validate(template)?;
        if template.num_samples() != dataset.num_samples() {
            return Err(self.mismatch(
                template,
                format!(
                    "template has {} samples, dataset `{}` has {}",
                    template.num_samples(),
                    dataset.name,
                    dataset.num_samples()
                ),
            ));
        }
        let scores: Vec<f64> = dataset
            .matrix()
            .outer_iter()
            .map(|row| self.score_row(row, template))
            .map(|s| if s.is_finite() { s } else { f64::NAN })
            .collect();
        let degenerate = scores.iter().filter(|s| s.is_nan()).count();
        if degenerate > 0 {
            debug!(
                "{} of {} features have no finite {} score",
                degenerate,
                scores.len(),
                self.metric
            );
        }
        RankedList::new(
            format!("{}_{}", dataset.name, template.name()),
            dataset.features().to_vec(),
            scores,
            self.order,
        )
    }
}
