use ndarray::{Array2, ArrayView1};

use crate::{Error, Result};

/// Expression matrix with one row per feature and one column per sample.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    features: Vec<String>,
    samples: Vec<String>,
    matrix: Array2<f64>,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        features: Vec<String>,
        samples: Vec<String>,
        matrix: Array2<f64>,
    ) -> Result<Dataset> {
        let (rows, cols) = matrix.dim();
        if rows != features.len() || cols != samples.len() {
            return Err(Error::BadParam(format!(
                "matrix is {}x{} but {} features and {} samples were named",
                rows,
                cols,
                features.len(),
                samples.len()
            )));
        }
        Ok(Dataset {
            name: name.into(),
            features,
            samples,
            matrix,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn row(&self, feature: usize) -> ArrayView1<'_, f64> {
        self.matrix.row(feature)
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}
