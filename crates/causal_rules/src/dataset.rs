//! Aligned observation data and the honest discovery/inference split.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// One observation set: outcome, binary treatment, covariates and an
/// optional pre-computed ITE vector, all aligned by row.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub outcome: Vec<f64>,
    pub treatment: Vec<f64>,
    pub covariates: DataFrame,
    pub ite: Option<Vec<f64>>,
}

impl Dataset {
    /// Build a dataset, checking row alignment and that treatment is 0/1.
    pub fn new(
        outcome: Vec<f64>,
        treatment: Vec<f64>,
        covariates: DataFrame,
        ite: Option<Vec<f64>>,
    ) -> Result<Self> {
        let n = outcome.len();
        if treatment.len() != n || covariates.height() != n {
            return Err(Error::InvalidInput(format!(
                "misaligned inputs: outcome has {} rows, treatment {}, covariates {}",
                n,
                treatment.len(),
                covariates.height()
            )));
        }
        if let Some(ite) = &ite {
            if ite.len() != n {
                return Err(Error::InvalidInput(format!(
                    "ite has {} rows but the outcome has {}",
                    ite.len(),
                    n
                )));
            }
        }
        if n == 0 {
            return Err(Error::InvalidInput("empty dataset".to_string()));
        }
        if treatment.iter().any(|&z| z != 0.0 && z != 1.0) {
            return Err(Error::InvalidInput(
                "treatment must be binary 0/1".to_string(),
            ));
        }
        Ok(Dataset {
            outcome,
            treatment,
            covariates,
            ite,
        })
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    /// Partition into disjoint discovery and inference subsamples.
    ///
    /// `ratio` is the fraction of rows assigned to discovery, drawn uniformly
    /// without replacement and without stratification. A supplied ITE vector
    /// follows the same row assignment. Reproducible for a fixed `seed`.
    pub fn honest_split(&self, ratio: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(Error::InvalidInput(format!(
                "split ratio must lie in (0, 1), got {}",
                ratio
            )));
        }

        let n = self.len();
        if n < 2 {
            return Err(Error::InvalidInput(
                "need at least 2 rows for an honest split".to_string(),
            ));
        }
        let n_dis = ((n as f64) * ratio).round() as usize;
        let n_dis = n_dis.clamp(1, n - 1);

        // Fisher-Yates over the row index vector
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices: Vec<u32> = (0..n as u32).collect();
        for i in (1..n).rev() {
            let j = rng.random_range(0..=i);
            indices.swap(i, j);
        }

        let mut discovery: Vec<u32> = indices[..n_dis].to_vec();
        let mut inference: Vec<u32> = indices[n_dis..].to_vec();
        discovery.sort_unstable();
        inference.sort_unstable();

        Ok((self.subset(&discovery)?, self.subset(&inference)?))
    }

    fn subset(&self, rows: &[u32]) -> Result<Dataset> {
        let idx = UInt32Chunked::from_vec(PlSmallStr::from_static("idx"), rows.to_vec());
        let covariates = self
            .covariates
            .take(&idx)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let outcome = rows.iter().map(|&i| self.outcome[i as usize]).collect();
        let treatment = rows.iter().map(|&i| self.treatment[i as usize]).collect();
        let ite = self
            .ite
            .as_ref()
            .map(|ite| rows.iter().map(|&i| ite[i as usize]).collect());
        Ok(Dataset {
            outcome,
            treatment,
            covariates,
            ite,
        })
    }
}
