use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Phenotype labels for the samples of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Template {
    /// Each sample is assigned to one of `classes`.
    Categorical {
        name: String,
        classes: Vec<String>,
        assignments: Vec<usize>,
    },
    /// A numeric phenotype value per sample.
    Continuous { name: String, values: Vec<f64> },
}

impl Template {
    /// Classes are numbered in order of first appearance, so the first label
    /// seen is class 0 ("class A").
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, labels: &[S]) -> Result<Template> {
        if labels.is_empty() {
            return Err(Error::BadParam("template has no samples".to_owned()));
        }
        let mut classes: Vec<String> = Vec::new();
        let mut assignments = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            let class = match classes.iter().position(|c| c == label) {
                Some(i) => i,
                None => {
                    classes.push(label.to_owned());
                    classes.len() - 1
                }
            };
            assignments.push(class);
        }
        Ok(Template::Categorical {
            name: name.into(),
            classes,
            assignments,
        })
    }

    pub fn continuous(name: impl Into<String>, values: Vec<f64>) -> Result<Template> {
        if values.is_empty() {
            return Err(Error::BadParam("template has no samples".to_owned()));
        }
        Ok(Template::Continuous {
            name: name.into(),
            values,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Template::Categorical { name, .. } | Template::Continuous { name, .. } => name,
        }
    }

    pub fn num_samples(&self) -> usize {
        match self {
            Template::Categorical { assignments, .. } => assignments.len(),
            Template::Continuous { values, .. } => values.len(),
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Template::Categorical { .. })
    }

    pub fn num_classes(&self) -> usize {
        match self {
            Template::Categorical { classes, .. } => classes.len(),
            Template::Continuous { .. } => 0,
        }
    }

    /// True for a categorical template with exactly two classes.
    pub fn is_biphasic(&self) -> bool {
        self.num_classes() == 2
    }

    /// Number of samples in each class, indexed by class.
    pub fn class_sizes(&self) -> Vec<usize> {
        match self {
            Template::Categorical {
                classes,
                assignments,
                ..
            } => {
                let mut sizes = vec![0; classes.len()];
                for &a in assignments {
                    sizes[a] += 1;
                }
                sizes
            }
            Template::Continuous { .. } => Vec::new(),
        }
    }

    pub fn class_name(&self, class: usize) -> Option<&str> {
        match self {
            Template::Categorical { classes, .. } => classes.get(class).map(String::as_str),
            Template::Continuous { .. } => None,
        }
    }

    /// Same template with the sample labels (or values) permuted.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Template {
        match self {
            Template::Categorical {
                name,
                classes,
                assignments,
            } => {
                let mut assignments = assignments.clone();
                assignments.shuffle(rng);
                Template::Categorical {
                    name: name.clone(),
                    classes: classes.clone(),
                    assignments,
                }
            }
            Template::Continuous { name, values } => {
                let mut values = values.clone();
                values.shuffle(rng);
                Template::Continuous {
                    name: name.clone(),
                    values,
                }
            }
        }
    }

    /// `n` label permutations. Permutation `i` is drawn from its own generator
    /// seeded with `seed + i`, so the set is reproducible and each entry is
    /// independent of how many others were requested.
    pub fn random_templates(&self, n: usize, seed: u64) -> Vec<Template> {
        (0..n)
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64));
                let mut t = self.shuffled(&mut rng);
                match &mut t {
                    Template::Categorical { name, .. } | Template::Continuous { name, .. } => {
                        *name = format!("{}_perm{}", self.name(), i + 1)
                    }
                }
                t
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_classes_in_first_seen_order() {
        let t = Template::categorical("p53", &["MUT", "MUT", "WT", "MUT", "WT"]).unwrap();
        assert!(t.is_biphasic());
        assert_eq!(t.class_name(0), Some("MUT"));
        assert_eq!(t.class_sizes(), vec![3, 2]);
    }

    #[test]
    fn random_templates_are_reproducible_permutations() {
        let t = Template::categorical("t", &["A", "A", "A", "B", "B", "B", "B"]).unwrap();
        let a = t.random_templates(5, 7);
        let b = t.random_templates(5, 7);
        assert_eq!(a, b);
        for r in &a {
            assert_eq!(r.class_sizes(), vec![3, 4]);
        }
        assert_eq!(a[0].name(), "t_perm1");
    }
}
