//! Class vocabulary derived from the annotation corpus.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered, duplicate-free list of class names.
///
/// Names are sorted lexicographically (byte order), so the index of a class
/// only depends on the set of names in the corpus, never on file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    /// Build the vocabulary from every class-name occurrence in the corpus.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        Self {
            names: unique.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .ok()
    }

    /// One-hot vector for `name`, or `None` if the class is unknown.
    pub fn class_vector(&self, name: &str) -> Option<Array1<f32>> {
        let index = self.index_of(name)?;
        let mut vector = Array1::zeros(self.len());
        vector[index] = 1.0;
        Some(vector)
    }

    /// One-hot vectors for every class, in vocabulary order.
    pub fn class_vectors(&self) -> Vec<(&str, Array1<f32>)> {
        self.one_hot_matrix()
            .outer_iter()
            .zip(&self.names)
            .map(|(row, name)| (name.as_str(), row.to_owned()))
            .collect()
    }

    /// The class vectors stacked row-wise: the identity over the vocabulary.
    pub fn one_hot_matrix(&self) -> Array2<f32> {
        Array2::eye(self.len())
    }
}
