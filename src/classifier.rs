// src/classifier.rs - Pose classifier contract and its probability output
use crate::normalizer::FeatureVector;
use std::collections::BTreeMap;
use thiserror::Error;

/// Closed label set of the alphabet pose model.
pub const ASL_LABELS: [&str; 28] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J",
    "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T",
    "U", "V", "W", "X", "Y", "Z", "SPACE", "NOTHING",
];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelProbabilities {
    probabilities: BTreeMap<String, f64>,
}

impl LabelProbabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, probability: f64) -> Self {
        self.insert(label, probability);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, probability: f64) {
        self.probabilities.insert(label.into(), probability);
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.probabilities.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Highest-probability label. Ties resolve to the alphabetically first label.
    pub fn top(&self) -> Option<(&str, f64)> {
        self.probabilities
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (label, &p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((label.as_str(), p)),
            })
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for LabelProbabilities {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut probabilities = Self::new();
        for (label, p) in iter {
            probabilities.insert(label, p);
        }
        probabilities
    }
}

/// Maps one normalized hand pose to a distribution over labels.
pub trait Classifier: Send {
    fn classify(&mut self, features: &FeatureVector) -> Result<LabelProbabilities, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(
        &mut self,
        features: &FeatureVector,
    ) -> Result<LabelProbabilities, ClassifierError> {
        (**self).classify(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_picks_highest() {
        let probs: LabelProbabilities = [("A", 0.1), ("B", 0.7), ("C", 0.2)].into_iter().collect();
        assert_eq!(probs.top(), Some(("B", 0.7)));
    }

    #[test]
    fn test_top_tie_is_alphabetical() {
        let probs = LabelProbabilities::new().with("M", 0.45).with("E", 0.45).with("S", 0.1);
        assert_eq!(probs.top(), Some(("E", 0.45)));
    }

    #[test]
    fn test_empty_has_no_top() {
        assert_eq!(LabelProbabilities::new().top(), None);
    }

    #[test]
    fn test_label_set() {
        assert_eq!(ASL_LABELS.len(), 28);
        assert!(ASL_LABELS.contains(&"SPACE"));
        assert!(ASL_LABELS.contains(&"NOTHING"));
    }
}
