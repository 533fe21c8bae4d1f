// src/stabilizer.rs - Rate-limited majority voting with hysteresis over classifier output
use crate::classifier::LabelProbabilities;
use crate::config::StabilizerConfig;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSample {
    pub label: String,
    pub confidence: f64,
    pub timestamp: Duration,
}

/// A label that dominated the recent window across consecutive evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct StableRecognition {
    pub label: String,
    /// Mean confidence of the winning group in the history window.
    pub confidence: f64,
    pub timestamp: Duration,
}

/// Result of feeding one classification into the stabilizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    BelowThreshold { label: Option<String>, confidence: f64 },
    NoMajority { label: String, votes: usize },
    LowConfidence { label: String, mean_confidence: f64 },
    Confirming { label: String, streak: u32 },
    Stable(StableRecognition),
}

impl Tick {
    pub fn stable(&self) -> Option<&StableRecognition> {
        match self {
            Tick::Stable(event) => Some(event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilizerSnapshot {
    pub last_stable_label: Option<String>,
    pub stability_count: u32,
    pub history_len: usize,
    pub last_classification: Option<Duration>,
}

struct Group<'a> {
    label: &'a str,
    votes: usize,
    confidence_sum: f64,
    newest: usize,
}

pub struct PredictionStabilizer {
    config: StabilizerConfig,
    history: VecDeque<PredictionSample>,
    last_stable_label: Option<String>,
    stability_count: u32,
    last_classification: Option<Duration>,
}

impl PredictionStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let capacity = config.history_size;
        Self {
            config,
            history: VecDeque::with_capacity(capacity),
            last_stable_label: None,
            stability_count: 0,
            last_classification: None,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Whether a classification may run at `now`. The first one of a session always may.
    pub fn is_due(&self, now: Duration) -> bool {
        match self.last_classification {
            None => true,
            Some(last) => {
                now >= last && now - last >= self.config.classification_interval()
            }
        }
    }

    /// Claims the classification slot for `now` if the interval has elapsed.
    pub fn begin_classification(&mut self, now: Duration) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_classification = Some(now);
        true
    }

    pub fn observe(&mut self, probabilities: &LabelProbabilities, now: Duration) -> Tick {
        let (label, confidence) = match probabilities.top() {
            Some((label, p)) if p > self.config.sample_threshold => (label.to_string(), p),
            top => {
                self.stability_count = 0;
                return Tick::BelowThreshold {
                    label: top.map(|(label, _)| label.to_string()),
                    confidence: top.map(|(_, p)| p).unwrap_or(0.0),
                };
            }
        };

        self.history.push_back(PredictionSample {
            label,
            confidence,
            timestamp: now,
        });
        while self.history.len() > self.config.history_size {
            self.history.pop_front();
        }

        let (label, votes, mean_confidence) = match self.majority() {
            Some(group) => (
                group.label.to_string(),
                group.votes,
                group.confidence_sum / group.votes as f64,
            ),
            None => return Tick::NoMajority { label: String::new(), votes: 0 },
        };

        if votes < self.config.min_majority {
            return Tick::NoMajority { label, votes };
        }
        if mean_confidence <= self.config.min_mean_confidence {
            return Tick::LowConfidence { label, mean_confidence };
        }

        if self.last_stable_label.as_deref() == Some(label.as_str()) {
            self.stability_count += 1;
        } else {
            self.stability_count = 0;
            self.last_stable_label = Some(label.clone());
        }

        if self.stability_count >= self.config.required_streak {
            Tick::Stable(StableRecognition {
                label,
                confidence: mean_confidence,
                timestamp: now,
            })
        } else {
            Tick::Confirming {
                label,
                streak: self.stability_count,
            }
        }
    }

    // Largest label group in the window; equal groups go to whichever label
    // was seen most recently.
    fn majority(&self) -> Option<Group<'_>> {
        let mut groups: HashMap<&str, Group<'_>> = HashMap::new();
        for (i, sample) in self.history.iter().enumerate() {
            let group = groups.entry(sample.label.as_str()).or_insert(Group {
                label: sample.label.as_str(),
                votes: 0,
                confidence_sum: 0.0,
                newest: 0,
            });
            group.votes += 1;
            group.confidence_sum += sample.confidence;
            group.newest = i;
        }

        groups
            .into_values()
            .max_by(|a, b| a.votes.cmp(&b.votes).then(a.newest.cmp(&b.newest)))
    }

    pub fn history(&self) -> impl Iterator<Item = &PredictionSample> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_stable_label = None;
        self.stability_count = 0;
        self.last_classification = None;
    }

    pub fn snapshot(&self) -> StabilizerSnapshot {
        StabilizerSnapshot {
            last_stable_label: self.last_stable_label.clone(),
            stability_count: self.stability_count,
            history_len: self.history.len(),
            last_classification: self.last_classification,
        }
    }
}

impl Default for PredictionStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}
