// src/completion.rs - Consecutive-success counting for a single practice exercise
use crate::config::CompletionConfig;
use crate::stabilizer::StableRecognition;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress { consecutive: u32 },
    /// Returned exactly once, on the event that completes the task.
    JustCompleted,
    Completed,
}

impl TaskStatus {
    pub fn is_completed(self) -> bool {
        !matches!(self, TaskStatus::InProgress { .. })
    }
}

/// InProgress -> Completed, irreversible. A new exercise gets a new tracker.
#[derive(Debug, Clone, Default)]
pub struct TaskCompletionTracker {
    config: CompletionConfig,
    consecutive_correct: u32,
    completed: bool,
}

impl TaskCompletionTracker {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            config,
            consecutive_correct: 0,
            completed: false,
        }
    }

    pub fn observe(&mut self, event: &StableRecognition, target_label: &str) -> TaskStatus {
        if self.completed {
            return TaskStatus::Completed;
        }

        if event.label == target_label && event.confidence >= self.config.min_confidence {
            self.consecutive_correct += 1;
        } else {
            self.consecutive_correct = 0;
        }

        if self.consecutive_correct >= self.config.required_consecutive {
            self.completed = true;
            TaskStatus::JustCompleted
        } else {
            TaskStatus::InProgress {
                consecutive: self.consecutive_correct,
            }
        }
    }

    pub fn consecutive_correct(&self) -> u32 {
        self.consecutive_correct
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Recognized { label: String, confidence: f64 },
    TaskCompleted { label: String },
}

/// Consumer side of a recognition session for one target letter.
#[derive(Debug, Clone)]
pub struct ExerciseSession {
    target_label: String,
    tracker: TaskCompletionTracker,
}

impl ExerciseSession {
    pub fn new(target_label: impl Into<String>, config: CompletionConfig) -> Self {
        Self {
            target_label: target_label.into(),
            tracker: TaskCompletionTracker::new(config),
        }
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn is_completed(&self) -> bool {
        self.tracker.is_completed()
    }

    pub fn consecutive_correct(&self) -> u32 {
        self.tracker.consecutive_correct()
    }

    /// UI events for one stable recognition, in display order.
    pub fn handle(&mut self, event: &StableRecognition) -> Vec<UiEvent> {
        if self.tracker.is_completed() {
            return Vec::new();
        }

        let mut out = vec![UiEvent::Recognized {
            label: event.label.clone(),
            confidence: event.confidence,
        }];
        if self.tracker.observe(event, &self.target_label) == TaskStatus::JustCompleted {
            info!("Exercise for '{}' completed", self.target_label);
            out.push(UiEvent::TaskCompleted {
                label: self.target_label.clone(),
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(label: &str) -> StableRecognition {
        StableRecognition {
            label: label.to_string(),
            confidence: 0.92,
            timestamp: Duration::ZERO,
        }
    }

    #[test]
    fn test_completes_after_three_matches() {
        let mut tracker = TaskCompletionTracker::default();
        assert_eq!(tracker.observe(&event("A"), "A"), TaskStatus::InProgress { consecutive: 1 });
        assert_eq!(tracker.observe(&event("A"), "A"), TaskStatus::InProgress { consecutive: 2 });
        assert_eq!(tracker.observe(&event("A"), "A"), TaskStatus::JustCompleted);
        assert!(tracker.is_completed());
    }

    #[test]
    fn test_mismatch_resets_count() {
        let mut tracker = TaskCompletionTracker::default();
        tracker.observe(&event("A"), "A");
        tracker.observe(&event("A"), "A");
        assert_eq!(tracker.observe(&event("S"), "A"), TaskStatus::InProgress { consecutive: 0 });
        tracker.observe(&event("A"), "A");
        tracker.observe(&event("A"), "A");
        assert!(!tracker.is_completed());
        assert_eq!(tracker.observe(&event("A"), "A"), TaskStatus::JustCompleted);
    }

    #[test]
    fn test_completion_is_terminal() {
        let mut tracker = TaskCompletionTracker::default();
        for _ in 0..3 {
            tracker.observe(&event("B"), "B");
        }
        assert_eq!(tracker.observe(&event("X"), "B"), TaskStatus::Completed);
        assert_eq!(tracker.observe(&event("B"), "B"), TaskStatus::Completed);
        assert!(tracker.is_completed());
    }

    #[test]
    fn test_weak_match_does_not_count() {
        let mut tracker = TaskCompletionTracker::default();
        let weak = StableRecognition {
            confidence: 0.5,
            ..event("A")
        };
        tracker.observe(&event("A"), "A");
        assert_eq!(tracker.observe(&weak, "A"), TaskStatus::InProgress { consecutive: 0 });
    }

    #[test]
    fn test_exercise_emits_completion_once() {
        let mut exercise = ExerciseSession::new("C", CompletionConfig::default());
        let mut completions = 0;
        for _ in 0..6 {
            completions += exercise
                .handle(&event("C"))
                .iter()
                .filter(|e| matches!(e, UiEvent::TaskCompleted { .. }))
                .count();
        }
        assert_eq!(completions, 1);
        assert!(exercise.is_completed());
        assert!(exercise.handle(&event("C")).is_empty());
    }
}
