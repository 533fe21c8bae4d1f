// src/diagnostics.rs - Per-frame outcome trace with CSV and JSON summary export
use crate::pipeline::FrameOutcome;
use crate::stabilizer::Tick;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CLASSIFIER_UNAVAILABLE: &str = "classifier_unavailable";

#[derive(Debug, Serialize)]
struct DiagnosticsRecord {
    frame: u64,
    timestamp_ms: u64,
    outcome: &'static str,
    skip_reason: Option<&'static str>,
    label: Option<String>,
    confidence: Option<f64>,
    streak: Option<u32>,
    stable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticsSummary {
    pub session_name: String,
    pub total_frames: u64,
    pub skipped_frames: u64,
    pub skips_by_reason: BTreeMap<String, u64>,
    pub rate_limited_frames: u64,
    pub classifications: u64,
    pub stable_events: u64,
    pub usable_frame_rate: f64,
    pub longest_skip_run: u64,
}

pub struct DiagnosticsRecorder {
    session_name: String,
    records: Vec<DiagnosticsRecord>,
}

impl DiagnosticsRecorder {
    pub fn new(session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            session_name,
            records: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&mut self, outcome: &FrameOutcome, timestamp: Duration) {
        let mut record = DiagnosticsRecord {
            frame: self.records.len() as u64,
            timestamp_ms: timestamp.as_millis() as u64,
            outcome: "",
            skip_reason: None,
            label: None,
            confidence: None,
            streak: None,
            stable: false,
        };

        match outcome {
            FrameOutcome::Skipped(reason) => {
                record.outcome = "skipped";
                record.skip_reason = Some(reason.as_str());
            }
            FrameOutcome::RateLimited => record.outcome = "rate_limited",
            FrameOutcome::Classified(tick) => {
                record.outcome = "classified";
                match tick {
                    Tick::BelowThreshold { label, confidence } => {
                        record.label = label.clone();
                        record.confidence = Some(*confidence);
                    }
                    Tick::NoMajority { label, .. } => record.label = Some(label.clone()),
                    Tick::LowConfidence { label, mean_confidence } => {
                        record.label = Some(label.clone());
                        record.confidence = Some(*mean_confidence);
                    }
                    Tick::Confirming { label, streak } => {
                        record.label = Some(label.clone());
                        record.streak = Some(*streak);
                    }
                    Tick::Stable(event) => {
                        record.label = Some(event.label.clone());
                        record.confidence = Some(event.confidence);
                        record.stable = true;
                    }
                }
            }
        }

        self.records.push(record);
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        let mut summary = DiagnosticsSummary {
            session_name: self.session_name.clone(),
            total_frames: self.records.len() as u64,
            ..Default::default()
        };

        let mut run = 0;
        for record in &self.records {
            match record.skip_reason {
                Some(reason) => {
                    summary.skipped_frames += 1;
                    *summary.skips_by_reason.entry(reason.to_string()).or_insert(0) += 1;
                    // Classifier outages are not hand-placement problems.
                    if reason != CLASSIFIER_UNAVAILABLE {
                        run += 1;
                        summary.longest_skip_run = summary.longest_skip_run.max(run);
                    }
                }
                None => {
                    run = 0;
                    match record.outcome {
                        "rate_limited" => summary.rate_limited_frames += 1,
                        _ => summary.classifications += 1,
                    }
                }
            }
            if record.stable {
                summary.stable_events += 1;
            }
        }

        summary.usable_frame_rate = if summary.total_frames == 0 {
            0.0
        } else {
            1.0 - summary.skipped_frames as f64 / summary.total_frames as f64
        };
        summary
    }

    pub fn export_csv(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let csv_path = self.session_dir(output_dir.as_ref())?.join("diagnostics.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_summary(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let summary_path = self.session_dir(output_dir.as_ref())?.join("summary.json");
        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(&summary_path, json)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;
        Ok(summary_path)
    }

    fn session_dir(&self, output_dir: &Path) -> Result<PathBuf> {
        let dir = output_dir.join(&self.session_name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(dir)
    }
}
