//! Progress event types
//!
//! A colorization request reports a fixed, ordered set of checkpoints.
//! Completion (100%) is never an event of its own: it is implied by the
//! delivery of the terminal result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline checkpoints in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Upload validated and its request scope opened
    UploadAcknowledged,
    /// Input staged in the request scope and measured
    Preprocessing,
    /// Transform backend running
    CoreTransform,
    /// Backend output decoded and adjusted
    PostAdjustment,
    /// Output persisted, response being built
    Finalize,
}

impl ProgressStage {
    pub const ALL: [ProgressStage; 5] = [
        ProgressStage::UploadAcknowledged,
        ProgressStage::Preprocessing,
        ProgressStage::CoreTransform,
        ProgressStage::PostAdjustment,
        ProgressStage::Finalize,
    ];

    /// Completion percentage reported for this checkpoint
    pub const fn percentage(self) -> u8 {
        match self {
            ProgressStage::UploadAcknowledged => 10,
            ProgressStage::Preprocessing => 30,
            ProgressStage::CoreTransform => 60,
            ProgressStage::PostAdjustment => 85,
            ProgressStage::Finalize => 95,
        }
    }

    /// Human-readable status line
    pub const fn label(self) -> &'static str {
        match self {
            ProgressStage::UploadAcknowledged => "Uploading image...",
            ProgressStage::Preprocessing => "Preprocessing image...",
            ProgressStage::CoreTransform => "Running colorization...",
            ProgressStage::PostAdjustment => "Applying color adjustments...",
            ProgressStage::Finalize => "Finalizing result...",
        }
    }
}

/// One progress notification for a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0-100
    pub percentage: u8,
    pub stage: ProgressStage,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage) -> Self {
        Self {
            percentage: stage.percentage(),
            stage,
            label: stage.label().to_string(),
            timestamp: Utc::now(),
        }
    }
}
