//! Feedback record written by the description workflow.

use serde::{Deserialize, Serialize};

/// Outcome recorded alongside a generated description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackStatus {
    Accepted,
}

/// One generated description, keyed by (`user_id`, `timestamp`).
///
/// `user_id` is the partition key and `timestamp` the sort key. Timestamps are
/// fixed-width ISO-8601 UTC strings, so lexical order is chronological order.
/// Records are never updated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub user_id: String,

    pub timestamp: String,

    /// Object key of the described image.
    pub image_ref: String,

    /// Description as produced by the model.
    pub initial_description: String,

    /// Free-text hint the user supplied with the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,

    /// Description returned to the caller.
    pub final_description: String,

    pub status: FeedbackStatus,

    /// Model id that produced the description.
    pub model: String,
}

impl FeedbackRecord {
    /// Record for a description returned to the caller unchanged.
    pub fn accepted(
        user_id: impl Into<String>,
        timestamp: impl Into<String>,
        image_ref: impl Into<String>,
        description: impl Into<String>,
        user_feedback: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        let description = description.into();
        Self {
            user_id: user_id.into(),
            timestamp: timestamp.into(),
            image_ref: image_ref.into(),
            initial_description: description.clone(),
            user_feedback,
            final_description: description,
            status: FeedbackStatus::Accepted,
            model: model.into(),
        }
    }

    /// The composite key as `(partition, sort)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.user_id, &self.timestamp)
    }
}
