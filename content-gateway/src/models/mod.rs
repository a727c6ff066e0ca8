//! Domain models for the content gateway.

pub mod feedback;

pub use feedback::{FeedbackRecord, FeedbackStatus};
