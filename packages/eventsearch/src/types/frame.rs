//! Streaming output frames.
//!
//! The core emits frame values; the transport (SSE or otherwise) belongs
//! to the external surface. The wire form tags each frame with `type`
//! and flattens its payload.

use serde::{Deserialize, Serialize};

use super::event::EventRecord;

/// One message in the streaming output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    /// Session id announcement, emitted first by the transport layer
    Session { session_id: String },

    /// Pipeline progress
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
        message: String,
    },

    /// One accepted event, emitted as soon as it is available
    Event {
        event: Box<EventRecord>,
        /// 1-based position among accepted events
        index: usize,
        /// 1-based position of the source article
        article_index: usize,
        total_articles: usize,
    },

    /// Terminal: the run finished
    Complete {
        message: String,
        total_events: usize,
        articles_processed: usize,
        processing_time: f64,
    },

    /// Terminal: the run was cancelled; earlier events remain in the session
    Cancelled { message: String, total_events: usize },

    /// Terminal: unexpected failure inside the orchestrator
    Error { message: String },
}

impl StreamFrame {
    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamFrame::Complete { .. } | StreamFrame::Cancelled { .. } | StreamFrame::Error { .. }
        )
    }

    /// Convenience constructor for progress frames.
    pub fn progress(current: usize, total: usize, percentage: f64, message: impl Into<String>) -> Self {
        StreamFrame::Progress {
            current,
            total,
            percentage,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_form() {
        let frame = StreamFrame::progress(3, 10, 41.0, "Processing article 3/10...");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["current"], 3);
        assert_eq!(json["percentage"], 41.0);
    }

    #[test]
    fn test_terminal_frames() {
        assert!(StreamFrame::Cancelled {
            message: String::new(),
            total_events: 0
        }
        .is_terminal());
        assert!(StreamFrame::Error {
            message: String::new()
        }
        .is_terminal());
        assert!(!StreamFrame::progress(0, 0, 0.0, "").is_terminal());
    }
}
