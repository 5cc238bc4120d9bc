//! Submission pipeline: consolidated text first, then grouped media

use crate::models::{ChatId, MediaRef, ReportBuffer};
use crate::server::providers::{ChatTransport, TransportError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Report is empty")]
    Empty,

    #[error("Failed to deliver report text: {0}")]
    TextDelivery(#[source] TransportError),
}

/// What a successful submission delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub contributors: usize,
    pub media_sent: usize,
    pub media_failed: usize,
}

impl SubmissionReceipt {
    pub fn is_complete(&self) -> bool {
        self.media_failed == 0
    }
}

pub struct SubmissionPipeline {
    transport: Arc<dyn ChatTransport>,
    supervisory_chat: ChatId,
}

impl SubmissionPipeline {
    pub fn new(transport: Arc<dyn ChatTransport>, supervisory_chat: ChatId) -> Self {
        Self {
            transport,
            supervisory_chat,
        }
    }

    pub fn supervisory_chat(&self) -> ChatId {
        self.supervisory_chat
    }

    /// Deliver the buffer to the supervisory chat.
    ///
    /// The text block goes first; if it fails nothing else is sent and the buffer is left
    /// untouched for a retry. Once the text is out, media failures are counted but the
    /// items are still marked submitted so the text is never sent twice.
    pub async fn submit(
        &self,
        title: &str,
        buffer: &mut ReportBuffer,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if buffer.is_empty() {
            return Err(SubmissionError::Empty);
        }

        let text = buffer.render_summary(title);
        self.transport
            .send_text(self.supervisory_chat, &text, None)
            .await
            .map_err(SubmissionError::TextDelivery)?;

        let mut receipt = SubmissionReceipt {
            contributors: buffer.contributor_count(),
            ..Default::default()
        };
        let media = buffer.collect_media();
        let chunk_size = self.transport.max_media_group().max(1);
        for chunk in media.chunks(chunk_size) {
            match self.send_chunk(chunk).await {
                Ok(()) => receipt.media_sent += chunk.len(),
                Err(e) => {
                    tracing::warn!(
                        items = chunk.len(),
                        error = %e,
                        "Failed to deliver report media"
                    );
                    receipt.media_failed += chunk.len();
                }
            }
        }
        buffer.mark_submitted();

        tracing::info!(
            title = title,
            contributors = receipt.contributors,
            media_sent = receipt.media_sent,
            media_failed = receipt.media_failed,
            "Report submitted"
        );
        Ok(receipt)
    }

    /// One-item chunks go out as a single photo/video; albums need two or more items
    async fn send_chunk(&self, chunk: &[MediaRef]) -> Result<(), TransportError> {
        match chunk {
            [single] => self
                .transport
                .send_media(self.supervisory_chat, single, None)
                .await
                .map(|_| ()),
            items => {
                self.transport
                    .send_media_group(self.supervisory_chat, items)
                    .await
            }
        }
    }
}
