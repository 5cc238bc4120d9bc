//! Report content buffered for the active reminder

use crate::models::{InboundContent, MediaRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity of a contributor to a report
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub display_name: String,
}

impl Sender {
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// One contributor's accumulated content for the active reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub sender: Sender,
    text: Vec<String>,
    photos: Vec<String>,
    videos: Vec<String>,
    submitted: bool,
}

impl ReportItem {
    pub fn new(sender: Sender) -> Self {
        Self {
            sender,
            text: Vec::new(),
            photos: Vec::new(),
            videos: Vec::new(),
            submitted: false,
        }
    }

    /// Newline-joined text of every message from this sender
    pub fn text(&self) -> String {
        self.text.join("\n")
    }

    pub fn photos(&self) -> &[String] {
        &self.photos
    }

    pub fn videos(&self) -> &[String] {
        &self.videos
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.photos.is_empty() && self.videos.is_empty()
    }

    fn append(&mut self, content: &InboundContent) {
        if let Some(text) = content.trimmed_text() {
            self.text.push(text.to_string());
        }
        if let Some(photo) = &content.photo {
            if !self.photos.contains(photo) {
                self.photos.push(photo.clone());
            }
        }
        if let Some(video) = &content.video {
            if !self.videos.contains(video) {
                self.videos.push(video.clone());
            }
        }
    }
}

/// Per-contributor content for the currently active reminder.
///
/// Items keep first-arrival order. Each inbound message id is applied at most once.
#[derive(Debug, Clone, Default)]
pub struct ReportBuffer {
    items: Vec<ReportItem>,
    seen_messages: HashSet<i64>,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append inbound content to the sender's item.
    ///
    /// Returns false when the message was already applied or carries nothing to keep.
    pub fn apply(&mut self, content: &InboundContent) -> bool {
        if content.trimmed_text().is_none() && !content.has_media() {
            return false;
        }
        if !self.seen_messages.insert(content.message_id) {
            return false;
        }

        let position = self
            .items
            .iter()
            .position(|item| item.sender.id == content.sender.id && !item.submitted);
        let item = match position {
            Some(index) => &mut self.items[index],
            None => {
                self.items.push(ReportItem::new(content.sender.clone()));
                let last = self.items.len() - 1;
                &mut self.items[last]
            }
        };
        item.append(content);
        true
    }

    /// True when no unsubmitted item holds content
    pub fn is_empty(&self) -> bool {
        self.items
            .iter()
            .all(|item| item.submitted || item.is_empty())
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen_messages.clear();
    }

    /// Consolidated text block: title line, then one `sender: text` line per contributor
    pub fn render_summary(&self, title: &str) -> String {
        let mut lines = vec![title.to_string()];
        for item in self.pending_items() {
            let text = item.text();
            if !text.is_empty() {
                lines.push(format!("{}: {}", item.sender.display_name, text));
            }
        }
        lines.join("\n")
    }

    /// Photos then videos of every unsubmitted item, deduplicated across senders
    pub fn collect_media(&self) -> Vec<MediaRef> {
        let mut seen = HashSet::new();
        let mut media = Vec::new();
        for item in self.pending_items() {
            let refs = item
                .photos
                .iter()
                .map(|id| MediaRef::Photo(id.clone()))
                .chain(item.videos.iter().map(|id| MediaRef::Video(id.clone())));
            for media_ref in refs {
                if seen.insert(media_ref.file_id().to_string()) {
                    media.push(media_ref);
                }
            }
        }
        media
    }

    /// Number of contributors whose content has not been submitted yet
    pub fn contributor_count(&self) -> usize {
        self.pending_items().count()
    }

    pub fn mark_submitted(&mut self) {
        for item in &mut self.items {
            item.submitted = true;
        }
    }

    fn pending_items(&self) -> impl Iterator<Item = &ReportItem> {
        self.items
            .iter()
            .filter(|item| !item.submitted && !item.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Sender {
        Sender::new(1, "Ann")
    }

    fn bob() -> Sender {
        Sender::new(2, "Bob")
    }

    #[test]
    fn test_duplicate_message_is_ignored() {
        let mut buffer = ReportBuffer::new();
        let content = InboundContent::text(10, ann(), "ok");
        assert!(buffer.apply(&content));
        assert!(!buffer.apply(&content));
        assert_eq!(buffer.items().len(), 1);
        assert_eq!(buffer.items()[0].text(), "ok");
    }

    #[test]
    fn test_text_is_newline_joined_per_sender() {
        let mut buffer = ReportBuffer::new();
        buffer.apply(&InboundContent::text(1, ann(), "first"));
        buffer.apply(&InboundContent::text(2, bob(), "hello"));
        buffer.apply(&InboundContent::text(3, ann(), "second"));

        let summary = buffer.render_summary("Fridge @ Main");
        assert_eq!(summary, "Fridge @ Main\nAnn: first\nsecond\nBob: hello");
    }

    #[test]
    fn test_empty_content_is_not_buffered() {
        let mut buffer = ReportBuffer::new();
        assert!(!buffer.apply(&InboundContent::text(1, ann(), "  ")));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_media_deduplicated_across_senders() {
        let mut buffer = ReportBuffer::new();
        buffer.apply(&InboundContent::photo(1, ann(), "p1"));
        buffer.apply(&InboundContent::photo(2, ann(), "p1"));
        buffer.apply(&InboundContent::photo(3, bob(), "p1"));
        buffer.apply(&InboundContent::photo(4, bob(), "p2"));

        assert_eq!(buffer.items()[0].photos(), ["p1".to_string()]);
        assert_eq!(
            buffer.collect_media(),
            vec![MediaRef::Photo("p1".into()), MediaRef::Photo("p2".into())]
        );
    }

    #[test]
    fn test_submitted_items_are_not_resent() {
        let mut buffer = ReportBuffer::new();
        buffer.apply(&InboundContent::text(1, ann(), "done"));
        buffer.mark_submitted();

        assert!(buffer.is_empty());
        assert_eq!(buffer.render_summary("T"), "T");
        assert!(buffer.collect_media().is_empty());

        // Later content from the same sender starts a fresh item
        buffer.apply(&InboundContent::text(2, ann(), "more"));
        assert_eq!(buffer.items().len(), 2);
        assert_eq!(buffer.render_summary("T"), "T\nAnn: more");
    }
}
