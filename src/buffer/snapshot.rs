//! Read-only document snapshots.

use crate::scan::lossy_to_string;

/// A materialized copy of a document, optionally prefixed with a BOM.
///
/// Content is copied out at creation, so a snapshot never observes edits
/// made after it was taken and may outlive the buffer itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    content: String,
}

impl Snapshot {
    pub(crate) fn new(bom: &str, bytes: Vec<u8>) -> Self {
        let body = lossy_to_string(&bytes);
        let mut content = String::with_capacity(bom.len() + body.len());
        content.push_str(bom);
        content.push_str(&body);
        Self { content }
    }

    /// The snapshot contents, BOM included.
    #[must_use]
    pub fn read(&self) -> &str {
        &self.content
    }

    /// Consume the snapshot, yielding its contents.
    #[must_use]
    pub fn into_string(self) -> String {
        self.content
    }

    /// Length in bytes, BOM included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Is there nothing to read?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
