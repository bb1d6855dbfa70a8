//! Content adapter port
//!
//! Converts payloads between the remote representation and the local
//! editing representation (line endings, trailing newlines, encodings).
//! Adapters are pure byte transformations; they never touch the tree.

use crate::domain::descriptor::RemoteDescriptor;
use crate::domain::newtypes::NodeId;

/// Port trait for local/remote content normalization
pub trait IContentAdapter: Send + Sync {
    /// Adapts bytes fetched from the remote side for local editing
    fn adapt_from_remote(&self, bytes: Vec<u8>, file: NodeId, descriptor: &RemoteDescriptor)
        -> Vec<u8>;

    /// Prepares locally edited bytes for upload
    fn adapt_to_remote(&self, bytes: Vec<u8>, file: NodeId, descriptor: &RemoteDescriptor)
        -> Vec<u8>;
}

/// Leaves content untouched in both directions
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAdapter;

impl IContentAdapter for PassthroughAdapter {
    fn adapt_from_remote(&self, bytes: Vec<u8>, _: NodeId, _: &RemoteDescriptor) -> Vec<u8> {
        bytes
    }

    fn adapt_to_remote(&self, bytes: Vec<u8>, _: NodeId, _: &RemoteDescriptor) -> Vec<u8> {
        bytes
    }
}

/// Record-oriented text handling
///
/// Text content arrives with one trailing newline that is not part of the
/// last record; it is stripped on the way in and restored on the way out.
/// Binary content passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingNewlineAdapter;

const NEW_LINE: u8 = b'\n';

impl IContentAdapter for TrailingNewlineAdapter {
    fn adapt_from_remote(
        &self,
        mut bytes: Vec<u8>,
        _: NodeId,
        descriptor: &RemoteDescriptor,
    ) -> Vec<u8> {
        if !descriptor.content_mode().is_binary() && bytes.last() == Some(&NEW_LINE) {
            bytes.pop();
        }
        bytes
    }

    fn adapt_to_remote(
        &self,
        mut bytes: Vec<u8>,
        _: NodeId,
        descriptor: &RemoteDescriptor,
    ) -> Vec<u8> {
        if !descriptor.content_mode().is_binary() {
            bytes.push(NEW_LINE);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::descriptor::{ContentMode, MemberAttributes};

    fn member(mode: ContentMode) -> RemoteDescriptor {
        RemoteDescriptor::Member(MemberAttributes {
            name: "MEM".into(),
            library: NodeId::new(1),
            length: 0,
            modified: None,
            content_mode: mode,
            requesters: vec![],
        })
    }

    #[test]
    fn test_passthrough() {
        let d = member(ContentMode::text());
        let adapter = PassthroughAdapter;
        assert_eq!(adapter.adapt_from_remote(b"A\n".to_vec(), NodeId::new(2), &d), b"A\n");
        assert_eq!(adapter.adapt_to_remote(b"A".to_vec(), NodeId::new(2), &d), b"A");
    }

    #[test]
    fn test_trailing_newline_text() {
        let d = member(ContentMode::text());
        let adapter = TrailingNewlineAdapter;
        assert_eq!(adapter.adapt_from_remote(b"L1\nL2\n".to_vec(), NodeId::new(2), &d), b"L1\nL2");
        assert_eq!(adapter.adapt_from_remote(b"L1".to_vec(), NodeId::new(2), &d), b"L1");
        assert_eq!(adapter.adapt_from_remote(Vec::new(), NodeId::new(2), &d), b"");
        assert_eq!(adapter.adapt_to_remote(b"L1".to_vec(), NodeId::new(2), &d), b"L1\n");
    }

    #[test]
    fn test_trailing_newline_binary_untouched() {
        let d = member(ContentMode::binary());
        let adapter = TrailingNewlineAdapter;
        assert_eq!(adapter.adapt_from_remote(b"\x00\n".to_vec(), NodeId::new(2), &d), b"\x00\n");
        assert_eq!(adapter.adapt_to_remote(b"\x00".to_vec(), NodeId::new(2), &d), b"\x00");
    }
}
