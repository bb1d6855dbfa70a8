//! Integration tests for mfsync-sync
//!
//! Runs the synchronizer and the sync queues against an in-memory tree,
//! in-memory content storage and a scripted transport.

#[allow(dead_code)]
mod common;

mod test_queues;
mod test_synchronizer;
