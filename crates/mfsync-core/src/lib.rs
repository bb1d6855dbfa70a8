//! MFSync Core - Domain types and port definitions
//!
//! This crate contains the shared core of the remote file-system sync engine:
//! - **Domain types** - `RemoteDescriptor`, `Requester`, `Query`, `PathChain`, `SaveDecision`
//! - **Port definitions** - Traits for collaborators: `IRemoteTransport`, `IFileTree`,
//!   `IContentStorage`, `IContentAdapter`, `INotificationService`
//! - **Event bus** - Attribute and cache events for observers
//! - **Configuration and logging** - YAML config and tracing setup
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! The attributes service, synchronizer and fetch provider live in their own
//! crates and depend only on this one and on each other's public types.

pub mod config;
pub mod domain;
pub mod events;
pub mod logging;
pub mod ports;
