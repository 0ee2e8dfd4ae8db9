//! Transport-agnostic outbound notifications

pub mod publisher;

pub use publisher::{LogNotifier, MockNotifier, Notifier};
