//! Read-only bridge to the external profile subsystem

pub mod provider;

pub use provider::{ProfileProvider, StaticProfileProvider};
