//! GPU call recorder
//!
//! Records every call an application makes against a handle-based graphics
//! API and emits a self-contained HTML/JavaScript program that replays the
//! same calls, frame by frame.
//!
//! # Architecture
//!
//! - [`Recorder`] - one recording session: frame boundaries, budget, export
//! - [`intercept`] - recording proxies over host API objects
//! - [`surface`] - instrumentation of drawable surfaces and their contexts
//! - [`output`] - rendering of the replay program
//! - [`Exporter`] - where finished replay programs go

pub mod config;
pub mod export;
pub mod intercept;
pub mod output;
pub mod recorder;
pub mod serialize;
pub mod surface;
#[cfg(test)]
pub mod test_utils;

pub use config::{ConfigError, RecorderConfig};
pub use export::{Artifact, Exporter, FileExporter, MemoryExporter};
pub use recorder::{Recorder, RecordingScheduler, RecordingState, RecordingStats};
pub use surface::SurfaceWatcher;

// Re-export the host object model
pub use gpurec_shared::{
    ByteView, ElementKind, FrameScheduler, HostError, HostObject, ImageSource, MemberKind,
    Surface, SurfaceFactory, Value,
};
