//! Shared types for the GPU call recorder.
//!
//! - [`value`] - dynamic values crossing the host API boundary
//! - [`host`] - capability traits the host graphics API, its surfaces and its
//!   frame scheduler are seen through
//! - [`encoding`] - text encoding for embedded binary payloads

pub mod encoding;
pub mod host;
pub mod value;

pub use encoding::DecodeError;
pub use host::{
    Deferred, FrameCallback, FrameScheduler, HostError, HostObject, ImageSource, MemberKind,
    Surface, SurfaceFactory, innermost, object_addr, surface_addr, unwrap_value,
};
pub use value::{ByteView, ElementKind, Value};
