//! Host-facing capability traits
//!
//! The recorder never sees a fixed schema for the graphics API. Instead each
//! API object describes itself through [`HostObject::members`], and the
//! recorder wraps whatever it finds there.

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::value::Value;

/// Errors raised by the host graphics API
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("invalid argument for `{method}`: {reason}")]
    InvalidArgument { method: String, reason: String },

    #[error("{0}")]
    Operation(String),
}

/// Result handle of a call whose outcome is not available synchronously
pub type Deferred = LocalBoxFuture<'static, Result<Value, HostError>>;

/// Callback run once per display refresh, given a timestamp in milliseconds
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// What a named member of a [`HostObject`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A callable method
    Method,
    /// A nested object reachable through [`HostObject::get`]
    Object,
}

/// An object of the host graphics API (adapter, device, queue, buffer, ...)
pub trait HostObject {
    /// Interface name, e.g. `GPUDevice`
    fn type_name(&self) -> &str;

    /// Callable members and nested objects exposed by this object
    fn members(&self) -> Vec<(String, MemberKind)>;

    /// Invoke a synchronous method
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, HostError>;

    /// Invoke a method that returns a deferred result.
    ///
    /// The default resolves the synchronous call immediately.
    fn call_deferred(&self, method: &str, args: &[Value]) -> Deferred {
        let result = self.call(method, args);
        Box::pin(async move { result })
    }

    /// Read a property or nested object
    fn get(&self, name: &str) -> Option<Value>;

    /// The object this one proxies, if it is a proxy
    fn unwrap_host(&self) -> Option<Rc<dyn HostObject>> {
        None
    }

    /// Whether any member is callable
    fn has_methods(&self) -> bool {
        self.members()
            .iter()
            .any(|(_, kind)| *kind == MemberKind::Method)
    }
}

/// An image-like drawable that cannot be serialized directly
pub trait ImageSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Draw the image into an offscreen drawable and read back RGBA8 pixels,
    /// `width * height * 4` bytes, rows top to bottom.
    fn rasterize(&self) -> Result<Vec<u8>, HostError>;
}

/// An on-screen drawable target
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Obtain a context of the given kind (`"webgpu"`, `"2d"`, ...)
    fn get_context(&self, kind: &str) -> Option<Rc<dyn HostObject>>;

    /// The surface this one proxies, if it is a proxy
    fn unwrap_surface(&self) -> Option<Rc<dyn Surface>> {
        None
    }
}

/// The host facility that owns drawable targets
pub trait SurfaceFactory {
    /// Surfaces that already exist
    fn surfaces(&self) -> Vec<Rc<dyn Surface>>;

    /// Create a new surface
    fn create_surface(&self, width: u32, height: u32) -> Rc<dyn Surface>;
}

/// The host's once-per-display-refresh scheduling primitive
pub trait FrameScheduler {
    fn request_frame(&self, callback: FrameCallback);
}

/// Strip proxies from an object, returning the innermost host object
pub fn innermost(obj: &Rc<dyn HostObject>) -> Rc<dyn HostObject> {
    let mut current = Rc::clone(obj);
    while let Some(inner) = current.unwrap_host() {
        current = inner;
    }
    current
}

/// Strip proxies from every object inside a value
pub fn unwrap_value(value: &Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(innermost(obj)),
        Value::Array(items) => Value::Array(items.iter().map(unwrap_value).collect()),
        Value::Dict(map) => Value::Dict(
            map.iter()
                .map(|(k, v)| (k.clone(), unwrap_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Address identifying an object allocation, stable for as long as it lives
pub fn object_addr(obj: &Rc<dyn HostObject>) -> usize {
    Rc::as_ptr(obj) as *const () as usize
}

/// Address identifying a surface allocation
pub fn surface_addr(surface: &Rc<dyn Surface>) -> usize {
    Rc::as_ptr(surface) as *const () as usize
}
