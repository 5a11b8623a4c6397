//! Dynamic values exchanged with the host graphics API
//!
//! Every argument passed into the host API and every result coming back is a
//! [`Value`]. Descriptor dictionaries, API objects, typed arrays and image
//! sources all share this one representation so the recorder can walk them
//! without knowing the API's schema.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::host::{HostObject, ImageSource};

/// Element type of a typed byte view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ElementKind {
    /// Size of one element in bytes
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Name of the typed-array constructor used in the replay program
    pub const fn array_name(self) -> &'static str {
        match self {
            Self::U8 => "Uint8Array",
            Self::I8 => "Int8Array",
            Self::U16 => "Uint16Array",
            Self::I16 => "Int16Array",
            Self::U32 => "Uint32Array",
            Self::I32 => "Int32Array",
            Self::F32 => "Float32Array",
            Self::F64 => "Float64Array",
        }
    }
}

/// A typed window over shared, externally mutable byte storage.
///
/// Cloning a view (or taking a [`ByteView::subview`]) shares the storage, so
/// bytes written by application code through one view are visible through
/// every other view of the same storage. Mapped buffer ranges rely on this:
/// the application fills the range after the mapping call returned, and the
/// recorder only reads it back when the range is released.
///
/// Each constructed view and each subview is a distinct instance; clones
/// are the same instance.
#[derive(Clone)]
pub struct ByteView {
    storage: Rc<RefCell<Vec<u8>>>,
    instance: Rc<()>,
    byte_offset: usize,
    len: usize,
    kind: ElementKind,
}

impl ByteView {
    /// Create a view covering all of `bytes`, interpreted as `kind` elements.
    ///
    /// Trailing bytes that do not fill a whole element are kept in storage
    /// but fall outside the view.
    pub fn new(kind: ElementKind, bytes: Vec<u8>) -> Self {
        let len = bytes.len() / kind.width();
        Self {
            storage: Rc::new(RefCell::new(bytes)),
            instance: Rc::new(()),
            byte_offset: 0,
            len,
            kind,
        }
    }

    /// Zero-filled byte storage of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Self::new(ElementKind::U8, vec![0; size])
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(ElementKind::U8, bytes.to_vec())
    }

    pub fn from_u32s(words: &[u32]) -> Self {
        Self::new(ElementKind::U32, bytemuck::cast_slice(words).to_vec())
    }

    pub fn from_f32s(floats: &[f32]) -> Self {
        Self::new(ElementKind::F32, bytemuck::cast_slice(floats).to_vec())
    }

    /// A new view of `len` elements of `kind`, starting `byte_offset` bytes
    /// into this view. Returns `None` if the range does not fit.
    pub fn subview(&self, byte_offset: usize, len: usize, kind: ElementKind) -> Option<Self> {
        let start = self.byte_offset.checked_add(byte_offset)?;
        let end = start.checked_add(len.checked_mul(kind.width())?)?;
        if end > self.byte_offset + self.byte_len() {
            return None;
        }
        Some(Self {
            storage: Rc::clone(&self.storage),
            instance: Rc::new(()),
            byte_offset: start,
            len,
            kind,
        })
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the view's first byte within its storage
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn byte_len(&self) -> usize {
        self.len * self.kind.width()
    }

    /// Copy out the bytes covered by the view
    pub fn to_vec(&self) -> Vec<u8> {
        let storage = self.storage.borrow();
        storage[self.byte_offset..self.byte_offset + self.byte_len()].to_vec()
    }

    /// Copy out `count` elements starting at element `offset`.
    ///
    /// Returns `None` when the range runs past the end of the view.
    pub fn read_elements(&self, offset: usize, count: usize) -> Option<Vec<u8>> {
        let width = self.kind.width();
        if offset.checked_add(count)? > self.len {
            return None;
        }
        let start = self.byte_offset + offset * width;
        let storage = self.storage.borrow();
        Some(storage[start..start + count * width].to_vec())
    }

    /// Overwrite bytes of the view starting at `byte_offset`. Writes past the
    /// end of the view are truncated.
    pub fn write(&self, byte_offset: usize, data: &[u8]) {
        let end = self.byte_len().min(byte_offset.saturating_add(data.len()));
        if byte_offset >= end {
            return;
        }
        let count = end - byte_offset;
        let start = self.byte_offset + byte_offset;
        let mut storage = self.storage.borrow_mut();
        storage[start..start + count].copy_from_slice(&data[..count]);
    }

    /// Address identifying this view instance, shared by its clones
    pub fn instance_addr(&self) -> usize {
        Rc::as_ptr(&self.instance) as usize
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("kind", &self.kind)
            .field("byte_offset", &self.byte_offset)
            .field("len", &self.len)
            .finish()
    }
}

/// A value crossing the host API boundary
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Object(Rc<dyn HostObject>),
    Bytes(ByteView),
    Image(Rc<dyn ImageSource>),
}

impl Value {
    /// Build a descriptor dictionary from key/value pairs
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value as a non-negative integer index or count
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<dyn HostObject>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteView> {
        match self {
            Self::Bytes(view) => Some(view),
            _ => None,
        }
    }

    /// Look up a key of a descriptor dictionary
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Dict(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Dict(map) => f.debug_map().entries(map).finish(),
            Self::Object(obj) => write!(f, "Object({})", obj.type_name()),
            Self::Bytes(view) => view.fmt(f),
            Self::Image(image) => write!(f, "Image({}x{})", image.width(), image.height()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ByteView> for Value {
    fn from(view: ByteView) -> Self {
        Self::Bytes(view)
    }
}

impl From<Rc<dyn HostObject>> for Value {
    fn from(obj: Rc<dyn HostObject>) -> Self {
        Self::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}
