//! Shared test utilities for integration and unit tests
//!
//! A mock host graph shaped like a WebGPU implementation:
//! `GPU -> GPUAdapter -> GPUDevice -> { queue, buffers, textures, encoders }`,
//! plus mock surfaces, image sources and a hand-driven frame scheduler.

use futures::channel::oneshot;
use gpurec_shared::{
    ByteView, Deferred, ElementKind, FrameCallback, FrameScheduler, HostError, HostObject,
    ImageSource, MemberKind, Surface, SurfaceFactory, Value,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Every successful host call, as `Type.method`
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Install a test log subscriber; repeated calls are harmless
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ============================================================================
// Mock Host Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockKind {
    Gpu,
    Adapter,
    Device,
    Queue,
    Limits,
    Buffer,
    Texture,
    TextureView,
    Encoder,
    RenderPass,
    CommandBuffer,
    BindGroup,
    ShaderModule,
    Pipeline,
    Context,
    Context2d,
}

impl MockKind {
    fn type_name(self) -> &'static str {
        match self {
            Self::Gpu => "GPU",
            Self::Adapter => "GPUAdapter",
            Self::Device => "GPUDevice",
            Self::Queue => "GPUQueue",
            Self::Limits => "GPUSupportedLimits",
            Self::Buffer => "GPUBuffer",
            Self::Texture => "GPUTexture",
            Self::TextureView => "GPUTextureView",
            Self::Encoder => "GPUCommandEncoder",
            Self::RenderPass => "GPURenderPassEncoder",
            Self::CommandBuffer => "GPUCommandBuffer",
            Self::BindGroup => "GPUBindGroup",
            Self::ShaderModule => "GPUShaderModule",
            Self::Pipeline => "GPURenderPipeline",
            Self::Context => "GPUCanvasContext",
            Self::Context2d => "CanvasRenderingContext2D",
        }
    }

    fn methods(self) -> &'static [&'static str] {
        match self {
            Self::Gpu => &["requestAdapter", "getPreferredCanvasFormat"],
            Self::Adapter => &["requestDevice", "requestAdapterInfo"],
            Self::Device => &[
                "createBuffer",
                "createTexture",
                "createCommandEncoder",
                "createBindGroup",
                "createShaderModule",
                "createRenderPipeline",
                "pushErrorScope",
                "popErrorScope",
                "destroy",
            ],
            Self::Queue => &[
                "writeBuffer",
                "writeTexture",
                "copyExternalImageToTexture",
                "submit",
                "onSubmittedWorkDone",
            ],
            Self::Buffer => &["mapAsync", "getMappedRange", "unmap", "destroy"],
            Self::Texture => &["createView", "destroy"],
            Self::Encoder => &["beginRenderPass", "copyBufferToBuffer", "finish"],
            Self::RenderPass => &["setPipeline", "setBindGroup", "setVertexBuffer", "draw", "end"],
            Self::ShaderModule => &["getCompilationInfo"],
            Self::Context => &["configure", "unconfigure", "getCurrentTexture"],
            Self::Context2d => &["fillRect"],
            Self::Limits
            | Self::TextureView
            | Self::CommandBuffer
            | Self::BindGroup
            | Self::Pipeline => &[],
        }
    }
}

/// A mock host object of any kind
pub struct MockObject {
    kind: MockKind,
    children: Vec<(String, Rc<dyn HostObject>)>,
    storage: Option<ByteView>,
    calls: CallLog,
}

impl MockObject {
    fn spawn(kind: MockKind, calls: &CallLog) -> Rc<dyn HostObject> {
        Self::spawn_with_storage(kind, calls, None)
    }

    fn spawn_with_storage(
        kind: MockKind,
        calls: &CallLog,
        storage: Option<ByteView>,
    ) -> Rc<dyn HostObject> {
        let children = match kind {
            MockKind::Adapter => vec![("limits".to_string(), Self::spawn(MockKind::Limits, calls))],
            MockKind::Device => vec![
                ("limits".to_string(), Self::spawn(MockKind::Limits, calls)),
                ("queue".to_string(), Self::spawn(MockKind::Queue, calls)),
            ],
            _ => Vec::new(),
        };
        Rc::new(Self {
            kind,
            children,
            storage,
            calls: Rc::clone(calls),
        })
    }

    fn dispatch(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let calls = &self.calls;
        let value: Value = match (self.kind, method) {
            (MockKind::Gpu, "requestAdapter") => Self::spawn(MockKind::Adapter, calls).into(),
            (MockKind::Gpu, "getPreferredCanvasFormat") => "bgra8unorm".into(),

            (MockKind::Adapter, "requestDevice") => Self::spawn(MockKind::Device, calls).into(),
            (MockKind::Adapter, "requestAdapterInfo") => Value::dict([("vendor", "mock".into())]),

            (MockKind::Device, "createBuffer") => {
                let size = args
                    .first()
                    .and_then(|desc| desc.get("size"))
                    .and_then(Value::as_usize)
                    .ok_or_else(|| invalid(method, "descriptor has no size"))?;
                Self::spawn_with_storage(MockKind::Buffer, calls, Some(ByteView::zeroed(size)))
                    .into()
            }
            (MockKind::Device, "createTexture") => Self::spawn(MockKind::Texture, calls).into(),
            (MockKind::Device, "createCommandEncoder") => {
                Self::spawn(MockKind::Encoder, calls).into()
            }
            (MockKind::Device, "createBindGroup") => Self::spawn(MockKind::BindGroup, calls).into(),
            (MockKind::Device, "createShaderModule") => {
                Self::spawn(MockKind::ShaderModule, calls).into()
            }
            (MockKind::Device, "createRenderPipeline") => {
                Self::spawn(MockKind::Pipeline, calls).into()
            }
            (MockKind::Device, "popErrorScope") => Value::Null,
            (MockKind::Device, "pushErrorScope" | "destroy") => Value::Undefined,

            (
                MockKind::Queue,
                "writeBuffer" | "writeTexture" | "copyExternalImageToTexture" | "submit",
            ) => {
                reject_proxies(method, args)?;
                Value::Undefined
            }
            (MockKind::Queue, "onSubmittedWorkDone") => Value::Undefined,

            (MockKind::Buffer, "getMappedRange") => {
                let storage = self
                    .storage
                    .as_ref()
                    .ok_or_else(|| invalid(method, "buffer has no storage"))?;
                let offset = args.first().and_then(Value::as_usize).unwrap_or(0);
                let size = args
                    .get(1)
                    .and_then(Value::as_usize)
                    .unwrap_or_else(|| storage.len().saturating_sub(offset));
                storage
                    .subview(offset, size, ElementKind::U8)
                    .ok_or_else(|| invalid(method, "range out of bounds"))?
                    .into()
            }
            (MockKind::Buffer, "mapAsync" | "unmap" | "destroy") => Value::Undefined,

            (MockKind::Texture, "createView") => Self::spawn(MockKind::TextureView, calls).into(),
            (MockKind::Texture, "destroy") => Value::Undefined,

            (MockKind::Encoder, "beginRenderPass") => {
                Self::spawn(MockKind::RenderPass, calls).into()
            }
            (MockKind::Encoder, "finish") => Self::spawn(MockKind::CommandBuffer, calls).into(),
            (MockKind::Encoder, "copyBufferToBuffer") => Value::Undefined,

            (MockKind::RenderPass, _) if self.kind.methods().contains(&method) => Value::Undefined,

            (MockKind::ShaderModule, "getCompilationInfo") => {
                Value::dict([("messages", Value::Array(Vec::new()))])
            }

            (MockKind::Context, "configure" | "unconfigure") => Value::Undefined,
            (MockKind::Context, "getCurrentTexture") => {
                Self::spawn(MockKind::Texture, calls).into()
            }
            (MockKind::Context2d, "fillRect") => Value::Undefined,

            _ => return Err(HostError::UnknownMethod(method.to_string())),
        };
        Ok(value)
    }
}

impl HostObject for MockObject {
    fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    fn members(&self) -> Vec<(String, MemberKind)> {
        let methods = self
            .kind
            .methods()
            .iter()
            .map(|name| (name.to_string(), MemberKind::Method));
        let objects = self
            .children
            .iter()
            .map(|(name, _)| (name.clone(), MemberKind::Object));
        methods.chain(objects).collect()
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let value = self.dispatch(method, args)?;
        self.calls
            .borrow_mut()
            .push(format!("{}.{method}", self.kind.type_name()));
        Ok(value)
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some((_, child)) = self.children.iter().find(|(n, _)| n == name) {
            return Some(Value::Object(Rc::clone(child)));
        }
        match (self.kind, name) {
            (MockKind::Limits, "maxBindGroups") => Some(4u32.into()),
            (MockKind::Buffer, "size") => self.storage.as_ref().map(|s| s.len().into()),
            _ => None,
        }
    }
}

fn invalid(method: &str, reason: &str) -> HostError {
    HostError::InvalidArgument {
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

/// A real host never sees recording proxies
fn reject_proxies(method: &str, args: &[Value]) -> Result<(), HostError> {
    fn has_proxy(value: &Value) -> bool {
        match value {
            Value::Object(obj) => obj.unwrap_host().is_some(),
            Value::Array(items) => items.iter().any(has_proxy),
            Value::Dict(map) => map.values().any(has_proxy),
            _ => false,
        }
    }
    if args.iter().any(has_proxy) {
        return Err(invalid(method, "received a recording proxy"));
    }
    Ok(())
}

/// Entry point of the mock host graph
pub struct MockGpu;

impl MockGpu {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Rc<dyn HostObject> {
        Self::with_log().0
    }

    /// A mock root plus the log of every call the host received
    pub fn with_log() -> (Rc<dyn HostObject>, CallLog) {
        let calls = CallLog::default();
        (MockObject::spawn(MockKind::Gpu, &calls), calls)
    }
}

/// Host object whose deferred calls settle only when the test releases them.
///
/// Synchronous calls and members are forwarded to the wrapped object.
pub struct GatedHost {
    inner: Rc<dyn HostObject>,
    waiting: RefCell<Vec<oneshot::Sender<()>>>,
}

impl GatedHost {
    pub fn wrap(inner: Rc<dyn HostObject>) -> Rc<Self> {
        Rc::new(Self {
            inner,
            waiting: RefCell::new(Vec::new()),
        })
    }

    /// Deferred calls issued but not yet released
    pub fn pending(&self) -> usize {
        self.waiting.borrow().len()
    }

    /// Let every waiting deferred call settle
    pub fn release(&self) {
        let waiting = std::mem::take(&mut *self.waiting.borrow_mut());
        for gate in waiting {
            let _ = gate.send(());
        }
    }
}

impl HostObject for GatedHost {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn members(&self) -> Vec<(String, MemberKind)> {
        self.inner.members()
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        self.inner.call(method, args)
    }

    fn call_deferred(&self, method: &str, args: &[Value]) -> Deferred {
        let (gate, released) = oneshot::channel();
        self.waiting.borrow_mut().push(gate);

        let inner = Rc::clone(&self.inner);
        let method = method.to_string();
        let args = args.to_vec();
        Box::pin(async move {
            released
                .await
                .map_err(|_| HostError::Operation(format!("{method} was abandoned")))?;
            inner.call(&method, &args)
        })
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.inner.get(name)
    }
}

// ============================================================================
// Mock Image Sources
// ============================================================================

/// Image source filled with one color
pub struct MockImage {
    width: u32,
    height: u32,
    rgba: [u8; 4],
    broken: bool,
}

impl MockImage {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Rc<dyn ImageSource> {
        Rc::new(Self {
            width,
            height,
            rgba,
            broken: false,
        })
    }

    /// An image whose pixels cannot be read back
    pub fn broken(width: u32, height: u32) -> Rc<dyn ImageSource> {
        Rc::new(Self {
            width,
            height,
            rgba: [0; 4],
            broken: true,
        })
    }
}

impl ImageSource for MockImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rasterize(&self) -> Result<Vec<u8>, HostError> {
        if self.broken {
            return Err(HostError::Operation("image is not decoded".into()));
        }
        let pixels = (self.width * self.height) as usize;
        Ok(self.rgba.repeat(pixels))
    }
}

// ============================================================================
// Mock Surfaces
// ============================================================================

/// Drawable surface with one GPU context and one 2D context
pub struct MockSurface {
    width: u32,
    height: u32,
    gpu_context: Rc<dyn HostObject>,
    context_2d: Rc<dyn HostObject>,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Rc<dyn Surface> {
        let calls = CallLog::default();
        Rc::new(Self {
            width,
            height,
            gpu_context: MockObject::spawn(MockKind::Context, &calls),
            context_2d: MockObject::spawn(MockKind::Context2d, &calls),
        })
    }
}

impl Surface for MockSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn get_context(&self, kind: &str) -> Option<Rc<dyn HostObject>> {
        match kind {
            "webgpu" => Some(Rc::clone(&self.gpu_context)),
            "2d" => Some(Rc::clone(&self.context_2d)),
            _ => None,
        }
    }
}

/// Surface factory holding every surface it created
#[derive(Default)]
pub struct MockSurfaceFactory {
    surfaces: RefCell<Vec<Rc<dyn Surface>>>,
}

impl MockSurfaceFactory {
    /// A factory that already holds `count` default-sized surfaces
    pub fn with_surfaces(count: usize) -> Self {
        let factory = Self::default();
        for _ in 0..count {
            factory.surfaces.borrow_mut().push(MockSurface::new(300, 150));
        }
        factory
    }
}

impl SurfaceFactory for MockSurfaceFactory {
    fn surfaces(&self) -> Vec<Rc<dyn Surface>> {
        self.surfaces.borrow().clone()
    }

    fn create_surface(&self, width: u32, height: u32) -> Rc<dyn Surface> {
        let surface = MockSurface::new(width, height);
        self.surfaces.borrow_mut().push(Rc::clone(&surface));
        surface
    }
}

// ============================================================================
// Frame Scheduling
// ============================================================================

/// Frame scheduler driven by hand from tests
#[derive(Default)]
pub struct ManualScheduler {
    pending: RefCell<Vec<FrameCallback>>,
}

impl ManualScheduler {
    /// Run every callback requested so far
    pub fn fire(&self, timestamp: f64) {
        let callbacks = std::mem::take(&mut *self.pending.borrow_mut());
        for callback in callbacks {
            callback(timestamp);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        self.pending.borrow_mut().push(callback);
    }
}
