//! Recording session
//!
//! A [`Recorder`] owns one recording session: the identity registry, the
//! variable scopes, the binary cache and the statement log. Instrumented
//! objects handed to the application hold a weak handle to the session and
//! append statements to it as calls are observed.
//!
//! # Lifecycle
//!
//! ```text
//! NotRecording                      (no graphics capability at construction)
//! Recording ──frame budget hit──> Finalizing ──program built──> Idle ──> export
//! ```
//!
//! Neither `NotRecording` nor `Idle` records anything; instrumented objects
//! keep forwarding calls to the host API.

mod cache;
mod frames;
mod naming;
mod registry;

pub use cache::{BinaryCache, CacheEntry};
pub use frames::{FrameLog, Section};
pub use naming::{NameSet, VariableScopes, variable_name};
pub use registry::{IdentityRegistry, Keepalive, ObjectId, ObjectKey, Registration};

use gpurec_shared::{
    ByteView, FrameCallback, FrameScheduler, HostObject, Surface, SurfaceFactory, innermost,
    object_addr,
};
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::RecorderConfig;
use crate::export::Exporter;
use crate::intercept::{self, Instrumented};
use crate::output;
use crate::surface::{InstrumentedSurface, SurfaceWatcher};

/// Expression the replay program uses for the host API's root object
pub const ROOT_EXPRESSION: &str = "navigator.gpu";

/// Declaration scope of the replay program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The initialization routine, run once before the first frame
    Init,
    /// The routine of one recorded frame
    Frame(usize),
}

/// Recording state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// The host offered no graphics capability; nothing is instrumented
    NotRecording,
    /// Calls are being captured
    Recording,
    /// The frame budget was reached and the replay program is being built
    Finalizing,
    /// Recording finished; instrumented objects only forward calls
    Idle,
}

/// Summary of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingStats {
    pub state: RecordingState,
    pub frames_recorded: usize,
    pub statements: usize,
    pub cache_entries: usize,
    /// Bytes stored in the binary cache
    pub cache_bytes: u64,
    /// Bytes offered to the binary cache, before deduplication
    pub bytes_seen: u64,
}

/// Mutable state of one recording session
pub(crate) struct Session {
    config: RecorderConfig,
    state: RecordingState,
    registry: IdentityRegistry,
    scopes: VariableScopes,
    cache: BinaryCache,
    log: FrameLog,
    /// Live mapped ranges per buffer, resolved when the buffer is unmapped
    mapped: HashMap<ObjectKey, Vec<ByteView>>,
    /// Proxy for each instrumented host object, by address of the host object
    proxies: HashMap<usize, Rc<Instrumented>>,
    /// Proxy for each instrumented surface, by address of the host surface
    surfaces: HashMap<usize, Rc<InstrumentedSurface>>,
    /// Taken when the recording is finalized
    exporter: Option<Box<dyn Exporter>>,
}

pub(crate) type SessionHandle = Rc<RefCell<Session>>;

impl Session {
    fn new(config: RecorderConfig, state: RecordingState, exporter: Box<dyn Exporter>) -> Self {
        Self {
            config,
            state,
            registry: IdentityRegistry::new(),
            scopes: VariableScopes::new(),
            cache: BinaryCache::new(),
            log: FrameLog::new(),
            mapped: HashMap::new(),
            proxies: HashMap::new(),
            surfaces: HashMap::new(),
            exporter: Some(exporter),
        }
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub(crate) fn scope(&self) -> Scope {
        self.log.current_scope()
    }

    /// Append a statement to the current section
    pub(crate) fn record(&mut self, statement: String) {
        if self.is_recording() {
            self.log.push(statement);
        }
    }

    /// Variable naming an object, registering it first if it is new
    pub(crate) fn variable_for(&mut self, object: Keepalive) -> String {
        let key = object.key();
        let current = self.scope();
        let (id, owner) = match self.registry.get(&key) {
            Some(registration) => (registration.id, registration.owner),
            None => (self.registry.register(object, current), current),
        };
        let name = variable_name(id);
        self.scopes.reference(&name, owner, current);
        name
    }

    pub(crate) fn object_variable(&mut self, obj: &Rc<dyn HostObject>) -> String {
        self.variable_for(Keepalive::Host(innermost(obj)))
    }

    pub(crate) fn view_variable(&mut self, view: &ByteView) -> String {
        self.variable_for(Keepalive::View(view.clone()))
    }

    pub(crate) fn surface_variable(&mut self, surface: &Rc<dyn Surface>) -> String {
        self.variable_for(Keepalive::Surface(Rc::clone(surface)))
    }

    pub(crate) fn has_identity(&self, object: &Keepalive) -> bool {
        self.registry.has_identity(&object.key())
    }

    pub(crate) fn cache(&mut self) -> &mut BinaryCache {
        &mut self.cache
    }

    #[cfg(test)]
    pub(crate) fn log(&self) -> &FrameLog {
        &self.log
    }

    #[cfg(test)]
    pub(crate) fn scopes(&self) -> &VariableScopes {
        &self.scopes
    }

    #[cfg(test)]
    pub(crate) fn cache_store(&self) -> &BinaryCache {
        &self.cache
    }

    /// Note a live mapped range of `buffer`
    pub(crate) fn add_mapped_range(&mut self, buffer: &Rc<dyn HostObject>, view: ByteView) {
        let key = Keepalive::Host(innermost(buffer)).key();
        self.mapped.entry(key).or_default().push(view);
    }

    /// Live mapped ranges of `buffer`, without clearing them
    pub(crate) fn mapped_ranges(&self, buffer: &Rc<dyn HostObject>) -> Vec<ByteView> {
        let key = Keepalive::Host(innermost(buffer)).key();
        self.mapped.get(&key).cloned().unwrap_or_default()
    }

    pub(crate) fn clear_mapped_ranges(&mut self, buffer: &Rc<dyn HostObject>) {
        let key = Keepalive::Host(innermost(buffer)).key();
        self.mapped.remove(&key);
    }

    pub(crate) fn proxy_for(&self, obj: &Rc<dyn HostObject>) -> Option<Rc<Instrumented>> {
        self.proxies.get(&object_addr(obj)).cloned()
    }

    pub(crate) fn insert_proxy(&mut self, obj: &Rc<dyn HostObject>, proxy: Rc<Instrumented>) {
        self.proxies.insert(object_addr(obj), proxy);
    }

    pub(crate) fn surface_proxy(&self, addr: usize) -> Option<Rc<InstrumentedSurface>> {
        self.surfaces.get(&addr).cloned()
    }

    pub(crate) fn insert_surface_proxy(&mut self, addr: usize, proxy: Rc<InstrumentedSurface>) {
        self.surfaces.insert(addr, proxy);
    }

    /// Open a new frame section. Returns whether the frame is being recorded.
    fn begin_frame(&mut self) -> bool {
        if !self.is_recording() {
            return false;
        }
        let index = self.log.begin_frame();
        tracing::debug!(frame = index, "Frame started");
        true
    }

    /// Close the current frame, finalizing once the frame budget is spent.
    ///
    /// The caller runs the returned export once the session borrow is released.
    fn end_frame(&mut self) -> Option<PendingExport> {
        if !self.is_recording() {
            return None;
        }
        if self.log.frame_count() >= self.config.frame_budget() {
            return self.finalize();
        }
        None
    }

    fn finalize(&mut self) -> Option<PendingExport> {
        self.state = RecordingState::Finalizing;

        let program = output::generate(&self.config, &self.log, &self.scopes, &self.cache);
        let file_name = self.config.artifact_name();
        let stats = self.stats();
        tracing::info!(
            file = %file_name,
            frames = stats.frames_recorded,
            statements = stats.statements,
            cache_entries = stats.cache_entries,
            cache_bytes = stats.cache_bytes,
            bytes_seen = stats.bytes_seen,
            "Recording complete"
        );

        self.mapped.clear();
        self.proxies.clear();
        self.surfaces.clear();
        self.state = RecordingState::Idle;

        let exporter = self.exporter.take()?;
        Some(PendingExport {
            exporter,
            file_name,
            program,
        })
    }

    fn stats(&self) -> RecordingStats {
        RecordingStats {
            state: self.state,
            frames_recorded: self.log.frame_count(),
            statements: self.log.statement_count(),
            cache_entries: self.cache.len(),
            cache_bytes: self.cache.stored_bytes(),
            bytes_seen: self.cache.bytes_seen(),
        }
    }
}

/// A finished replay program waiting to be handed to its exporter
struct PendingExport {
    exporter: Box<dyn Exporter>,
    file_name: String,
    program: String,
}

impl PendingExport {
    fn run(mut self) {
        if let Err(e) = self.exporter.export(&self.file_name, &self.program) {
            tracing::error!(file = %self.file_name, error = %e, "Failed to export recording");
        }
    }
}

/// A recording session over one host graphics API
#[derive(Clone)]
pub struct Recorder {
    session: SessionHandle,
    gpu: Option<Rc<dyn HostObject>>,
}

impl Recorder {
    /// Start recording calls made against `gpu`.
    ///
    /// Without a graphics capability the recorder stays in
    /// [`RecordingState::NotRecording`] and instruments nothing.
    pub fn new(
        config: RecorderConfig,
        gpu: Option<Rc<dyn HostObject>>,
        exporter: impl Exporter + 'static,
    ) -> Self {
        let state = if gpu.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::NotRecording
        };
        let frames = config.frame_budget();
        let session = Rc::new(RefCell::new(Session::new(config, state, Box::new(exporter))));

        let gpu = gpu.map(|gpu| {
            let root = innermost(&gpu);
            {
                let mut s = session.borrow_mut();
                let var = s.object_variable(&root);
                s.record(format!("{var} = {ROOT_EXPRESSION};"));
            }
            intercept::instrument(&session, root)
        });

        match state {
            RecordingState::Recording => tracing::info!(frames, "Recording started"),
            _ => tracing::info!("No graphics capability available, not recording"),
        }

        Self { session, gpu }
    }

    /// The host API's root object.
    ///
    /// Instrumented while recording; the raw host object once recording has
    /// finished; `None` without a graphics capability.
    pub fn gpu(&self) -> Option<Rc<dyn HostObject>> {
        let gpu = self.gpu.as_ref()?;
        match self.state() {
            RecordingState::Idle => Some(innermost(gpu)),
            _ => Some(Rc::clone(gpu)),
        }
    }

    /// Run one frame boundary: open a new frame section, run the
    /// application's frame callback, then export if the frame budget is spent.
    pub fn frame<F: FnOnce(f64)>(&self, timestamp: f64, callback: F) {
        let active = self.session.borrow_mut().begin_frame();
        callback(timestamp);
        if !active {
            return;
        }
        let pending = self.session.borrow_mut().end_frame();
        if let Some(export) = pending {
            export.run();
        }
    }

    /// Wrap the host's frame scheduler so every scheduled callback marks a
    /// frame boundary
    pub fn scheduler(&self, inner: Rc<dyn FrameScheduler>) -> RecordingScheduler {
        RecordingScheduler {
            inner,
            recorder: self.clone(),
        }
    }

    /// Instrument existing and future surfaces of `factory`
    pub fn watch_surfaces(&self, factory: Rc<dyn SurfaceFactory>) -> SurfaceWatcher {
        SurfaceWatcher::new(factory, Rc::downgrade(&self.session))
    }

    pub fn state(&self) -> RecordingState {
        self.session.borrow().state
    }

    pub fn stats(&self) -> RecordingStats {
        self.session.borrow().stats()
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &SessionHandle {
        &self.session
    }
}

/// Frame scheduler that runs each callback through [`Recorder::frame`]
pub struct RecordingScheduler {
    inner: Rc<dyn FrameScheduler>,
    recorder: Recorder,
}

impl FrameScheduler for RecordingScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        let recorder = self.recorder.clone();
        self.inner.request_frame(Box::new(move |timestamp| {
            recorder.frame(timestamp, callback);
        }));
    }
}
