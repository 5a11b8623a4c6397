//! Surface watching
//!
//! Drawable surfaces are instrumented as the application obtains them, both
//! the ones that exist when watching starts and the ones created afterwards.
//! A GPU context taken from an instrumented surface is recorded against the
//! replay page's own canvas and instrumented like any other host object.

use gpurec_shared::{HostObject, Surface, SurfaceFactory, innermost, surface_addr};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::intercept;
use crate::recorder::{Keepalive, Session, SessionHandle};
use crate::serialize::string_literal;

/// Element id of the replay page's canvas
pub const SURFACE_ELEMENT_ID: &str = "webgpu-replay";

/// Context kind whose calls are recorded
pub const GPU_CONTEXT_KIND: &str = "webgpu";

/// Strip proxies from a surface
fn innermost_surface(surface: &Rc<dyn Surface>) -> Rc<dyn Surface> {
    let mut current = Rc::clone(surface);
    while let Some(inner) = current.unwrap_surface() {
        current = inner;
    }
    current
}

fn active(session: &Weak<RefCell<Session>>) -> Option<SessionHandle> {
    session
        .upgrade()
        .filter(|handle| handle.borrow().is_recording())
}

/// Recording proxy over a drawable surface
pub struct InstrumentedSurface {
    inner: Rc<dyn Surface>,
    session: Weak<RefCell<Session>>,
}

impl Surface for InstrumentedSurface {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn get_context(&self, kind: &str) -> Option<Rc<dyn HostObject>> {
        let context = self.inner.get_context(kind)?;
        if kind != GPU_CONTEXT_KIND {
            return Some(context);
        }
        let Some(handle) = active(&self.session) else {
            return Some(context);
        };

        let context = innermost(&context);
        {
            let mut session = handle.borrow_mut();
            if !session.has_identity(&Keepalive::Surface(Rc::clone(&self.inner))) {
                let surface_var = session.surface_variable(&self.inner);
                session.record(format!(
                    "{surface_var} = document.getElementById({});",
                    string_literal(SURFACE_ELEMENT_ID)
                ));
            }
            if !session.has_identity(&Keepalive::Host(Rc::clone(&context))) {
                let surface_var = session.surface_variable(&self.inner);
                let context_var = session.object_variable(&context);
                session.record(format!(
                    "{context_var} = {surface_var}.getContext({});",
                    string_literal(kind)
                ));
                tracing::debug!(context = %context_var, "GPU context acquired");
            }
        }

        Some(intercept::instrument(&handle, context))
    }

    fn unwrap_surface(&self) -> Option<Rc<dyn Surface>> {
        Some(Rc::clone(&self.inner))
    }
}

/// Surface factory that hands out instrumented surfaces
pub struct SurfaceWatcher {
    factory: Rc<dyn SurfaceFactory>,
    session: Weak<RefCell<Session>>,
}

impl SurfaceWatcher {
    /// Start watching `factory`, instrumenting the surfaces it already holds
    pub(crate) fn new(factory: Rc<dyn SurfaceFactory>, session: Weak<RefCell<Session>>) -> Self {
        let watcher = Self { factory, session };
        let existing = watcher.factory.surfaces();
        tracing::debug!(surfaces = existing.len(), "Watching surfaces");
        for surface in existing {
            watcher.watch(surface);
        }
        watcher
    }

    /// The instrumented proxy for `surface`, created on first sight
    fn watch(&self, surface: Rc<dyn Surface>) -> Rc<dyn Surface> {
        let Some(handle) = active(&self.session) else {
            return surface;
        };
        let inner = innermost_surface(&surface);
        let addr = surface_addr(&inner);

        if let Some(existing) = handle.borrow().surface_proxy(addr) {
            return existing;
        }
        let proxy = Rc::new(InstrumentedSurface {
            inner,
            session: Weak::clone(&self.session),
        });
        handle
            .borrow_mut()
            .insert_surface_proxy(addr, Rc::clone(&proxy));
        proxy
    }
}

impl SurfaceFactory for SurfaceWatcher {
    fn surfaces(&self) -> Vec<Rc<dyn Surface>> {
        self.factory
            .surfaces()
            .into_iter()
            .map(|surface| self.watch(surface))
            .collect()
    }

    fn create_surface(&self, width: u32, height: u32) -> Rc<dyn Surface> {
        self.watch(self.factory.create_surface(width, height))
    }
}
