//! Call interception
//!
//! [`Instrumented`] is a proxy implementing [`HostObject`] over a real host
//! object. Each call runs the real method first, then appends a statement
//! describing the call to the recording session, then hands the real result
//! (with any returned object instrumented in turn) back to the caller.
//!
//! Nested objects that expose methods of their own (a device's queue, for
//! instance) are discovered when their parent is instrumented: a one-time
//! assignment statement names them and they are instrumented recursively.

mod binary;

use gpurec_shared::{Deferred, HostError, HostObject, MemberKind, Value, innermost, unwrap_value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::recorder::{Keepalive, Session, SessionHandle};
use crate::serialize::{call_statement, string_literal};

/// Methods forwarded without recording. Context acquisition is recorded by
/// the surface watcher instead.
pub const SKIPPED_METHODS: &[&str] = &[
    "toString",
    "entries",
    "forEach",
    "has",
    "keys",
    "values",
    "get",
    "getContext",
    "getPreferredCanvasFormat",
];

/// Methods whose deferred results are recorded once they settle
pub const DEFERRED_METHODS: &[&str] = &[
    "requestAdapter",
    "requestAdapterInfo",
    "requestDevice",
    "createComputePipelineAsync",
    "createRenderPipelineAsync",
    "mapAsync",
    "onSubmittedWorkDone",
    "getCompilationInfo",
    "popErrorScope",
];

/// Recording proxy over a host object
pub struct Instrumented {
    inner: Rc<dyn HostObject>,
    session: Weak<RefCell<Session>>,
    /// Instrumented nested objects, by member name
    nested: RefCell<BTreeMap<String, Rc<dyn HostObject>>>,
}

impl Instrumented {
    /// The session, if it is still recording
    fn active_session(&self) -> Option<SessionHandle> {
        self.session
            .upgrade()
            .filter(|handle| handle.borrow().is_recording())
    }
}

impl HostObject for Instrumented {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn members(&self) -> Vec<(String, MemberKind)> {
        self.inner.members()
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let real_args: Vec<Value> = args.iter().map(unwrap_value).collect();

        let handle = match self.active_session() {
            Some(handle) if !SKIPPED_METHODS.contains(&method) => handle,
            _ => return self.inner.call(method, &real_args),
        };

        match method {
            binary::UNMAP => binary::unmap(&handle, &self.inner, args, &real_args),
            binary::COPY_EXTERNAL_IMAGE => {
                binary::copy_external_image(&handle, &self.inner, args, &real_args)
            }
            _ => {
                let result = self.inner.call(method, &real_args)?;
                Ok(record_call(&handle, &self.inner, method, args, result, false))
            }
        }
    }

    fn call_deferred(&self, method: &str, args: &[Value]) -> Deferred {
        let real_args: Vec<Value> = args.iter().map(unwrap_value).collect();
        let pending = self.inner.call_deferred(method, &real_args);

        if SKIPPED_METHODS.contains(&method) || self.active_session().is_none() {
            return pending;
        }
        if !DEFERRED_METHODS.contains(&method) {
            tracing::warn!(method, "Deferred call outside the recorded set, not recording");
            return pending;
        }

        let session = self.session.clone();
        let target = Rc::clone(&self.inner);
        let method = method.to_string();
        let args = args.to_vec();
        Box::pin(async move {
            let result = pending.await?;
            match session.upgrade() {
                Some(handle) => {
                    tracing::debug!(method = %method, "Deferred call settled");
                    Ok(record_call(&handle, &target, &method, &args, result, true))
                }
                None => Ok(result),
            }
        })
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(nested) = self.nested.borrow().get(name) {
            return Some(Value::Object(Rc::clone(nested)));
        }
        self.inner.get(name)
    }

    fn unwrap_host(&self) -> Option<Rc<dyn HostObject>> {
        Some(Rc::clone(&self.inner))
    }
}

/// Record a completed call and return its result, with a returned object
/// instrumented.
pub(crate) fn record_call(
    handle: &SessionHandle,
    target: &Rc<dyn HostObject>,
    method: &str,
    args: &[Value],
    result: Value,
    deferred: bool,
) -> Value {
    {
        let mut session = handle.borrow_mut();
        if !session.is_recording() {
            return result;
        }

        let target_var = session.object_variable(target);
        let args_text = binary::arguments_for(&mut session, method, args);
        let result_var = match &result {
            Value::Object(obj) => Some(session.object_variable(obj)),
            Value::Bytes(view) => Some(session.view_variable(view)),
            _ => None,
        };
        session.record(call_statement(
            result_var.as_deref(),
            deferred,
            &target_var,
            method,
            &args_text,
        ));

        if method == binary::GET_MAPPED_RANGE {
            if let Value::Bytes(view) = &result {
                session.add_mapped_range(target, view.clone());
            }
        }
    }

    match result {
        Value::Object(obj) => Value::Object(instrument(handle, obj)),
        other => other,
    }
}

/// Instrument `obj` and its nested objects, once.
///
/// Returns the existing proxy if `obj` was instrumented before.
pub(crate) fn instrument(handle: &SessionHandle, obj: Rc<dyn HostObject>) -> Rc<dyn HostObject> {
    let inner = innermost(&obj);
    if let Some(existing) = handle.borrow().proxy_for(&inner) {
        return existing;
    }

    let proxy = Rc::new(Instrumented {
        inner: Rc::clone(&inner),
        session: Rc::downgrade(handle),
        nested: RefCell::new(BTreeMap::new()),
    });
    handle.borrow_mut().insert_proxy(&inner, Rc::clone(&proxy));

    for (name, kind) in inner.members() {
        if kind != MemberKind::Object {
            continue;
        }
        let Some(Value::Object(child)) = inner.get(&name) else {
            continue;
        };
        let child = innermost(&child);
        if !child.has_methods() {
            continue;
        }

        {
            let mut session = handle.borrow_mut();
            if !session.has_identity(&Keepalive::Host(Rc::clone(&child))) {
                let parent_var = session.object_variable(&inner);
                let child_var = session.object_variable(&child);
                session.record(format!(
                    "{child_var} = {parent_var}{};",
                    member_access(&name)
                ));
            }
        }

        let child_proxy = instrument(handle, child);
        proxy.nested.borrow_mut().insert(name, child_proxy);
    }

    proxy
}

/// Property access expression for a member name
fn member_access(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!(".{name}")
    } else {
        format!("[{}]", string_literal(name))
    }
}
