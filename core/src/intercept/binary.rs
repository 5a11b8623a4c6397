//! Calls that move bytes across the API boundary
//!
//! Byte payloads are captured into the binary cache at the moment of the
//! call, since the application is free to reuse its buffers afterwards.

use gpurec_shared::{ByteView, HostError, HostObject, ImageSource, Value};
use std::rc::Rc;

use super::record_call;
use crate::recorder::{Session, SessionHandle};
use crate::serialize::{self, cache_reference, call_statement};

pub const UNMAP: &str = "unmap";
pub const GET_MAPPED_RANGE: &str = "getMappedRange";
pub const COPY_EXTERNAL_IMAGE: &str = "copyExternalImageToTexture";
pub const WRITE_BUFFER: &str = "writeBuffer";
pub const SET_BIND_GROUP: &str = "setBindGroup";

const WRITE_TEXTURE: &str = "writeTexture";

/// Serialized argument list for `method`.
///
/// Sub-range forms only cache the addressed elements and are rewritten to
/// address the whole cached copy.
pub(super) fn arguments_for(session: &mut Session, method: &str, args: &[Value]) -> String {
    match (method, args) {
        (WRITE_BUFFER, [buffer, offset, Value::Bytes(data), rest @ ..]) => {
            let buffer = serialize::expression(session, buffer);
            let offset = serialize::expression(session, offset);
            let (index, len) = cache_range(session, data, rest.first(), rest.get(1));
            format!("{buffer}, {offset}, {}, 0, {len}", cache_reference(index))
        }
        (SET_BIND_GROUP, [slot, group, Value::Bytes(data), start, len]) => {
            let slot = serialize::expression(session, slot);
            let group = serialize::expression(session, group);
            let (index, len) = cache_range(session, data, Some(start), Some(len));
            format!("{slot}, {group}, {}, 0, {len}", cache_reference(index))
        }
        _ => serialize::arguments(session, args),
    }
}

/// Cache `count` elements of `data` from element `start`; a missing start
/// means the beginning and a missing count means the rest of the view.
fn cache_range(
    session: &mut Session,
    data: &ByteView,
    start: Option<&Value>,
    count: Option<&Value>,
) -> (usize, usize) {
    let start = start.and_then(Value::as_usize).unwrap_or(0);
    let count = count
        .and_then(Value::as_usize)
        .unwrap_or_else(|| data.len().saturating_sub(start));
    let index = session.cache().cache(data, start, count);
    let len = session.cache().get(index).map_or(0, |entry| entry.len);
    (index, len)
}

/// Unmap a buffer.
///
/// The contents of every live mapped range are captured before the real
/// unmap detaches them, and restored in the replay right before the unmap.
pub(super) fn unmap(
    handle: &SessionHandle,
    target: &Rc<dyn HostObject>,
    args: &[Value],
    real_args: &[Value],
) -> Result<Value, HostError> {
    let snapshots: Vec<(ByteView, Vec<u8>)> = handle
        .borrow()
        .mapped_ranges(target)
        .into_iter()
        .map(|view| {
            let bytes = view.to_vec();
            (view, bytes)
        })
        .collect();

    let result = target.call(UNMAP, real_args)?;

    {
        let mut session = handle.borrow_mut();
        for (view, bytes) in snapshots {
            let size = bytes.len();
            let index = session.cache().cache_bytes(bytes);
            let var = session.view_variable(&view);
            session.record(format!(
                "new Uint8Array({var}).set({});",
                cache_reference(index)
            ));
            tracing::trace!(var = %var, size, "Mapped range captured");
        }
        session.clear_mapped_ranges(target);
    }

    Ok(record_call(handle, target, UNMAP, args, result, false))
}

/// Copy an external image into a texture.
///
/// Image sources have no replayable form, so the copy is recorded as an
/// upload of the rasterized pixels.
pub(super) fn copy_external_image(
    handle: &SessionHandle,
    target: &Rc<dyn HostObject>,
    args: &[Value],
    real_args: &[Value],
) -> Result<Value, HostError> {
    let result = target.call(COPY_EXTERNAL_IMAGE, real_args)?;

    let Some(image) = image_source(args.first()) else {
        tracing::warn!("Image copy without an image source, not recording");
        return Ok(result);
    };
    let pixels = match image.rasterize() {
        Ok(pixels) => pixels,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to rasterize image source, not recording");
            return Ok(result);
        }
    };

    let (width, height) = (image.width(), image.height());
    let layout = Value::dict([
        ("bytesPerRow", (width * 4).into()),
        ("rowsPerImage", height.into()),
    ]);
    let size = match args.get(2) {
        Some(size) if !size.is_undefined() => size.clone(),
        _ => Value::Array(vec![width.into(), height.into()]),
    };

    let mut session = handle.borrow_mut();
    let target_var = session.object_variable(target);
    let destination = args
        .get(1)
        .map(|dest| serialize::expression(&mut session, dest))
        .unwrap_or_else(|| "{}".to_string());
    let index = session.cache().cache_bytes(pixels);
    let layout = serialize::expression(&mut session, &layout);
    let size = serialize::expression(&mut session, &size);
    session.record(call_statement(
        None,
        false,
        &target_var,
        WRITE_TEXTURE,
        &format!("{destination}, {}, {layout}, {size}", cache_reference(index)),
    ));

    Ok(result)
}

fn image_source(source: Option<&Value>) -> Option<Rc<dyn ImageSource>> {
    match source? {
        Value::Image(image) => Some(Rc::clone(image)),
        other => match other.get("source")? {
            Value::Image(image) => Some(Rc::clone(image)),
            _ => None,
        },
    }
}
