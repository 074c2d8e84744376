//! Normalizes a raw queue message body into a [`TaskInvocation`].
//!
//! Pure and deterministic: no network or disk access. Two body shapes are accepted — see
//! [`decode`] for the exact rules. The legacy shape exists to interoperate with producers still
//! emitting Celery v1-style, base64-wrapped pickled payloads; decoding never executes arbitrary
//! code, it only walks a restricted pickle value tree and rejects anything that isn't a plain
//! mapping of primitives.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::task_invocation::TaskInvocation;

/// Decode a raw message body fetched from the remote queue into a [`TaskInvocation`].
///
/// `fetched_at`/`visibility_timeout` are supplied by the caller (the `ReadWorker`, which knows
/// when the message was received and what visibility window the source queue is using) rather
/// than computed here, keeping this function pure.
pub fn decode(
    raw_body: &[u8],
    fetched_at: Instant,
    visibility_timeout: Duration,
) -> Result<TaskInvocation, DecodeError> {
    let root: Value = serde_json::from_slice(raw_body)?;
    let obj = root.as_object().ok_or(DecodeError::UnrecognizedShape)?;

    let (task, args, kwargs) = if let Some(Value::String(body)) = obj.get("body") {
        decode_legacy_wrapped(body)?
    } else if obj.contains_key("task") {
        decode_native(obj)?
    } else {
        return Err(DecodeError::UnrecognizedShape);
    };

    if task.is_empty() {
        return Err(DecodeError::EmptyTaskName);
    }

    Ok(TaskInvocation::new(
        task,
        args,
        kwargs,
        fetched_at,
        visibility_timeout,
    ))
}

/// Native JSON shape: `{"task": <string>, "args": <array>, "kwargs": <object>}`, used verbatim.
fn decode_native(
    obj: &Map<String, Value>,
) -> Result<(String, Vec<Value>, Map<String, Value>), DecodeError> {
    let task = obj
        .get("task")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField("task"))?
        .to_string();

    let args = obj
        .get("args")
        .cloned()
        .unwrap_or_else(|| Value::Array(vec![]));
    let args = args.as_array().cloned().ok_or(DecodeError::MissingField("args"))?;

    let kwargs = obj
        .get("kwargs")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let kwargs = kwargs
        .as_object()
        .cloned()
        .ok_or(DecodeError::MissingField("kwargs"))?;

    Ok((task, args, kwargs))
}

/// Wrapped legacy shape: `{"body": "<base64 of legacy-pickled {task, args, kwargs} mapping>", ...}`.
/// Additional wrapper fields are ignored.
fn decode_legacy_wrapped(
    body_b64: &str,
) -> Result<(String, Vec<Value>, Map<String, Value>), DecodeError> {
    let pickled = BASE64.decode(body_b64.trim_end())?;
    let value = serde_pickle::value_from_slice(&pickled, Default::default())
        .map_err(|e| DecodeError::InvalidPickle(e.to_string()))?;

    let json = pickle_to_json(&value)?;
    let obj = json
        .as_object()
        .ok_or(DecodeError::MalformedLegacyPayload)?;

    decode_native(obj)
}

/// Convert a restricted subset of pickle values into [`serde_json::Value`].
///
/// Rejects anything that isn't a plain scalar, sequence, or string-keyed mapping — in
/// particular, pickled class instances (`REDUCE`/`GLOBAL` opcodes) are never accepted, so
/// decoding a legacy payload can never trigger arbitrary object construction.
fn pickle_to_json(value: &serde_pickle::Value) -> Result<Value, DecodeError> {
    use serde_pickle::Value as P;

    Ok(match value {
        P::None => Value::Null,
        P::Bool(b) => Value::Bool(*b),
        P::I64(i) => Value::from(*i),
        P::Int(big) => Value::String(big.to_string()),
        P::F64(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        P::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        P::String(s) => Value::String(s.clone()),
        P::List(items) | P::Tuple(items) => {
            let converted: Result<Vec<Value>, DecodeError> =
                items.iter().map(pickle_to_json).collect();
            Value::Array(converted?)
        }
        P::Dict(entries) => {
            let mut map = Map::new();
            for (key, val) in entries {
                map.insert(hashable_to_key(key)?, pickle_to_json(val)?);
            }
            Value::Object(map)
        }
        // Sets, frozensets, and reduced/global class instances have no place in a
        // {task, args, kwargs} mapping - refuse rather than guess.
        _ => return Err(DecodeError::MalformedLegacyPayload),
    })
}

fn hashable_to_key(key: &serde_pickle::HashableValue) -> Result<String, DecodeError> {
    use serde_pickle::HashableValue as H;
    match key {
        H::String(s) => Ok(s.clone()),
        H::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        _ => Err(DecodeError::MalformedLegacyPayload),
    }
}
