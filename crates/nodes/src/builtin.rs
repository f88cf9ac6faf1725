//! Builtin callbacks available to serialized workflow definitions.

use serde_json::Value;

use crate::{CallbackOutcome, CallbackRegistry, NodeError, TaskContext};

/// Register `noop`, `set_data`, `equals` and `fail`.
pub fn register_builtins(registry: &mut CallbackRegistry) -> Result<(), NodeError> {
    registry.register_fn("noop", noop)?;
    registry.register_fn("set_data", set_data)?;
    registry.register_fn("equals", equals)?;
    registry.register_fn("fail", fail)?;
    Ok(())
}

/// Completes immediately.
pub fn noop(_args: &[Value], _task: &mut TaskContext<'_>) -> CallbackOutcome {
    CallbackOutcome::Done
}

/// `[key, value]`: store `value` under `key` in the task's data.
pub fn set_data(args: &[Value], task: &mut TaskContext<'_>) -> CallbackOutcome {
    match args {
        [Value::String(key), value] => {
            task.set(key.clone(), value.clone());
            CallbackOutcome::Done
        }
        _ => CallbackOutcome::failed(format!(
            "set_data expects [key, value], got {}",
            Value::from(args.to_vec())
        )),
    }
}

/// `[expected, key]`: done once `data[key] == expected`, retried otherwise.
pub fn equals(args: &[Value], task: &mut TaskContext<'_>) -> CallbackOutcome {
    match args {
        [expected, Value::String(key)] => (task.get(key) == Some(expected)).into(),
        _ => CallbackOutcome::failed(format!(
            "equals expects [expected, key], got {}",
            Value::from(args.to_vec())
        )),
    }
}

/// `[message]`: always fails.
pub fn fail(args: &[Value], _task: &mut TaskContext<'_>) -> CallbackOutcome {
    let message = args
        .first()
        .and_then(Value::as_str)
        .unwrap_or("forced failure");
    CallbackOutcome::failed(message)
}
