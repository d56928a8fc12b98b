//! Key-sorted canonical JSON.
//!
//! Records are serialized through a `serde_json::Value` tree, checked for
//! floats, and emitted in RFC 8785 (JCS) form: recursively sorted keys,
//! compact separators, UTF-8. This is the only byte-production path for
//! state hashes and for everything persisted to the ledger, so identical
//! logical records always hash and store identically.

use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;

/// Serializes `value` into its canonical byte form.
///
/// Fails with [`CodecError::FloatRejected`] if the value tree contains a
/// non-integer number anywhere; amounts in this system are integers, and
/// floats have no single canonical rendering.
pub fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let tree = serde_json::to_value(value)?;
    check_tree(&tree)?;
    let text = serde_jcs::to_string(&tree)?;
    Ok(text.into_bytes())
}

/// Walks the value tree and rejects floats.
///
/// Null, bool, string and integer leaves pass through; objects and arrays
/// recurse. Object keys are already strings in `serde_json`.
fn check_tree(value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CodecError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Object(map) => {
            for v in map.values() {
                check_tree(v)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for v in items {
                check_tree(v)?;
            }
            Ok(())
        }
    }
}
