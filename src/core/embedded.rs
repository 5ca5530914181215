//! Purpose: Turn one embedded relation's raw JSON into its declared shape.
//! Exports: `resolve` (crate-internal), envelope content extraction.
//! Role: The recursion point of the decode pipeline; nested resources re-enter it.
//! Invariants: An unset element type fails before the raw value is touched.
//! Invariants: Element order in envelopes and arrays is preserved.

use std::any::Any;

use serde_json::Value;

use crate::core::descriptor::{EmbeddedBinding, Shape};
use crate::core::document::EMBEDDED_KEY;
use crate::core::error::{Error, ErrorKind};

/// Returns `None` for a null scalar relation: the target field keeps its
/// constructed default. Array and collection relations map null to an empty
/// element list instead.
pub(crate) fn resolve(
    raw: &Value,
    binding: &EmbeddedBinding,
) -> Result<Option<Box<dyn Any>>, Error> {
    match binding.shape() {
        Shape::Scalar => {
            if raw.is_null() {
                return Ok(None);
            }
            let Some(decode) = binding.scalar_codec() else {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("scalar relation has no codec")
                    .with_relation(binding.relation()));
            };
            decode(raw).map(Some)
        }
        Shape::Array | Shape::Collection => {
            let Some(decode) = binding.element_codec() else {
                return Err(Error::new(ErrorKind::MissingElementType)
                    .with_message("relation declared without an element type")
                    .with_relation(binding.relation()));
            };
            let items = envelope_content(raw, binding.relation())?;
            decode(&items).map(Some)
        }
    }
}

/// Extracts the element list an array or collection relation refers to.
///
/// The value is either a nested HAL collection document (the elements live
/// under its `_embedded` block) or a bare array of elements. `null` counts as
/// an empty list.
fn envelope_content<'a>(raw: &'a Value, relation: &str) -> Result<Vec<&'a Value>, Error> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(envelope) => match envelope.get(EMBEDDED_KEY) {
            None => Ok(Vec::new()),
            Some(Value::Object(relations)) => {
                let mut content = Vec::new();
                for value in relations.values() {
                    match value {
                        Value::Array(items) => content.extend(items.iter()),
                        scalar => content.push(scalar),
                    }
                }
                Ok(content)
            }
            Some(_) => Err(Error::new(ErrorKind::Malformed)
                .with_message("expected a JSON object under the envelope's _embedded")
                .with_relation(relation)),
        },
        _ => Err(Error::new(ErrorKind::Malformed)
            .with_message("expected an envelope object or element array")
            .with_relation(relation)),
    }
}
