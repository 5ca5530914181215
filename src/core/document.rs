//! Purpose: Parse one HAL document and orchestrate the decode pipeline.
//! Exports: `decode_value`, `decode_str`, `decode_slice`, reserved-key constants.
//! Role: Single seam between raw JSON values and typed instances.
//! Invariants: Exactly one pass over the document's keys; order never matters.
//! Invariants: `_links` subtrees are skipped wholesale, whatever their shape.

use std::any::Any;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::descriptor::{self, HalResource, TypeDescriptor};
use crate::core::embedded;
use crate::core::error::{Error, ErrorKind};
use crate::core::instance;

pub const LINKS_KEY: &str = "_links";
pub const EMBEDDED_KEY: &str = "_embedded";

/// The intermediate result of one parse pass: decoded ordinary properties and
/// resolved embedded values, both keyed by their canonical binding names.
/// Lives only until the instance builder consumes it.
pub(crate) struct ParsedDocument {
    pub(crate) properties: BTreeMap<&'static str, Box<dyn Any>>,
    pub(crate) embedded: BTreeMap<&'static str, Box<dyn Any>>,
}

/// Decodes a HAL document held as a parsed JSON value into a `T`.
pub fn decode_value<T: HalResource>(value: &Value) -> Result<T, Error> {
    let descriptor = descriptor::resolve::<T>();
    tracing::trace!(type_name = descriptor.type_name(), "decoding HAL document");
    let parsed = parse_document(value, &descriptor)?;
    instance::build::<T>(&descriptor, parsed)
}

/// Decodes a HAL document from JSON text.
pub fn decode_str<T: HalResource>(input: &str) -> Result<T, Error> {
    let value: Value = serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("invalid JSON document")
            .with_source(err)
    })?;
    decode_value(&value)
}

/// Decodes a HAL document from JSON bytes.
pub fn decode_slice<T: HalResource>(input: &[u8]) -> Result<T, Error> {
    let value: Value = serde_json::from_slice(input).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("invalid JSON document")
            .with_source(err)
    })?;
    decode_value(&value)
}

pub(crate) fn parse_document(
    value: &Value,
    descriptor: &TypeDescriptor,
) -> Result<ParsedDocument, Error> {
    let Some(object) = value.as_object() else {
        return Err(Error::new(ErrorKind::Malformed)
            .with_message("expected a JSON object at the document root")
            .with_type_name(descriptor.type_name()));
    };

    let mut parsed = ParsedDocument {
        properties: BTreeMap::new(),
        embedded: BTreeMap::new(),
    };
    for (key, raw) in object {
        if key == EMBEDDED_KEY {
            parse_embedded(raw, descriptor, &mut parsed)?;
        } else if key == LINKS_KEY {
            // Links are not decoded.
        } else {
            parse_property(key, raw, descriptor, &mut parsed)?;
        }
    }
    Ok(parsed)
}

fn parse_property(
    key: &str,
    raw: &Value,
    descriptor: &TypeDescriptor,
    parsed: &mut ParsedDocument,
) -> Result<(), Error> {
    let Some(binding) = descriptor.property(key) else {
        if descriptor.ignore_unknown() {
            return Ok(());
        }
        return Err(Error::new(ErrorKind::UnknownProperty)
            .with_message("property key not declared for type")
            .with_key(key)
            .with_type_name(descriptor.type_name()));
    };
    // A null value leaves the field at its constructed default.
    if raw.is_null() {
        return Ok(());
    }
    let value = binding.decode(raw)?;
    parsed.properties.insert(binding.key(), value);
    Ok(())
}

fn parse_embedded(
    raw: &Value,
    descriptor: &TypeDescriptor,
    parsed: &mut ParsedDocument,
) -> Result<(), Error> {
    let Some(object) = raw.as_object() else {
        return Err(Error::new(ErrorKind::Malformed)
            .with_message("expected a JSON object under _embedded")
            .with_type_name(descriptor.type_name()));
    };
    for (relation, value) in object {
        let Some(binding) = descriptor.embedded(relation) else {
            if descriptor.ignore_unknown() {
                continue;
            }
            return Err(Error::new(ErrorKind::UnknownRelation)
                .with_message("embedded relation not declared for type")
                .with_relation(relation)
                .with_type_name(descriptor.type_name()));
        };
        if let Some(resolved) = embedded::resolve(value, binding)? {
            parsed.embedded.insert(binding.relation(), resolved);
        }
    }
    Ok(())
}
