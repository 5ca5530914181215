//! Purpose: Define the stable public API boundary for halite.
//! Exports: Decode entry points, registration types, embeds, and the HTTP client.
//! Role: Public, additive-only surface; `core` stays the implementation side.
//! Invariants: Everything a downstream crate needs is reachable from here.
//! Invariants: Decode-path types are re-exported, never redefined.

mod client;
mod envelope;

pub use crate::core::descriptor::{
    DescriptorBuilder, EmbeddedBinding, HalResource, PropertyBinding, Shape, TypeDescriptor,
    resolve,
};
pub use crate::core::document::{EMBEDDED_KEY, LINKS_KEY, decode_slice, decode_str, decode_value};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use client::{ApiResult, FetchedDocument, HalClient};
pub use envelope::Embeds;
