//! Purpose: Attach embedded sub-resources to an outgoing resource before encoding.
//! Exports: `Embeds`.
//! Role: Encode-side counterpart of the decode pipeline; not a strict inverse.
//! Invariants: A relation attached twice renders as an array; once, as a scalar.
//! Invariants: Attachments never touch the resource's own keys.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::document::EMBEDDED_KEY;
use crate::core::error::{Error, ErrorKind};

/// Embedded sub-resources collected for one outgoing document.
#[derive(Debug, Default)]
pub struct Embeds {
    entries: BTreeMap<String, EmbedEntry>,
}

#[derive(Debug)]
enum EmbedEntry {
    Single(Value),
    Many(Vec<Value>),
}

impl EmbedEntry {
    fn to_value(&self) -> Value {
        match self {
            EmbedEntry::Single(value) => value.clone(),
            EmbedEntry::Many(values) => Value::Array(values.clone()),
        }
    }
}

impl Embeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn relations(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Attaches a sub-resource without naming its relation.
    ///
    /// The relation would have to come from metadata on the object's type;
    /// that lookup does not exist yet, so the call always fails and callers
    /// must use [`Embeds::attach_as`].
    // TODO: derive the relation from descriptor metadata once descriptors carry one.
    pub fn attach<S: Serialize>(&mut self, _object: &S) -> Result<(), Error> {
        Err(Error::new(ErrorKind::Usage)
            .with_message("no relation given for embedded resource")
            .with_hint("Use attach_as(relation, object) to name the relation explicitly."))
    }

    /// Attaches a sub-resource under the given relation. A second attachment
    /// under the same relation promotes the entry to an array.
    pub fn attach_as<S: Serialize>(&mut self, relation: &str, object: &S) -> Result<(), Error> {
        let value = serialize_resource(relation, object)?;
        match self.entries.entry(relation.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(EmbedEntry::Single(value));
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let replaced = std::mem::replace(entry, EmbedEntry::Many(Vec::new()));
                let mut values = match replaced {
                    EmbedEntry::Single(first) => vec![first],
                    EmbedEntry::Many(values) => values,
                };
                values.push(value);
                *entry = EmbedEntry::Many(values);
            }
        }
        Ok(())
    }

    /// Attaches every element of a collection under the given relation. The
    /// relation renders as an array even for zero or one element.
    pub fn attach_all_as<S, I>(&mut self, relation: &str, objects: I) -> Result<(), Error>
    where
        S: Serialize,
        I: IntoIterator<Item = S>,
    {
        let mut values = Vec::new();
        for object in objects {
            values.push(serialize_resource(relation, &object)?);
        }
        match self.entries.entry(relation.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(EmbedEntry::Many(values));
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let replaced = std::mem::replace(entry, EmbedEntry::Many(Vec::new()));
                let mut merged = match replaced {
                    EmbedEntry::Single(first) => vec![first],
                    EmbedEntry::Many(existing) => existing,
                };
                merged.extend(values);
                *entry = EmbedEntry::Many(merged);
            }
        }
        Ok(())
    }

    /// Serializes `resource` and merges the attachments in as its `_embedded`
    /// block. The resource must serialize to a JSON object.
    pub fn apply_to<S: Serialize>(&self, resource: &S) -> Result<Value, Error> {
        let mut document = serde_json::to_value(resource).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to serialize outgoing resource")
                .with_source(err)
        })?;
        let Value::Object(object) = &mut document else {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("outgoing resource must serialize to a JSON object"));
        };
        if !self.entries.is_empty() {
            let mut embedded = Map::new();
            for (relation, entry) in &self.entries {
                embedded.insert(relation.clone(), entry.to_value());
            }
            object.insert(EMBEDDED_KEY.to_string(), Value::Object(embedded));
        }
        Ok(document)
    }
}

fn serialize_resource<S: Serialize>(relation: &str, object: &S) -> Result<Value, Error> {
    serde_json::to_value(object).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to serialize embedded resource")
            .with_relation(relation)
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::Embeds;
    use crate::core::error::ErrorKind;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Item {
        name: String,
    }

    #[derive(Serialize)]
    struct Order {
        id: u64,
    }

    fn item(name: &str) -> Item {
        Item {
            name: name.to_string(),
        }
    }

    #[test]
    fn attach_without_relation_requires_explicit_form() {
        let mut embeds = Embeds::new();
        let err = embeds.attach(&item("a")).expect_err("no relation");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(embeds.is_empty());
    }

    #[test]
    fn single_attachment_renders_as_scalar() {
        let mut embeds = Embeds::new();
        embeds.attach_as("item", &item("a")).expect("attach");
        let document = embeds.apply_to(&Order { id: 7 }).expect("apply");
        assert_eq!(
            document,
            json!({"id":7,"_embedded":{"item":{"name":"a"}}})
        );
    }

    #[test]
    fn repeated_attachment_promotes_to_array() {
        let mut embeds = Embeds::new();
        embeds.attach_as("items", &item("a")).expect("attach");
        embeds.attach_as("items", &item("b")).expect("attach");
        embeds.attach_as("items", &item("c")).expect("attach");
        let document = embeds.apply_to(&Order { id: 7 }).expect("apply");
        assert_eq!(
            document["_embedded"]["items"],
            json!([{"name":"a"},{"name":"b"},{"name":"c"}])
        );
    }

    #[test]
    fn collection_attachment_renders_as_array_even_for_one() {
        let mut embeds = Embeds::new();
        embeds
            .attach_all_as("items", vec![item("only")])
            .expect("attach");
        let document = embeds.apply_to(&Order { id: 1 }).expect("apply");
        assert_eq!(document["_embedded"]["items"], json!([{"name":"only"}]));
    }

    #[test]
    fn no_attachments_leaves_resource_untouched() {
        let embeds = Embeds::new();
        let document = embeds.apply_to(&Order { id: 3 }).expect("apply");
        assert_eq!(document, json!({"id":3}));
    }

    #[test]
    fn non_object_resource_is_rejected() {
        let embeds = Embeds::new();
        let err = embeds.apply_to(&vec![1, 2, 3]).expect_err("not an object");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }
}
