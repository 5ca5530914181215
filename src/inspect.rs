//! Purpose: Summarize and rewrite generic HAL documents for CLI commands.
//! Exports: `DocumentSummary`, `summarize`, `summary_json`, `render_summary`, `strip_reserved`.
//! Role: Structure-only view over untyped documents; no bindings involved.
//! Invariants: Summaries never mutate the input document.
//! Invariants: `strip_reserved` recurses into every remaining object and array.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use halite::api::{EMBEDDED_KEY, Error, ErrorKind, LINKS_KEY};

pub(crate) struct DocumentSummary {
    pub properties: Vec<String>,
    pub links: Vec<String>,
    pub embedded: BTreeMap<String, EmbeddedSummary>,
}

pub(crate) enum EmbeddedSummary {
    Resource(Box<DocumentSummary>),
    Resources {
        count: usize,
        first: Option<Box<DocumentSummary>>,
    },
    Other,
}

pub(crate) fn summarize(document: &Value) -> Result<DocumentSummary, Error> {
    let Some(object) = document.as_object() else {
        return Err(Error::new(ErrorKind::Malformed)
            .with_message("expected a JSON object at the document root"));
    };
    let mut summary = DocumentSummary {
        properties: Vec::new(),
        links: Vec::new(),
        embedded: BTreeMap::new(),
    };
    for (key, value) in object {
        if key == LINKS_KEY {
            if let Some(links) = value.as_object() {
                summary.links = links.keys().cloned().collect();
            }
        } else if key == EMBEDDED_KEY {
            let Some(relations) = value.as_object() else {
                return Err(Error::new(ErrorKind::Malformed)
                    .with_message("expected a JSON object under _embedded"));
            };
            for (relation, raw) in relations {
                summary
                    .embedded
                    .insert(relation.clone(), summarize_embedded(raw)?);
            }
        } else {
            summary.properties.push(key.clone());
        }
    }
    Ok(summary)
}

fn summarize_embedded(raw: &Value) -> Result<EmbeddedSummary, Error> {
    match raw {
        Value::Object(_) => Ok(EmbeddedSummary::Resource(Box::new(summarize(raw)?))),
        Value::Array(items) => {
            let first = match items.first() {
                Some(item) if item.is_object() => Some(Box::new(summarize(item)?)),
                _ => None,
            };
            Ok(EmbeddedSummary::Resources {
                count: items.len(),
                first,
            })
        }
        _ => Ok(EmbeddedSummary::Other),
    }
}

pub(crate) fn summary_json(summary: &DocumentSummary) -> Value {
    let mut embedded = Map::new();
    for (relation, entry) in &summary.embedded {
        embedded.insert(relation.clone(), embedded_json(entry));
    }
    json!({
        "properties": summary.properties,
        "links": summary.links,
        "embedded": Value::Object(embedded),
    })
}

fn embedded_json(entry: &EmbeddedSummary) -> Value {
    match entry {
        EmbeddedSummary::Resource(inner) => {
            json!({"kind": "resource", "document": summary_json(inner)})
        }
        EmbeddedSummary::Resources { count, first } => {
            let mut value = Map::new();
            value.insert("kind".to_string(), json!("resources"));
            value.insert("count".to_string(), json!(count));
            if let Some(first) = first {
                value.insert("first".to_string(), summary_json(first));
            }
            Value::Object(value)
        }
        EmbeddedSummary::Other => json!({"kind": "value"}),
    }
}

pub(crate) fn render_summary(summary: &DocumentSummary) -> String {
    let mut out = String::new();
    render_into(summary, 0, &mut out);
    out
}

fn render_into(summary: &DocumentSummary, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    out.push_str(&format!("{pad}properties: {}\n", join_or_none(&summary.properties)));
    out.push_str(&format!("{pad}links: {}\n", join_or_none(&summary.links)));
    if summary.embedded.is_empty() {
        return;
    }
    out.push_str(&format!("{pad}embedded:\n"));
    for (relation, entry) in &summary.embedded {
        match entry {
            EmbeddedSummary::Resource(inner) => {
                out.push_str(&format!("{pad}  {relation}: resource\n"));
                render_into(inner, indent + 2, out);
            }
            EmbeddedSummary::Resources { count, first } => {
                out.push_str(&format!("{pad}  {relation}: {count} resources\n"));
                if let Some(first) = first {
                    render_into(first, indent + 2, out);
                }
            }
            EmbeddedSummary::Other => {
                out.push_str(&format!("{pad}  {relation}: value\n"));
            }
        }
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

pub(crate) fn strip_reserved(document: &mut Value, strip_embedded: bool) {
    match document {
        Value::Object(object) => {
            object.remove(LINKS_KEY);
            if strip_embedded {
                object.remove(EMBEDDED_KEY);
            }
            for value in object.values_mut() {
                strip_reserved(value, strip_embedded);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_reserved(item, strip_embedded);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_reserved, summarize, summary_json};
    use serde_json::json;

    #[test]
    fn summarizes_properties_links_and_embedded() {
        let document = json!({
            "name": "Foo",
            "total": 9.5,
            "_links": {"self": {"href": "/x"}, "next": {"href": "/y"}},
            "_embedded": {
                "items": [{"name": "A"}, {"name": "B"}],
                "customer": {"id": 1, "_links": {"self": {"href": "/c/1"}}}
            }
        });
        let summary = summarize(&document).expect("summary");
        assert_eq!(summary.properties, vec!["name", "total"]);
        assert_eq!(summary.links, vec!["next", "self"]);

        let rendered = summary_json(&summary);
        assert_eq!(rendered["embedded"]["items"]["kind"], "resources");
        assert_eq!(rendered["embedded"]["items"]["count"], 2);
        assert_eq!(
            rendered["embedded"]["customer"]["document"]["links"][0],
            "self"
        );
    }

    #[test]
    fn strip_removes_links_recursively() {
        let mut document = json!({
            "name": "Foo",
            "_links": {"self": {"href": "/x"}},
            "_embedded": {
                "items": [{"name": "A", "_links": {"self": {"href": "/a"}}}]
            }
        });
        strip_reserved(&mut document, false);
        assert_eq!(
            document,
            json!({"name": "Foo", "_embedded": {"items": [{"name": "A"}]}})
        );
    }

    #[test]
    fn strip_can_remove_embedded_too() {
        let mut document = json!({
            "name": "Foo",
            "_links": {},
            "_embedded": {"items": []}
        });
        strip_reserved(&mut document, true);
        assert_eq!(document, json!({"name": "Foo"}));
    }
}
