//! Delivery-info source extraction.
//!
//! The platform answers delivery requests in several shapes depending on
//! scenario and API generation. Every recognized shape is read in a fixed
//! order and the results are unioned; the first occurrence of a url wins.

use std::collections::HashSet;

use serde_json::Value;

use super::source::SourceDescriptor;

/// Normalize a delivery-info body into an ordered, url-unique source list.
///
/// Never fails: unknown or malformed input yields an empty list.
pub fn extract_sources(body: &Value) -> Vec<SourceDescriptor> {
    let mut out = Collector::default();

    if let Some(cdns) = body.get("cdns").and_then(Value::as_object) {
        for channel in cdns.values() {
            extract_channel(channel, &mut out);
        }
    }

    if let Some(items) = body.get("items").and_then(Value::as_array) {
        for item in items {
            extract_item(item, None, &mut out);
        }
    }

    if let Some(groups) = body.get("groups").and_then(Value::as_array) {
        for group in groups {
            extract_group(group, &mut out);
        }
    }

    if let Some(url) = str_field(body, "url") {
        out.push(
            url,
            str_field(body, "quality"),
            mime_of(body),
            height_of(body),
        );
    }

    if let Some(sources) = body.get("sources").and_then(Value::as_array) {
        for source in sources {
            push_entry(source, str_field(source, "quality"), &mut out);
        }
    }

    out.sources
}

#[derive(Default)]
struct Collector {
    sources: Vec<SourceDescriptor>,
    seen: HashSet<String>,
}

impl Collector {
    fn push(&mut self, url: &str, quality: Option<&str>, mime: Option<&str>, height: Option<u32>) {
        let Some(source) = SourceDescriptor::new(url, quality, mime) else {
            return;
        };
        if self.seen.insert(source.url.clone()) {
            self.sources.push(source.with_height(height));
        }
    }
}

fn extract_channel(channel: &Value, out: &mut Collector) {
    let channel_name = str_field(channel, "name");
    let items = ["items", "flavors", "streams"]
        .iter()
        .find_map(|k| channel.get(*k).and_then(Value::as_array));
    for item in items.into_iter().flatten() {
        extract_item(item, channel_name, out);
        if let Some(playlist) = str_field(item, "playlist") {
            // Type is inferred from the playlist url, not the item's own mime.
            let quality = str_field(item, "quality").or(Some("playlist"));
            out.push(playlist, quality, None, None);
        }
    }
}

/// An item's own url takes `quality`, then `name`, then the channel name.
/// Nested `sources` entries only ever carry their own `quality`.
fn extract_item(item: &Value, channel_name: Option<&str>, out: &mut Collector) {
    let quality = str_field(item, "quality")
        .or_else(|| str_field(item, "name"))
        .or(channel_name);
    push_entry(item, quality, out);
    if let Some(sources) = item.get("sources").and_then(Value::as_array) {
        for source in sources {
            push_entry(source, str_field(source, "quality"), out);
        }
    }
}

/// A single `{url, mimeType|type, height}` entry under the given quality.
fn push_entry(entry: &Value, quality: Option<&str>, out: &mut Collector) {
    if let Some(url) = str_field(entry, "url") {
        out.push(url, quality, mime_of(entry), height_of(entry));
    }
}

fn extract_group(group: &Value, out: &mut Collector) {
    let origin = group
        .get("origins")
        .and_then(Value::as_array)
        .and_then(|o| o.first())
        .and_then(|o| str_field(o, "url"))
        .unwrap_or("");

    let Some(variants) = group.get("variants").and_then(Value::as_array) else {
        return;
    };
    for variant in variants {
        if variant.get("enabled").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        let Some(path) = str_field(variant, "url") else {
            continue;
        };
        let url = format!("{origin}{path}");
        let quality = str_field(variant, "label").or_else(|| str_field(variant, "name"));
        out.push(&url, quality, mime_of(variant), height_of(variant));
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn mime_of(value: &Value) -> Option<&str> {
    str_field(value, "mimeType").or_else(|| str_field(value, "type"))
}

fn height_of(value: &Value) -> Option<u32> {
    let candidates = [
        value.get("height"),
        value.get("res").and_then(|r| r.get("height")),
        value
            .get("meta")
            .and_then(|m| m.get("video"))
            .and_then(|v| v.get("height")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_u64)
        .and_then(|h| u32::try_from(h).ok())
        .filter(|h| *h > 0)
}
