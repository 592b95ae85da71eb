//! Maps untyped provider records onto [`CanonicalItem`].
//!
//! Every canonical field is resolved from an ordered alias list; the first alias holding a
//! usable value wins. Records without a URL are dropped and URLs are unique per pass.

use primesearch_core::{CanonicalItem, UntypedRecord};
use serde_json::Value;
use std::collections::HashSet;

/// Evaluate `accessors` in order and return the first value produced.
pub fn first_defined<R: ?Sized, T, F>(
    record: &R,
    accessors: impl IntoIterator<Item = F>,
) -> Option<T>
where
    F: Fn(&R) -> Option<T>,
{
    accessors.into_iter().find_map(|f| f(record))
}

/// Ordered field-name aliases for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct Aliases(pub &'static [&'static str]);

impl Aliases {
    /// First alias holding a non-blank string.
    pub fn text(&self, record: &UntypedRecord) -> Option<String> {
        first_defined(record, self.0.iter().map(|k| move |r: &UntypedRecord| text_at(r, k)))
    }

    /// First alias holding any non-null value, carried verbatim.
    pub fn value(&self, record: &UntypedRecord) -> Option<Value> {
        first_defined(
            record,
            self.0
                .iter()
                .map(|k| move |r: &UntypedRecord| r.get(*k).filter(|v| !v.is_null()).cloned()),
        )
    }
}

fn text_at(record: &UntypedRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

pub const URL: Aliases = Aliases(&["link", "url", "href", "sourceUrl"]);
pub const TITLE: Aliases = Aliases(&["title", "name", "page_title"]);
pub const SUMMARY: Aliases = Aliases(&["content", "summary", "description"]);
pub const ICON: Aliases = Aliases(&["icon", "favicon"]);
pub const SITE_NAME: Aliases = Aliases(&["website", "site", "siteName"]);
pub const PUBLISHED_AT: Aliases = Aliases(&["publish_date", "published_at", "date"]);
const MEDIA: Aliases = Aliases(&["media"]);
const REFER: Aliases = Aliases(&["refer"]);

/// Normalise records, preserving first-seen URL order. Non-object records are skipped.
pub fn normalize(records: &[Value]) -> Vec<CanonicalItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for record in records {
        let Some(obj) = record.as_object() else {
            continue;
        };
        let Some(url) = URL.text(obj) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        out.push(CanonicalItem {
            title: TITLE.text(obj).unwrap_or_else(|| url.clone()),
            url,
            summary: SUMMARY.text(obj),
            icon: ICON.text(obj),
            site_name: SITE_NAME.text(obj),
            media: MEDIA.value(obj),
            published_at: PUBLISHED_AT.text(obj),
            refer: REFER.value(obj),
            raw: obj.clone(),
        });
    }
    out
}
