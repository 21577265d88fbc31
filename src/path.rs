//! URI decomposition.
//!
//! Paths follow the `resource/id/subresource/id/…` convention: after the base
//! URI, even positions name collections and odd positions select one element
//! of the preceding collection.
//!
//! ```text
//! /v1/products                  → resource "products"
//! /v1/products/123              → resource "products",        id "123"
//! /v1/products/123/images       → resource "products/images", id "123"
//! /v1/products/123/images/7     → resource "products/images", id "123", props ["7"]
//! ```

use thiserror::Error;

/// Result of resolving a request path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedPath {
    /// Collection names joined by `/`. Empty for the index.
    pub resource: String,
    pub id: Option<String>,
    /// Identifiers of nested elements, in path order, after `id`.
    pub subresource_properties: Vec<String>,
}

impl ParsedPath {
    /// Whether any identifier segment is present but empty, as in
    /// `/v1/products/` or `/v1/products/1/images/`.
    pub fn has_empty_identifier(&self) -> bool {
        self.id.as_deref() == Some("")
            || self.subresource_properties.iter().any(String::is_empty)
    }
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ResolveError {
    #[error("path does not start with the base URI")]
    BaseUriMismatch,
}

/// Splits `path` (without query string) into resource, id and subresource
/// properties.
pub fn resolve(path: &str, base_uri: &str) -> Result<ParsedPath, ResolveError> {
    let rest = strip_prefix_ignore_case(path, base_uri).ok_or(ResolveError::BaseUriMismatch)?;
    let rest = rest.strip_suffix(".json").unwrap_or(rest).to_lowercase();

    let mut segments = rest.split('/');
    // `split` always yields at least one item.
    let mut parsed = ParsedPath {
        resource: segments.next().unwrap_or_default().to_owned(),
        ..ParsedPath::default()
    };
    parsed.id = segments.next().map(str::to_owned);

    for (i, segment) in segments.enumerate() {
        if i % 2 == 0 {
            parsed.resource.push('/');
            parsed.resource.push_str(segment);
        } else {
            parsed.subresource_properties.push(segment.to_owned());
        }
    }
    Ok(parsed)
}

fn strip_prefix_ignore_case<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &path[prefix.len()..])
}
