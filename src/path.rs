use chrono::{DateTime, Utc};

use crate::validate::MediaCategory;

/// Derive a collision-resistant, owner-scoped object key:
/// `<owner>/<category>/<stem>-<millis>-<token>.<ext>`. The timestamp plus
/// random token makes collisions vanishingly unlikely; the owner prefix is
/// what the authorization check keys on.
pub fn allocate(owner_id: &str, category: MediaCategory, original_name: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    allocate_at(owner_id, category, original_name, Utc::now(), &token[..12])
}

/// Deterministic core of [`allocate`], split out so tests can pin the
/// timestamp and token.
pub fn allocate_at(
    owner_id: &str,
    category: MediaCategory,
    original_name: &str,
    at: DateTime<Utc>,
    token: &str,
) -> String {
    let (stem, ext) = split_name(original_name);
    let stem = sanitize(stem);
    let millis = at.timestamp_millis();

    match ext {
        Some(ext) => format!(
            "{owner_id}/{}/{stem}-{millis}-{token}.{}",
            category.as_str(),
            sanitize(ext)
        ),
        None => format!("{owner_id}/{}/{stem}-{millis}-{token}", category.as_str()),
    }
}

/// Whether `path` falls under `owner_id`'s prefix. Exact first-segment
/// match: owner "abc" must not pass for "abcdef/...".
pub fn is_owned_by(path: &str, owner_id: &str) -> bool {
    if owner_id.is_empty() {
        return false;
    }
    match path.split_once('/') {
        Some((first, rest)) => first == owner_id && !rest.is_empty(),
        None => false,
    }
}

/// Whether a folder prefix falls under `owner_id`. Accepts both
/// `owner/sub` and `owner/sub/` forms.
pub fn prefix_owned_by(prefix: &str, owner_id: &str) -> bool {
    is_owned_by(prefix.trim_end_matches('/'), owner_id)
        || prefix.trim_end_matches('/') == owner_id
}

/// Folder prefixes always carry a trailing slash so that `a/raw` cannot
/// match `a/rawx/...` (and a bare owner id cannot match another owner
/// sharing it as a prefix).
pub fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
