//! Document normalization: raw archive bytes → [`RawDocument`].
//!
//! Each archive entry is decoded as UTF-8 (invalid byte sequences are
//! dropped, never fatal), split into a frontmatter block and a body, and
//! tagged with its repository-relative path.
//!
//! # Frontmatter
//!
//! | Fence | Format | Parser |
//! |-------|--------|--------|
//! | `---` | YAML | `serde_yaml` |
//! | `+++` | TOML | `toml` |
//!
//! A file without an opening fence, or with an opening fence that is never
//! closed, has no metadata and its whole text is the body. Empty or
//! non-mapping frontmatter yields empty metadata. Frontmatter that fails to
//! parse is a [`CoreError::Parse`]; batch callers skip that file.

use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::models::{is_reserved, Metadata, RawDocument};

const YAML_FENCE: &str = "---";
const TOML_FENCE: &str = "+++";

/// Normalize one archive entry into a document.
pub fn normalize(entry_path: &str, bytes: &[u8]) -> Result<RawDocument> {
    let text = decode_text(bytes);
    let (metadata, body) = split_frontmatter(&text).map_err(|reason| CoreError::Parse {
        path: entry_path.to_string(),
        reason,
    })?;

    let mut doc = RawDocument::new(strip_archive_root(entry_path), body);
    doc.metadata = metadata
        .into_iter()
        .filter(|(key, _)| !is_reserved(key))
        .collect();
    Ok(doc)
}

/// Decode UTF-8, skipping invalid byte sequences and a leading BOM.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    match out.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => out,
    }
}

/// Remove the synthetic top-level folder that archive downloads add.
///
/// `"faq-main/data-engineering/README.md"` → `"data-engineering/README.md"`.
/// A path without a `/` is returned unchanged.
pub fn strip_archive_root(path: &str) -> &str {
    path.split_once('/').map_or(path, |(_, rest)| rest)
}

/// Split `text` into frontmatter metadata and a trimmed body.
pub fn split_frontmatter(text: &str) -> std::result::Result<(Metadata, &str), String> {
    let text = text.trim();

    let Some((fence, block, body)) = find_block(text) else {
        return Ok((Metadata::new(), text));
    };

    let metadata = match fence {
        YAML_FENCE => parse_yaml(block)?,
        _ => parse_toml(block)?,
    };
    Ok((metadata, body.trim()))
}

/// Locate a fenced block at the very start of `text`.
///
/// Returns `(fence, block, rest)` or `None` when the text does not open
/// with a fence or the fence is never closed.
fn find_block(text: &str) -> Option<(&'static str, &str, &str)> {
    let first_line_end = text.find('\n').unwrap_or(text.len());
    let fence = match text[..first_line_end].trim_end() {
        YAML_FENCE => YAML_FENCE,
        TOML_FENCE => TOML_FENCE,
        _ => return None,
    };

    let block_start = (first_line_end + 1).min(text.len());
    let mut offset = block_start;
    for line in text[block_start..].split_inclusive('\n') {
        if line.trim_end() == fence {
            let block = &text[block_start..offset];
            let rest = &text[offset + line.len()..];
            return Some((fence, block, rest));
        }
        offset += line.len();
    }
    None
}

fn parse_yaml(block: &str) -> std::result::Result<Metadata, String> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|e| format!("invalid YAML frontmatter: {e}"))?;

    let serde_yaml::Value::Mapping(mapping) = value else {
        return Ok(Metadata::new());
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => return Err(format!("unsupported frontmatter key: {other:?}")),
        };
        let value = serde_json::to_value(&value)
            .map_err(|e| format!("unsupported frontmatter value for '{key}': {e}"))?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

fn parse_toml(block: &str) -> std::result::Result<Metadata, String> {
    let table: toml::Table = block
        .parse()
        .map_err(|e| format!("invalid TOML frontmatter: {e}"))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_archive_root() {
        assert_eq!(
            strip_archive_root("faq-main/data-engineering/README.md"),
            "data-engineering/README.md"
        );
        assert_eq!(strip_archive_root("README.md"), "README.md");
    }

    #[test]
    fn normalizes_yaml_frontmatter() {
        let raw = b"---\nid: 9e508f2212\nquestion: 'Course: When does it start?'\nsort_order: 1\n---\n\nThe course starts in January.\n";
        let doc = normalize("faq-main/data-engineering/001.md", raw).unwrap();
        assert_eq!(doc.filename, "data-engineering/001.md");
        assert_eq!(doc.content, "The course starts in January.");
        assert_eq!(doc.metadata["id"], json!("9e508f2212"));
        assert_eq!(doc.metadata["question"], json!("Course: When does it start?"));
        assert_eq!(doc.metadata["sort_order"], json!(1));
    }

    #[test]
    fn normalizes_toml_frontmatter() {
        let raw = b"+++\ntitle = \"Setup\"\ndate = 2024-01-15\ntags = [\"docker\", \"gcp\"]\n+++\nInstall docker.";
        let doc = normalize("repo-main/setup.md", raw).unwrap();
        assert_eq!(doc.metadata["title"], json!("Setup"));
        assert_eq!(doc.metadata["date"], json!("2024-01-15"));
        assert_eq!(doc.metadata["tags"], json!(["docker", "gcp"]));
        assert_eq!(doc.content, "Install docker.");
    }

    #[test]
    fn no_frontmatter_whole_text_is_body() {
        let doc = normalize("repo-main/README.md", b"\n# Title\n\nSome text.\n").unwrap();
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.content, "# Title\n\nSome text.");
    }

    #[test]
    fn unclosed_fence_is_plain_text() {
        let (metadata, body) = split_frontmatter("---\ntitle: x\nno closing fence").unwrap();
        assert!(metadata.is_empty());
        assert!(body.starts_with("---"));
    }

    #[test]
    fn empty_frontmatter_yields_empty_metadata() {
        let (metadata, body) = split_frontmatter("---\n---\nbody").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = normalize("repo-main/bad.md", b"---\ntitle: [unclosed\n---\nbody").unwrap_err();
        match err {
            CoreError::Parse { path, .. } => assert_eq!(path, "repo-main/bad.md"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let mut raw = b"caf".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice("é ok".as_bytes());
        let doc = normalize("repo-main/a.md", &raw).unwrap();
        assert_eq!(doc.content, "café ok");
    }

    #[test]
    fn bom_and_crlf_fences_are_handled() {
        let raw = "\u{feff}---\r\ntitle: Windows\r\n---\r\nbody\r\n";
        let doc = normalize("repo-main/win.md", raw.as_bytes()).unwrap();
        assert_eq!(doc.metadata["title"], json!("Windows"));
        assert_eq!(doc.content, "body");
    }

    #[test]
    fn reserved_keys_do_not_shadow_fields() {
        let raw = b"---\ncontent: shadow\nfilename: other.md\nstart: 5\n---\nreal body";
        let doc = normalize("repo-main/a.md", raw).unwrap();
        assert_eq!(doc.content, "real body");
        assert_eq!(doc.filename, "a.md");
        assert!(doc.metadata.is_empty());
    }
}
