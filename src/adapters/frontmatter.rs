//! YAML front matter parsing for vault notes.
//!
//! Front matter format:
//! ```text
//! ---
//! title: Token refresh
//! tags: [auth, oauth]
//! ---
//! The actual note body here.
//! ```

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Inline `#tag` references in note bodies.
static INLINE_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([A-Za-z][\w/-]*)").ok());

/// Parsed front matter of one note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Every key of the YAML block, converted to JSON values.
    pub fields: Map<String, Value>,
}

impl FrontMatter {
    /// Returns the `title` field when it is a non-empty string.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.fields
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Returns the `tags` field, accepting a list or a comma/space separated string.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let raw: Vec<String> = match self.fields.get("tags") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|t| t.trim().trim_start_matches('#').to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Parser for YAML front matter in note content.
pub struct FrontMatterParser;

impl FrontMatterParser {
    /// The front matter delimiter.
    const DELIMITER: &'static str = "---";

    /// Parses YAML front matter from content.
    ///
    /// Returns the parsed front matter and the remaining body. Content
    /// without a leading delimiter has empty front matter.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, is not a mapping, or the
    /// closing delimiter is missing.
    pub fn parse(content: &str) -> Result<(FrontMatter, &str)> {
        let trimmed = content.trim_start();

        if !trimmed.starts_with(Self::DELIMITER) {
            return Ok((FrontMatter::default(), trimmed));
        }

        let after_first = &trimmed[Self::DELIMITER.len()..];
        let after_first = after_first.trim_start_matches(['\r', '\n']);

        let Some(end_pos) = after_first.find(Self::DELIMITER) else {
            return Err(Error::InvalidInput(
                "front matter missing closing delimiter".to_string(),
            ));
        };

        let yaml_content = after_first[..end_pos].trim();
        let body_start = end_pos + Self::DELIMITER.len();
        let body = after_first[body_start..].trim_start_matches(['\r', '\n']);

        if yaml_content.is_empty() {
            return Ok((FrontMatter::default(), body));
        }

        let value: Value = serde_yaml_ng::from_str(yaml_content)
            .map_err(|e| Error::InvalidInput(format!("invalid YAML front matter: {e}")))?;

        match value {
            Value::Object(fields) => Ok((FrontMatter { fields }, body)),
            Value::Null => Ok((FrontMatter::default(), body)),
            other => Err(Error::InvalidInput(format!(
                "front matter must be a mapping, got {other}"
            ))),
        }
    }

    /// Parses leniently: malformed front matter leaves the whole content as body.
    #[must_use]
    pub fn parse_lenient(content: &str) -> (FrontMatter, &str) {
        match Self::parse(content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed front matter");
                (FrontMatter::default(), content)
            },
        }
    }

    /// Collects `#tag` references from a note body, in order, without repeats.
    #[must_use]
    pub fn inline_tags(body: &str) -> Vec<String> {
        let Some(re) = INLINE_TAG.as_ref() else {
            return Vec::new();
        };
        let mut tags: Vec<String> = Vec::new();
        for caps in re.captures_iter(body) {
            if let Some(tag) = caps.get(1) {
                let tag = tag.as_str().to_string();
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_front_matter() {
        let content = "---\ntitle: Token refresh\ntags: [auth, oauth]\n---\nBody text";
        let (front, body) = FrontMatterParser::parse(content).unwrap();
        assert_eq!(front.title(), Some("Token refresh"));
        assert_eq!(front.tags(), vec!["auth".to_string(), "oauth".to_string()]);
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_parse_without_front_matter() {
        let (front, body) = FrontMatterParser::parse("Just a note").unwrap();
        assert!(front.fields.is_empty());
        assert_eq!(body, "Just a note");
    }

    #[test]
    fn test_string_tags() {
        let (front, _) = FrontMatterParser::parse("---\ntags: \"#rust, cli tools\"\n---\n").unwrap();
        assert_eq!(front.tags(), vec!["rust", "cli", "tools"]);
    }

    #[test]
    fn test_missing_closing_delimiter() {
        assert!(FrontMatterParser::parse("---\ntitle: x\nno end").is_err());
    }

    #[test]
    fn test_non_mapping_is_error() {
        assert!(FrontMatterParser::parse("---\n- a\n- b\n---\nbody").is_err());
    }

    #[test]
    fn test_lenient_keeps_content() {
        let content = "---\ntitle: [unclosed\n---\nbody";
        let (front, body) = FrontMatterParser::parse_lenient(content);
        assert!(front.fields.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_inline_tags() {
        let tags = FrontMatterParser::inline_tags("#project/ctx notes on #auth and #auth again, not a#tag");
        assert_eq!(tags, vec!["project/ctx".to_string(), "auth".to_string()]);
    }
}
