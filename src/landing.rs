//! The playground page.
//!
//! The page is a single embedded template with one `{{snippet}}` slot. The
//! slot receives the shared snippet as JSON (or `null`), inside a
//! `<script type="application/json">` element read by the page script.

use thiserror::Error;

use crate::storage::Snippet;

const TEMPLATE: &str = include_str!("../templates/index.html");
const PLACEHOLDER: &str = "{{snippet}}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template has no snippet placeholder")]
    MissingPlaceholder,
    #[error("template has more than one snippet placeholder")]
    DuplicatePlaceholder,
}

/// A template split around its placeholder.
#[derive(Debug, Clone)]
pub struct LandingPage {
    head: String,
    tail: String,
}

impl LandingPage {
    /// Load the embedded template.
    pub fn load() -> Result<Self, TemplateError> {
        Self::parse(TEMPLATE)
    }

    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let (head, tail) = source
            .split_once(PLACEHOLDER)
            .ok_or(TemplateError::MissingPlaceholder)?;
        if tail.contains(PLACEHOLDER) {
            return Err(TemplateError::DuplicatePlaceholder);
        }
        Ok(Self {
            head: head.to_string(),
            tail: tail.to_string(),
        })
    }

    pub fn render(&self, snippet: Option<&Snippet>) -> String {
        let data = snippet
            .and_then(|snippet| serde_json::to_string(snippet).ok())
            .unwrap_or_else(|| "null".to_string());
        format!("{}{}{}", self.head, escape_for_script(&data), self.tail)
    }
}

/// Escape characters that could end the surrounding `<script>` element.
/// They only occur inside JSON strings, where `\uXXXX` is equivalent.
fn escape_for_script(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewSnippet, SnippetId};

    #[test]
    fn embedded_template_loads() {
        let page = LandingPage::load().unwrap();
        assert!(page.render(None).contains("null"));
    }

    #[test]
    fn placeholder_must_appear_once() {
        assert_eq!(
            LandingPage::parse("<html></html>").unwrap_err(),
            TemplateError::MissingPlaceholder
        );
        assert_eq!(
            LandingPage::parse("{{snippet}}{{snippet}}").unwrap_err(),
            TemplateError::DuplicatePlaceholder
        );
    }

    #[test]
    fn snippet_cannot_close_the_script() {
        let page = LandingPage::parse("<script>{{snippet}}</script>").unwrap();
        let new = NewSnippet::new("\"</script><b>\"".into(), None, None, Vec::new());
        let snippet = Snippet {
            id: SnippetId::derive(&new),
            query: new.query,
            json: None,
            http: None,
            options: Vec::new(),
            created_at: chrono::Utc::now(),
        };

        let html = page.render(Some(&snippet));
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains("\\u003c/script\\u003e"));
    }
}
