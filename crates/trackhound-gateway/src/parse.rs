//! Content-tree construction from fetched pages.

use crate::error::{GatewayError, Result};
use crate::request::FetchedPage;
use scraper::Html;
use serde::de::DeserializeOwned;

/// Parse a page body into an HTML document tree.
///
/// The HTML parser itself is lenient, so a body is rejected only when it is
/// blank or contains no markup at all.
pub fn parse_html(page: &FetchedPage) -> Result<Html> {
    let body = page.body.trim();

    if body.is_empty() {
        return Err(GatewayError::Parse {
            url: page.url.clone(),
            reason: "empty document".to_string(),
        });
    }

    if !body.contains('<') {
        return Err(GatewayError::Parse {
            url: page.url.clone(),
            reason: "document contains no markup".to_string(),
        });
    }

    Ok(Html::parse_document(body))
}

/// Parse a page body as JSON.
pub fn parse_json<T: DeserializeOwned>(page: &FetchedPage) -> Result<T> {
    serde_json::from_str(&page.body).map_err(|source| GatewayError::Json {
        url: page.url.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://example.com".to_string(),
            status: 200,
            body: body.to_string(),
            from_cache: false,
        }
    }

    #[test]
    fn test_parse_html() {
        let document = parse_html(&page("<ul><li class=\"t\">Track A</li></ul>"))
            .expect("parse should succeed");
        let selector = Selector::parse("li.t").expect("valid selector");
        let text: String = document
            .select(&selector)
            .next()
            .expect("item present")
            .text()
            .collect();
        assert_eq!(text, "Track A");
    }

    #[test]
    fn test_parse_html_rejects_blank_and_plain_text() {
        assert!(matches!(
            parse_html(&page("   \n")),
            Err(GatewayError::Parse { .. })
        ));
        assert!(matches!(
            parse_html(&page("just some words")),
            Err(GatewayError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_json() {
        let value: serde_json::Value =
            parse_json(&page(r#"{"tracks": [1, 2]}"#)).expect("valid JSON");
        assert_eq!(value["tracks"].as_array().map(Vec::len), Some(2));

        let malformed: Result<serde_json::Value> = parse_json(&page("{\"tracks\": ["));
        assert!(matches!(malformed, Err(GatewayError::Json { .. })));
    }
}
