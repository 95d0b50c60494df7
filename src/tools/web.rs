//! Web search via the DuckDuckGo HTML endpoint.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{html_decode, required_str, Tool, ToolError, NO_RESULTS};

const MAX_RESULTS: usize = 5;

/// Search the web (no API key needed).
pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns result titles, snippets and URLs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        let limit = args["num_results"]
            .as_u64()
            .map(|n| (n as usize).clamp(1, MAX_RESULTS))
            .unwrap_or(MAX_RESULTS);

        tracing::debug!("web_search: {}", query);

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );

        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; TaskAgent/1.0)")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let response = client.get(&url).send().await?.error_for_status()?;
        let html = response.text().await?;

        let results = extract_ddg_results(&html, limit);

        if results.is_empty() {
            Ok(NO_RESULTS.to_string())
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, limit: usize) -> Vec<String> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() >= limit {
            break;
        }

        let title = field_text(chunk, "class=\"result__a\"").unwrap_or("");
        let snippet = field_text(chunk, "class=\"result__snippet\"").unwrap_or("No snippet");
        let url = field_text(chunk, "class=\"result__url\"")
            .map(str::trim)
            .unwrap_or("");

        if !title.is_empty() {
            results.push(format!(
                "**{}**\n{}\nURL: {}",
                html_decode(title),
                html_decode(snippet),
                url
            ));
        }
    }

    results
}

/// Text of the first element carrying `marker`, up to the next tag.
fn field_text<'a>(chunk: &'a str, marker: &str) -> Option<&'a str> {
    chunk
        .split(marker)
        .nth(1)
        .and_then(|s| s.split('>').nth(1))
        .and_then(|s| s.split('<').next())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links"><div class="result__body">
  <a class="result__a" href="https://a.example">Rust &amp; Cargo</a>
  <a class="result__snippet" href="x">A language empowering everyone</a>
  <a class="result__url" href="x"> rust-lang.org </a>
</div></div>
<div class="result"><div class="result__body">
  <a class="result__a" href="https://b.example">Second</a>
  <a class="result__url" href="x">b.example</a>
</div></div>
"#;

    #[test]
    fn extracts_title_snippet_and_url() {
        let results = extract_ddg_results(PAGE, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            "**Rust & Cargo**\nA language empowering everyone\nURL: rust-lang.org"
        );
    }

    #[test]
    fn missing_snippet_gets_placeholder() {
        let results = extract_ddg_results(PAGE, 5);
        assert!(results[1].contains("No snippet"));
    }

    #[test]
    fn honours_limit() {
        assert_eq!(extract_ddg_results(PAGE, 1).len(), 1);
    }

    #[test]
    fn page_without_results_is_empty() {
        assert!(extract_ddg_results("<html>nothing</html>", 5).is_empty());
    }
}
