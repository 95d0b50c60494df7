//! Encyclopedia lookup via the MediaWiki API.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{required_str, Tool, ToolError, NO_RESULTS};

const MAX_DOCS: usize = 2;
const MAX_DOC_CHARS: usize = 4000;

/// Search Wikipedia and return the article text of the best matches.
pub struct WikiSearch {
    api_url: String,
}

impl Default for WikiSearch {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    query: Option<PageQuery>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
}

impl WikiSearch {
    async fn search_titles(
        &self,
        client: &reqwest::Client,
        query: &str,
    ) -> Result<Vec<String>, ToolError> {
        let limit = MAX_DOCS.to_string();
        let response: SearchResponse = client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn fetch_page(
        &self,
        client: &reqwest::Client,
        title: &str,
    ) -> Result<Option<Page>, ToolError> {
        let response: PageResponse = client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "extracts|info"),
                ("inprop", "url"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.query.and_then(|q| q.pages.into_iter().next()))
    }
}

#[async_trait]
impl Tool for WikiSearch {
    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for a query and return at most 2 matching articles."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic or question to look up"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        tracing::debug!("wiki_search: {}", query);

        let client = reqwest::Client::builder()
            .user_agent("TaskAgent/1.0 (tool-augmented QA agent)")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let titles = self.search_titles(&client, query).await?;

        let mut documents = Vec::new();
        for title in titles {
            if let Some(page) = self.fetch_page(&client, &title).await? {
                documents.push(render_page(&page));
            }
        }

        if documents.is_empty() {
            Ok(NO_RESULTS.to_string())
        } else {
            Ok(documents.join("\n\n---\n\n"))
        }
    }
}

fn render_page(page: &Page) -> String {
    let body = page.extract.as_deref().unwrap_or("").trim();
    let body: String = body.chars().take(MAX_DOC_CHARS).collect();
    let url = page.fullurl.as_deref().unwrap_or("");
    format!("Title: {}\nURL: {}\n\n{}", page.title, url, body)
}
