//! Academic paper lookup via the arXiv Atom API.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use super::{html_decode, required_str, Tool, ToolError, NO_RESULTS};

const MAX_PAPERS: usize = 2;

/// Search arXiv and return metadata and abstracts of the best matches.
pub struct ArxivSearch {
    api_url: String,
}

impl Default for ArxivSearch {
    fn default() -> Self {
        Self {
            api_url: "https://export.arxiv.org/api/query".to_string(),
        }
    }
}

#[async_trait]
impl Tool for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv_search"
    }

    fn description(&self) -> &str {
        "Search arXiv for a query and return at most 2 papers with authors, date and abstract."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Paper title, topic or keywords"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        tracing::debug!("arxiv_search: {}", query);

        let client = reqwest::Client::builder()
            .user_agent("TaskAgent/1.0")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let search_query = format!("all:{}", query);
        let max_results = MAX_PAPERS.to_string();
        let feed = client
            .get(&self.api_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let papers = parse_feed(&feed);
        if papers.is_empty() {
            Ok(NO_RESULTS.to_string())
        } else {
            Ok(papers
                .iter()
                .take(MAX_PAPERS)
                .map(Paper::render)
                .collect::<Vec<_>>()
                .join("\n\n---\n\n"))
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Paper {
    id: String,
    title: String,
    authors: Vec<String>,
    published: String,
    summary: String,
}

impl Paper {
    fn render(&self) -> String {
        format!(
            "Title: {}\nAuthors: {}\nPublished: {}\nURL: {}\n\n{}",
            self.title,
            self.authors.join(", "),
            self.published,
            self.id,
            self.summary
        )
    }
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"))
}

fn author_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid regex")
    })
}

fn parse_feed(feed: &str) -> Vec<Paper> {
    entry_re()
        .captures_iter(feed)
        .filter_map(|cap| {
            let entry = cap.get(1)?.as_str();
            let title = tag_text(entry, "title")?;
            Some(Paper {
                id: tag_text(entry, "id").unwrap_or_default(),
                title,
                authors: author_re()
                    .captures_iter(entry)
                    .filter_map(|a| a.get(1).map(|m| collapse_ws(m.as_str())))
                    .collect(),
                published: tag_text(entry, "published")
                    .map(|p| p.chars().take(10).collect())
                    .unwrap_or_default(),
                summary: tag_text(entry, "summary").unwrap_or_default(),
            })
        })
        .collect()
}

/// Text content of the first `<tag>...</tag>` element, whitespace-collapsed.
fn tag_text(entry: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let start = entry.find(&open)?;
    let body_start = start + entry[start..].find('>')? + 1;
    let end = body_start + entry[body_start..].find(&close)?;
    Some(collapse_ws(&html_decode(&entry[body_start..end])))
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models &amp; more.
    </summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2000.00001v1</id>
    <published>2020-01-01T00:00:00Z</published>
    <title>Second Paper</title>
    <summary>Short.</summary>
    <author><name>A. Author</name></author>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_but_not_feed_title() {
        let papers = parse_feed(FEED);
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Attention Is All You Need");
        assert_eq!(papers[0].authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(papers[0].published, "2017-06-12");
        assert_eq!(papers[0].summary, "The dominant sequence transduction models & more.");
        assert_eq!(papers[1].authors, vec!["A. Author"]);
    }

    #[test]
    fn render_includes_metadata() {
        let rendered = parse_feed(FEED)[1].render();
        assert_eq!(
            rendered,
            "Title: Second Paper\nAuthors: A. Author\nPublished: 2020-01-01\nURL: http://arxiv.org/abs/2000.00001v1\n\nShort."
        );
    }

    #[test]
    fn empty_feed_has_no_papers() {
        assert!(parse_feed("<feed></feed>").is_empty());
    }
}
