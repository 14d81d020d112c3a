//! Web search through the DuckDuckGo HTML endpoint

use anyhow::{Context, Result};
use async_trait::async_trait;
use llm_core::with_retry;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

use super::http_client;
use crate::tools::{truncate_output, Tool, ToolContext};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Results returned per query
const MAX_RESULTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

/// Searches the web and lists the top hits
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current events or facts. Input is a search query; output is titles, URLs and snippets."
    }

    #[instrument(skip(self, ctx), fields(tool = "web_search"))]
    async fn invoke(&self, input: &str, ctx: &ToolContext) -> Result<String> {
        let query = input.trim().trim_matches('"').trim();
        if query.is_empty() {
            anyhow::bail!("Empty search query");
        }
        let timeout = Duration::from_secs(ctx.http_timeout_secs);

        let page = with_retry(&ctx.retry, "web_search", || async {
            let response = http_client()
                .get(SEARCH_ENDPOINT)
                .query(&[("q", query)])
                .timeout(timeout)
                .send()
                .await
                .context("Search request failed")?
                .error_for_status()?;
            response
                .text()
                .await
                .context("Failed to read search response")
        })
        .await?;

        let hits = parse_hits(&page, MAX_RESULTS);
        debug!(hits = hits.len(), "Search finished");
        if hits.is_empty() {
            return Ok(format!("No results found for: {}", query));
        }

        Ok(truncate_output(render_hits(query, &hits), ctx.max_output_len))
    }
}

fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    let mut out = format!("Search results for '{}':\n", query);
    for (rank, hit) in hits.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   {}\n", rank + 1, hit.title, hit.url));
        if !hit.snippet.is_empty() {
            out.push_str(&format!("   {}\n", hit.snippet));
        }
    }
    out
}

/// Result links go through a `/l/?uddg=<target>` redirect
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

fn squashed_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hits(page: &str, limit: usize) -> Vec<SearchHit> {
    let (Ok(result), Ok(link), Ok(snippet)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    Html::parse_document(page)
        .select(&result)
        .filter_map(|block| {
            let anchor = block.select(&link).next()?;
            let title = squashed_text(anchor);
            let url = resolve_link(anchor.value().attr("href")?);
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let snippet = block.select(&snippet).next().map(squashed_text).unwrap_or_default();
            Some(SearchHit { title, url, snippet })
        })
        .take(limit)
        .collect()
}
