//! Slack notification for posted reviews

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{Error, Result};

/// Longest TL;DR carried in a notification
pub const TLDR_MAX_LENGTH: usize = 300;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

static SUMMARY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^##\s+(?:Summary|TL;DR|TLDR|Overview)\s*$").expect("Invalid summary heading regex")
});

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("Invalid markdown link regex"));

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_`~]").expect("Invalid emphasis regex"));

/// Short plain-text summary of a review
///
/// Prefers the body of the first summary-like `##` section, else the first
/// line that is not blank, a heading, or an HTML comment. Empty when the
/// review has neither.
pub fn extract_tldr(output: &str, max_length: usize) -> String {
    let lines: Vec<&str> = output.split('\n').collect();

    for (i, line) in lines.iter().enumerate() {
        if !SUMMARY_HEADING.is_match(line.trim()) {
            continue;
        }
        let section: Vec<&str> = lines[i + 1..]
            .iter()
            .take_while(|l| !l.trim().starts_with("## "))
            .copied()
            .collect();
        let text = section.join("\n");
        let text = text.trim();
        if !text.is_empty() {
            return clean_and_truncate(text, max_length);
        }
    }

    lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("<!--") && !l.starts_with("-->"))
        .map(|l| clean_and_truncate(l, max_length))
        .unwrap_or_default()
}

fn clean_and_truncate(text: &str, max_length: usize) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    let text = EMPHASIS.replace_all(&text, "");
    let text = text.trim();

    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let head: String = text.chars().take(max_length).collect();
    let cut = match head.rfind(' ') {
        Some(idx) => &head[..idx],
        None => head.as_str(),
    };
    format!("{cut}...")
}

/// Slack block payload announcing a posted review
pub fn review_posted_blocks(
    repo: &str,
    pr_number: u64,
    title: &str,
    tldr: &str,
    comment_url: Option<&str>,
) -> Value {
    let pr_url = format!("https://github.com/{repo}/pull/{pr_number}");
    let mut blocks = vec![json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": format!(":mag: *Review posted: <{pr_url}|{title}>*\n`{repo}#{pr_number}`"),
        },
    })];

    if !tldr.is_empty() {
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*TL;DR:* {tldr}") },
        }));
    }

    if let Some(url) = comment_url {
        blocks.push(json!({
            "type": "actions",
            "elements": [{
                "type": "button",
                "text": { "type": "plain_text", "text": "View Review" },
                "url": url,
            }],
        }));
    }

    json!({ "blocks": blocks })
}

/// Posts review announcements to a Slack incoming webhook
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("webhook_url", &"[REDACTED]")
            .finish()
    }
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| Error::Remote(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }

    /// Announce a posted review; failures are logged, never returned
    pub async fn review_posted(
        &self,
        repo: &str,
        pr_number: u64,
        title: Option<&str>,
        review_output: &str,
        comment_url: Option<&str>,
    ) {
        match self.send(repo, pr_number, title, review_output, comment_url).await {
            Ok(()) => info!(repo, pr = pr_number, "Slack notification sent"),
            Err(e) => warn!(repo, pr = pr_number, error = %e, "Failed to send Slack notification"),
        }
    }

    async fn send(
        &self,
        repo: &str,
        pr_number: u64,
        title: Option<&str>,
        review_output: &str,
        comment_url: Option<&str>,
    ) -> Result<()> {
        let title = match title.filter(|t| !t.trim().is_empty()) {
            Some(t) => t.to_string(),
            None => format!("PR #{pr_number}"),
        };
        let tldr = extract_tldr(review_output, TLDR_MAX_LENGTH);
        let payload = review_posted_blocks(repo, pr_number, &title, &tldr, comment_url);

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Remote(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_tldr_from_summary_section() {
        let review = "# Review\n\n## Summary\nSolid change.\nMinor nits.\n\n## Details\nlots";
        assert_eq!(extract_tldr(review, 300), "Solid change.\nMinor nits.");
    }

    #[test]
    fn test_tldr_heading_is_case_insensitive() {
        for heading in ["## tl;dr", "## TLDR", "## overview  ", "##   SUMMARY"] {
            let review = format!("{heading}\nShort.\n## Next");
            assert_eq!(extract_tldr(&review, 300), "Short.", "heading {heading:?}");
        }
    }

    #[test]
    fn test_empty_summary_falls_through() {
        let review = "## Summary\n\n## Findings\nFirst real line";
        assert_eq!(extract_tldr(review, 300), "First real line");
    }

    #[test]
    fn test_tldr_falls_back_to_first_paragraph() {
        let review = "<!-- marker -->\n# Title\n\n  The **actual** text  \nmore";
        assert_eq!(extract_tldr(review, 300), "The actual text");
    }

    #[test]
    fn test_tldr_strips_links_and_emphasis() {
        let review = "## TL;DR\nSee [the docs](https://x.y/z) and `code` _here_ ~~there~~";
        assert_eq!(extract_tldr(review, 300), "See the docs and code here there");
    }

    #[test]
    fn test_tldr_truncates_on_word_boundary() {
        let review = format!("## Summary\n{}", "word ".repeat(100));
        let tldr = extract_tldr(&review, 300);
        assert!(tldr.ends_with("word..."));
        assert!(tldr.chars().count() <= 303);
    }

    #[test]
    fn test_tldr_empty_output() {
        assert_eq!(extract_tldr("", 300), "");
        assert_eq!(extract_tldr("# Only heading\n\n", 300), "");
    }

    #[test]
    fn test_blocks_include_optional_sections() {
        let full = review_posted_blocks("o/r", 5, "Fix it", "short", Some("https://c"));
        let blocks = full["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0]["text"]["text"],
            ":mag: *Review posted: <https://github.com/o/r/pull/5|Fix it>*\n`o/r#5`"
        );
        assert_eq!(blocks[1]["text"]["text"], "*TL;DR:* short");
        assert_eq!(blocks[2]["elements"][0]["url"], "https://c");

        let bare = review_posted_blocks("o/r", 5, "Fix it", "", None);
        assert_eq!(bare["blocks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_posted_sends_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({
                "blocks": [{ "type": "section", "text": { "type": "mrkdwn",
                    "text": ":mag: *Review posted: <https://github.com/o/r/pull/3|PR #3>*\n`o/r#3`" } }]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(format!("{}/hook", server.uri())).unwrap();
        notifier.review_posted("o/r", 3, None, "", None).await;
    }

    #[tokio::test]
    async fn test_webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(server.uri()).unwrap();
        notifier.review_posted("o/r", 3, Some("T"), "body", Some("u")).await;
    }
}
