//! Deterministic fallback for model refusals.
//!
//! Occasionally the model apologizes and claims the crawl failed even though
//! a perfectly good result sits in the transcript. When the final text looks
//! like such a refusal and a tool payload exists, the reply is computed
//! directly from that payload instead: sitemap URLs that receive no internal
//! links.

use serde_json::Value;

/// Maximum number of orphan URLs listed in a fallback reply.
pub const MAX_FALLBACK_URLS: usize = 20;

/// Depth marker some crawler outputs use for pages reachable only via the
/// sitemap.
const SITEMAP_ONLY_DEPTH: u64 = 9999;

const REFUSAL_PHRASES: &[&str] = &[
    "i couldn't",
    "i could not",
    "i cannot",
    "i can't",
    "was not successful",
    "wasn't successful",
    "there was an error",
    "i failed",
    "i apologize",
    "i'm sorry",
    "i am sorry",
];

/// Heuristic: does this final text read like a refusal or apology?
pub fn looks_like_refusal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    REFUSAL_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Walk a dotted path into a JSON object, returning the first hit among the
/// given paths.
fn try_pick<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    for path in paths {
        let mut cursor = value;
        let mut found = true;
        for part in path.split('.') {
            match cursor.get(part) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            return Some(cursor);
        }
    }
    None
}

/// Sitemap URLs with no internal links, extracted from a crawl payload.
///
/// Prefers a precomputed report list; otherwise derives orphans from the
/// inventory (discovered via sitemap, or carrying the sitemap-only depth
/// marker). The result is duplicate-free and preserves first-seen order.
pub fn compute_sitemap_orphans(tool_json: &Value) -> Vec<String> {
    let direct = try_pick(
        tool_json,
        &[
            "output.report.sitemapOrphans",
            "output.report.orphansSitemap",
            "report.sitemapOrphans",
            "report.orphansSitemap",
        ],
    )
    .and_then(Value::as_array);

    if let Some(list) = direct {
        if !list.is_empty() {
            return dedup(
                list.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            );
        }
    }

    let inventory = try_pick(tool_json, &["output.inventory", "inventory"])
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut orphans = Vec::new();
    for item in &inventory {
        let url = item
            .get("normalizedUrl")
            .or_else(|| item.get("url"))
            .or_else(|| item.get("finalUrl"))
            .and_then(Value::as_str);
        let Some(url) = url else { continue };

        let from_sitemap = item.get("discoveredBy").and_then(Value::as_str) == Some("sitemap");
        let sitemap_depth = item.get("depth").and_then(Value::as_u64) == Some(SITEMAP_ONLY_DEPTH);
        if from_sitemap || sitemap_depth {
            orphans.push(url.to_string());
        }
    }
    dedup(orphans)
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Render the fallback reply for a set of orphan URLs.
pub fn render_fallback_reply(urls: &[String]) -> String {
    if urls.is_empty() {
        return "I did not find any sitemap URLs without internal links (based on the crawl data)."
            .to_string();
    }

    let shown = &urls[..urls.len().min(MAX_FALLBACK_URLS)];
    let mut lines = vec![
        "These sitemap URLs appear to receive no internal links (according to the crawl):"
            .to_string(),
    ];
    for url in shown {
        lines.push(format!("• {url}"));
    }
    let more = urls.len().saturating_sub(shown.len());
    if more > 0 {
        lines.push(format!("…and {more} more."));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn refusal_phrases_are_case_insensitive() {
        assert!(looks_like_refusal("I'm Sorry, the crawl did not work."));
        assert!(looks_like_refusal("Unfortunately there was an error."));
        assert!(!looks_like_refusal("Here are the 12 orphan URLs you asked for."));
    }

    #[test]
    fn prefers_precomputed_report_list() {
        let payload = json!({
            "output": {
                "report": { "sitemapOrphans": ["https://a.example/x", "https://a.example/y"] },
                "inventory": [
                    { "url": "https://a.example/other", "discoveredBy": "sitemap" }
                ]
            }
        });
        assert_eq!(
            compute_sitemap_orphans(&payload),
            vec!["https://a.example/x", "https://a.example/y"]
        );
    }

    #[test]
    fn empty_report_list_falls_through_to_inventory() {
        let payload = json!({
            "output": {
                "report": { "sitemapOrphans": [] },
                "inventory": [
                    { "url": "https://a.example/p", "discoveredBy": "sitemap" },
                    { "url": "https://a.example/q", "discoveredBy": "link", "depth": 1 }
                ]
            }
        });
        assert_eq!(compute_sitemap_orphans(&payload), vec!["https://a.example/p"]);
    }

    #[test]
    fn derives_orphans_from_inventory_markers() {
        let payload = json!({
            "inventory": [
                { "normalizedUrl": "https://a.example/1", "discoveredBy": "sitemap" },
                { "url": "https://a.example/2", "depth": 9999 },
                { "finalUrl": "https://a.example/3", "discoveredBy": "link", "depth": 2 },
                { "url": "https://a.example/1", "discoveredBy": "sitemap" }
            ]
        });
        // Duplicate-free, first-seen order.
        assert_eq!(
            compute_sitemap_orphans(&payload),
            vec!["https://a.example/1", "https://a.example/2"]
        );
    }

    #[test]
    fn missing_payload_paths_produce_no_orphans() {
        assert!(compute_sitemap_orphans(&json!({})).is_empty());
        assert!(compute_sitemap_orphans(&json!({ "text": "not json" })).is_empty());
    }

    #[test]
    fn fallback_reply_caps_listed_urls() {
        let urls: Vec<String> = (0..25).map(|i| format!("https://a.example/{i}")).collect();
        let reply = render_fallback_reply(&urls);
        assert_eq!(reply.matches('•').count(), MAX_FALLBACK_URLS);
        assert!(reply.ends_with("…and 5 more."));

        let empty = render_fallback_reply(&[]);
        assert!(empty.contains("did not find"));
    }
}
