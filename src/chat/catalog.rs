//! Tool catalog offered to the reasoning model.
//!
//! The model sees underscore names (`crawl_site`); the worker registers
//! dotted names (`crawl.site`). The mapping is explicit and closed: a
//! catalog entry without a worker-side mapping is a configuration bug and
//! must fail loudly instead of passing the public name through.

use serde_json::json;

use crate::model::ToolSpec;

/// Public name of the crawl tool.
pub const CRAWL_SITE: &str = "crawl_site";

/// Public name of the audit tool.
pub const AUDIT_INDEXABILITY: &str = "audit_indexability";

/// Map a public tool name to its worker-side name.
pub fn internal_name(public: &str) -> Option<&'static str> {
    match public {
        CRAWL_SITE => Some("crawl.site"),
        AUDIT_INDEXABILITY => Some("audit.indexability"),
        _ => None,
    }
}

/// Specs for every tool the orchestrator offers the model.
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: CRAWL_SITE.to_string(),
            description: "Discovers internal URLs respecting robots.txt and sitemaps. \
                          Returns inventory, edges, stats and SEO reports."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "startUrl": { "type": "string", "format": "uri" },
                    "depth": { "type": "integer", "minimum": 0, "maximum": 6 },
                    "maxPages": { "type": "integer", "minimum": 1, "maximum": 5000 },
                    "includeSubdomains": { "type": "boolean" },
                    "userAgent": { "type": "string" }
                },
                "required": ["startUrl"],
                "additionalProperties": false
            }),
        },
        ToolSpec {
            name: AUDIT_INDEXABILITY.to_string(),
            description: "Audits indexability: status, canonical, meta/X-Robots noindex, \
                          hreflang, per-URL issues."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": { "type": "string", "format": "uri" },
                        "minItems": 1,
                        "maxItems": 200
                    },
                    "userAgent": { "type": "string" }
                },
                "required": ["urls"],
                "additionalProperties": false
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_entry_has_a_worker_mapping() {
        for spec in specs() {
            assert!(
                internal_name(&spec.name).is_some(),
                "catalog entry '{}' has no worker-side name",
                spec.name
            );
        }
    }

    #[test]
    fn unknown_names_do_not_pass_through() {
        assert_eq!(internal_name("rm_rf"), None);
        assert_eq!(internal_name("crawl.site"), None);
    }
}
