//! Placeholder postings for when every real source comes back empty.
//!
//! Output is deterministic and always tagged `synthetic`, so callers can
//! show it as a placeholder without ever storing it.

use super::{ProviderResult, SearchQuery};

/// Upper bound on generated placeholders regardless of the query limit.
pub const MAX_SAMPLES: usize = 15;

/// Provenance tag carried by every placeholder.
pub const SAMPLE_PLATFORM: &str = "sample";

const COMPANIES: &[&str] = &[
    "Northwind Labs",
    "Contoso",
    "Fabrikam",
    "Initech",
    "Globex",
    "Umbrella Systems",
    "Hooli",
    "Vandelay Industries",
    "Tyrell Analytics",
    "Wayne Digital",
];

const TITLE_PATTERNS: &[(&str, &str)] = &[
    ("", ""),
    ("Senior ", ""),
    ("Lead ", ""),
    ("Principal ", ""),
    ("Staff ", ""),
    ("Senior ", " (Remote)"),
    ("Lead ", " (Hybrid)"),
    ("", " (Contract)"),
];

const EXTRA_LOCATIONS: &[&str] = &["Remote", "Hybrid", "San Francisco, CA", "Austin, TX"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleGenerator;

impl SampleGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produces at most `min(query.limit, MAX_SAMPLES)` placeholders.
    pub fn generate(&self, query: &SearchQuery) -> Vec<ProviderResult> {
        let count = (query.limit as usize).min(MAX_SAMPLES);
        let role = query.role.trim();

        (0..count)
            .map(|i| {
                let company = COMPANIES[i % COMPANIES.len()];
                let (prefix, suffix) = TITLE_PATTERNS[i % TITLE_PATTERNS.len()];
                // Every other placeholder uses the requested location.
                let location = if i % 2 == 0 {
                    query.location.trim()
                } else {
                    EXTRA_LOCATIONS[(i / 2) % EXTRA_LOCATIONS.len()]
                };
                let slug: String = company
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();

                ProviderResult {
                    title: format!("{prefix}{role}{suffix}"),
                    company: company.to_string(),
                    location: location.to_string(),
                    description: format!(
                        "{company} is looking for a {role} to join its team. Placeholder listing, not a real posting."
                    ),
                    source_url: format!("https://{slug}.example.com/jobs/{}", i + 1),
                    platform: SAMPLE_PLATFORM.to_string(),
                    synthetic: true,
                }
            })
            .collect()
    }
}
