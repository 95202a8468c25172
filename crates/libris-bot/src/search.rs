//! Fallback full-text search over the library site.
//!
//! Invoked only when the knowledge base yields no confident answer. Result
//! rows are mapped through the same micro-format the knowledge base uses so
//! everything downstream formats uniformly.

use std::sync::Arc;

use tracing::warn;

use crate::card;
use crate::services::SiteSearch;
use crate::types::{ActionKind, CardFragment};

/// Adapter that turns site-search rows into card fragments.
pub struct FallbackSearch {
    search: Arc<dyn SiteSearch>,
    site_url: String,
    row_limit: usize,
}

impl FallbackSearch {
    pub fn new(search: Arc<dyn SiteSearch>, site_url: impl Into<String>, row_limit: usize) -> Self {
        Self {
            search,
            site_url: site_url.into(),
            row_limit,
        }
    }

    /// Run one query scoped to the configured site and map each row to a
    /// single-button open-url card. The title doubles as both the card label
    /// and the button label.
    ///
    /// Returns an empty sequence both for a genuine empty result set and for
    /// a transport failure. The failure is logged with an internal code so
    /// the two stay distinguishable in telemetry, while the user-visible
    /// outcome is identical.
    pub async fn run(&self, term: &str) -> Vec<CardFragment> {
        let hits = match self
            .search
            .search(term, &self.site_url, self.row_limit)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(
                    code = "search_unavailable",
                    error = %e,
                    "site search failed, treating as no results"
                );
                return Vec::new();
            }
        };

        let mut cards = Vec::with_capacity(hits.len());
        for hit in hits {
            let raw = format!(
                "{};{};{};{}",
                hit.title,
                hit.title,
                hit.url,
                card::action_token(ActionKind::OpenUrl)
            );
            match card::decode(&raw) {
                Ok(fragment) => cards.push(fragment),
                Err(e) => warn!(error = %e, title = %hit.title, "skipping malformed search row"),
            }
        }
        cards
    }
}
