//! Evidence extraction from a settled page.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;
use vigil_browser::location::network_location;
use vigil_browser::PageSession;

/// Cookie-banner selectors, checked in this order.
pub const COOKIE_BANNER_SELECTORS: [&str; 16] = [
    r#"[id*="cookie"]"#,
    r#"[class*="cookie"]"#,
    r#"[id*="consent"]"#,
    r#"[class*="consent"]"#,
    r#"[id*="gdpr"]"#,
    r#"[class*="gdpr"]"#,
    r#"[id*="privacy"]"#,
    r#"[class*="privacy"]"#,
    "#cookie-banner",
    ".cookie-banner",
    "#cookie-notice",
    ".cookie-notice",
    "#cookie-consent",
    ".cookie-consent",
    "#gdpr-banner",
    ".gdpr-banner",
];

/// Interval between banner checks while waiting for a late banner.
pub const BANNER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Network locations contacted that differ from the target's own.
///
/// Requests without a host (`data:`, `blob:`) never count.
#[must_use]
pub fn third_party_domains(target_url: &str, requests: &[String]) -> BTreeSet<String> {
    let own = network_location(target_url);
    requests
        .iter()
        .filter_map(|url| network_location(url))
        .filter(|location| Some(location) != own.as_ref())
        .collect()
}

/// Every catalogue selector that currently matches, in catalogue order.
///
/// A selector whose query fails is skipped.
pub async fn matching_banner_selectors(page: &dyn PageSession) -> Vec<String> {
    let mut found = Vec::new();
    for selector in COOKIE_BANNER_SELECTORS {
        match page.matches_selector(selector).await {
            Ok(true) => found.push(selector.to_string()),
            Ok(false) => {}
            Err(e) => debug!(selector, error = %e, "banner selector query failed"),
        }
    }
    found
}

/// Banner check that keeps polling for up to `grace` when nothing matches.
///
/// Polling never runs past `deadline`. An empty result is a valid negative.
pub async fn detect_cookie_banner(
    page: &dyn PageSession,
    grace: Duration,
    deadline: Instant,
) -> Vec<String> {
    let give_up = deadline.min(Instant::now() + grace);
    loop {
        let found = matching_banner_selectors(page).await;
        if !found.is_empty() {
            return found;
        }
        let now = Instant::now();
        if now >= give_up {
            return found;
        }
        tokio::time::sleep(BANNER_POLL_INTERVAL.min(give_up - now)).await;
    }
}
