//! URL helpers shared by the browser and scanner crates.

use url::Url;

/// Network location of a URL: lowercased host plus the port when one is
/// written explicitly. `None` for URLs without a host (`data:`, `blob:`).
pub fn network_location(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Resolve a possibly relative reference against a document URL.
pub fn resolve_against(base: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(reference.trim()).ok().map(String::from)
}
