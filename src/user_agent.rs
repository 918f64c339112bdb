//! The User-Agent sent with every API and asset request.
//!
//! Fandom asks bots to identify themselves with a contact URL.

/// Project URL included in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/fierce/fandom-dl";

/// Default User-Agent, e.g. `fandom-dl/0.1.0 (wiki-archiver; +https://...)`.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("fandom-dl/{version} (wiki-archiver; +{PROJECT_UA_URL})")
}
