//! Rotating request identities to avoid a fixed client signature.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Headers sent with every page request, matching what a real browser sends.
const COMMON_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Cache-Control", "max-age=0"),
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

/// Supplies the identity for the next outbound request. Pluggable so tests
/// can pin a deterministic identity.
pub trait IdentityProvider: Send + Sync {
    fn next_identity(&self) -> RequestIdentity;
}

/// Round-robins through a fixed pool of browser user agents with a realistic
/// header set.
pub struct RotatingIdentity {
    cursor: AtomicUsize,
}

impl RotatingIdentity {
    pub fn new() -> Self {
        RotatingIdentity {
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for RotatingIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for RotatingIdentity {
    fn next_identity(&self) -> RequestIdentity {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
        RequestIdentity {
            user_agent: USER_AGENTS[index].to_string(),
            headers: COMMON_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

/// Fixed identity for deterministic tests.
pub struct StaticIdentity {
    user_agent: String,
}

impl StaticIdentity {
    pub fn new(user_agent: &str) -> Self {
        StaticIdentity {
            user_agent: user_agent.to_string(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn next_identity(&self) -> RequestIdentity {
        RequestIdentity {
            user_agent: self.user_agent.clone(),
            headers: Vec::new(),
        }
    }
}
