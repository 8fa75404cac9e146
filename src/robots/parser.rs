//! Robots.txt rule set
//!
//! Matching is delegated to the robotstxt crate (a port of Google's parser).

use robotstxt::DefaultMatcher;

/// Parsed robots.txt rules for one domain
#[derive(Debug, Clone)]
pub struct RobotsRules {
    /// Raw robots.txt body (empty string means allow all)
    content: String,
    /// Installed when the file was missing or unreachable
    allow_all: bool,
}

impl RobotsRules {
    /// Creates a rule set from a robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive rule set that allows everything
    ///
    /// Installed whenever robots.txt answers with anything but 200 or cannot
    /// be fetched at all.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if this rule set was installed as the fail-open default
    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Checks if a URL is allowed for the given product token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check (e.g., "/page.html")
    /// * `agent` - Product token matched against `User-agent` lines
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }
}

/// Extracts the product token robots.txt groups are matched against
///
/// `SeineBot/1.0 (+https://example.invalid/bot)` becomes `SeineBot`.
pub fn product_token(user_agent: &str) -> String {
    let token: String = user_agent
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if token.is_empty() {
        "*".to_string()
    } else {
        token
    }
}
