use serde::{Deserialize, Serialize};

/// Maps one fully-qualified queried name to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    #[serde(default)]
    pub id: u64,

    #[serde(alias = "from")]
    pub from_domain: String,

    #[serde(alias = "to")]
    pub to_domain: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RewriteRule {
    pub fn new(id: u64, from_domain: impl Into<String>, to_domain: impl Into<String>) -> Self {
        Self {
            id,
            from_domain: from_domain.into(),
            to_domain: to_domain.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Case-insensitive exact match on the queried name. A single trailing dot
    /// on either side is ignored.
    pub fn matches(&self, queried_name: &str) -> bool {
        self.enabled && normalize(&self.from_domain).eq_ignore_ascii_case(normalize(queried_name))
    }

    pub fn is_valid(&self) -> bool {
        !normalize(&self.from_domain).is_empty() && !normalize(&self.to_domain).is_empty()
    }
}

fn normalize(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_case_insensitive() {
        let rule = RewriteRule::new(1, "a.example", "b.example");
        assert!(rule.matches("A.Example"));
        assert!(rule.matches("a.example."));
        assert!(!rule.matches("sub.a.example"));
    }

    #[test]
    fn test_disabled_rule_never_matches() {
        let rule = RewriteRule::new(1, "a.example", "b.example").disabled();
        assert!(!rule.matches("a.example"));
    }

    #[test]
    fn test_is_valid() {
        assert!(RewriteRule::new(1, "a", "b").is_valid());
        assert!(!RewriteRule::new(1, " ", "b").is_valid());
        assert!(!RewriteRule::new(1, "a", ".").is_valid());
    }
}
