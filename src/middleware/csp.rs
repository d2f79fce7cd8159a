//! Structurally parsed Content-Security-Policy.
//!
//! The policy is held as an ordered list of `(directive, sources)` pairs and
//! mutated by directive key, never by substring search over the serialized
//! header value.

/// Parsed CSP: ordered directives with their source lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspPolicy {
    directives: Vec<(String, Vec<String>)>,
}

impl CspPolicy {
    /// Parse a serialized policy (`"default-src 'self'; img-src *"`).
    /// Empty segments are ignored; directive names are lower-cased.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let directives = raw
            .split(';')
            .filter_map(|segment| {
                let mut parts = segment.split_whitespace();
                let name = parts.next()?.to_lowercase();
                let sources = parts.map(str::to_string).collect();
                Some((name, sources))
            })
            .collect();
        Self { directives }
    }

    #[must_use]
    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|(n, _)| n == name)
    }

    /// Serialize the policy, appending a `style-src 'nonce-…'` directive when
    /// the policy carries no `style-src` of its own. The stored policy is not
    /// modified; the nonce is per-response.
    #[must_use]
    pub fn render_with_nonce(&self, nonce: &str) -> String {
        let mut rendered: Vec<String> = self
            .directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, sources.join(" "))
                }
            })
            .collect();
        if !self.has_directive("style-src") {
            rendered.push(format!("style-src 'nonce-{nonce}'"));
        }
        rendered.join("; ")
    }
}

impl Default for CspPolicy {
    fn default() -> Self {
        Self::parse("default-src 'self'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives_in_order() {
        let policy = CspPolicy::parse("default-src 'self'; img-src * data:");
        assert!(policy.has_directive("default-src"));
        assert!(policy.has_directive("img-src"));
        assert!(!policy.has_directive("style-src"));
    }

    #[test]
    fn style_src_free_policy_gains_nonce_directive() {
        let policy = CspPolicy::parse("default-src 'self'");
        let rendered = policy.render_with_nonce("abc123");
        assert_eq!(rendered, "default-src 'self'; style-src 'nonce-abc123'");
    }

    #[test]
    fn existing_style_src_is_left_alone() {
        let policy = CspPolicy::parse("default-src 'self'; style-src 'unsafe-inline'");
        let rendered = policy.render_with_nonce("abc123");
        assert_eq!(
            rendered,
            "default-src 'self'; style-src 'unsafe-inline'"
        );
    }

    #[test]
    fn ignores_empty_segments() {
        let policy = CspPolicy::parse("; default-src 'self';;");
        assert_eq!(policy, CspPolicy::parse("default-src 'self'"));
    }
}
