//! 请求屏蔽策略
//!
//! 自动浏览时丢弃第三方统计、字体等请求，减少噪音和等待时间。

use regex::Regex;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ResourceBlocker {
    patterns: Vec<Regex>,
}

impl ResourceBlocker {
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// 任意规则命中即拒绝
    pub fn allows(&self, url: &str) -> bool {
        !self.patterns.iter().any(|p| p.is_match(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_denylist() {
        let blocker = ResourceBlocker::new(["google", "gstatic"]).unwrap();
        assert!(!blocker.allows("https://www.google-analytics.com/analytics.js"));
        assert!(!blocker.allows("https://fonts.gstatic.com/s/roboto.woff2"));
        assert!(!blocker.allows("https://fonts.googleapis.com/css?family=Lato"));
        assert!(blocker.allows("https://loj.ac/problem/1"));
        assert!(blocker.allows("https://loj.ac/submission/42"));
    }

    #[test]
    fn test_empty_list_blocks_nothing() {
        let blocker = ResourceBlocker::new(Vec::<String>::new()).unwrap();
        assert!(blocker.allows("https://www.google.com/"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ResourceBlocker::new(["("]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
