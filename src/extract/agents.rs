//! User agent and rate-limit randomization.

use rand::seq::SliceRandom;
use rand::Rng;
use std::ops::RangeInclusive;
use std::path::Path;

/// Rate-limit range in KiB/s.
pub const RATE_LIMIT_KIB: RangeInclusive<u64> = 300..=600;

const BUILTIN_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Pool of user agents drawn from at random for each attempt.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    pub fn builtin() -> Self {
        Self {
            agents: BUILTIN_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Read one agent per line, ignoring blank lines and `#` comments.
    /// Falls back to the built-in pool when the file has no usable lines.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let agents: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();

        if agents.is_empty() {
            return Ok(Self::builtin());
        }
        Ok(Self { agents })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn pick(&self) -> &str {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(BUILTIN_AGENTS[0])
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A random download ceiling in bytes per second.
pub fn random_rate_limit() -> u64 {
    rand::thread_rng().gen_range(RATE_LIMIT_KIB) * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_in_range() {
        for _ in 0..100 {
            let limit = random_rate_limit();
            assert!(limit >= 300 * 1024 && limit <= 600 * 1024);
            assert_eq!(limit % 1024, 0);
        }
    }

    #[test]
    fn test_pool_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.txt");
        std::fs::write(&path, "# comment\nAgent/1\n\n  Agent/2  \n").unwrap();

        let pool = UserAgentPool::from_file(&path).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.pick().starts_with("Agent/"));
    }

    #[test]
    fn test_empty_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.txt");
        std::fs::write(&path, "\n# nothing\n").unwrap();

        let pool = UserAgentPool::from_file(&path).unwrap();
        assert_eq!(pool.len(), BUILTIN_AGENTS.len());
    }
}
