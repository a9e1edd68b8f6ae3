//! Pre-spawn compatibility check

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Environment variable that disables the check when set to a non-empty value
pub const SKIP_VERSION_CHECK_ENV: &str = "CLAUDE_AGENT_SDK_SKIP_VERSION_CHECK";

/// Decides whether an executable is compatible before it is spawned
///
/// Implementations report failure as [`TransportError::VersionCheck`](crate::TransportError::VersionCheck).
#[async_trait]
pub trait VersionCheck: Send + Sync {
    /// Check the executable at `cli_path`
    async fn check(&self, cli_path: &Path) -> Result<()>;
}

pub(crate) fn should_skip(configured: bool) -> bool {
    configured
        || std::env::var_os(SKIP_VERSION_CHECK_ENV).is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_flag_wins() {
        temp_env::with_var_unset(SKIP_VERSION_CHECK_ENV, || {
            assert!(should_skip(true));
            assert!(!should_skip(false));
        });
    }

    #[test]
    fn test_skip_env_var() {
        temp_env::with_var(SKIP_VERSION_CHECK_ENV, Some("1"), || {
            assert!(should_skip(false));
        });
        temp_env::with_var(SKIP_VERSION_CHECK_ENV, Some(""), || {
            assert!(!should_skip(false));
        });
    }
}
