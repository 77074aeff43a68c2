//! Rater identity resolution for CLI commands.
//!
//! The resolution chain: `--rater` flag > `ECGLABEL_RATER` env > `rater` in
//! the user config. Commands that act for one rater require an identity;
//! project-wide reports work without one.

use std::env;

use ecglabel_core::model::RaterId;
use ecglabel_core::ErrorCode;

use crate::output::CliError;

/// Failure to settle on a rater identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaterResolutionError {
    pub message: String,
    pub code: ErrorCode,
}

impl std::fmt::Display for RaterResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RaterResolutionError {}

impl RaterResolutionError {
    pub fn to_cli_error(&self) -> CliError {
        CliError::coded(&self.message, self.code)
            .suggest("Pass --rater or set ECGLABEL_RATER (or `rater` in the user config).")
    }
}

/// Environment reader seam for tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

fn resolve_rater_with(
    cli_flag: Option<&str>,
    user_default: Option<&RaterId>,
    env: &dyn EnvReader,
) -> Result<RaterId, RaterResolutionError> {
    let raw = cli_flag
        .filter(|flag| !flag.trim().is_empty())
        .map(str::to_string)
        .or_else(|| env.get("ECGLABEL_RATER"));

    match raw {
        Some(raw) => RaterId::new(raw.trim()).map_err(|err| RaterResolutionError {
            message: err.to_string(),
            code: ErrorCode::InvalidRater,
        }),
        None => user_default.cloned().ok_or_else(|| RaterResolutionError {
            message: "Rater identity required for this command.".to_string(),
            code: ErrorCode::InvalidRater,
        }),
    }
}

/// Resolve the acting rater, or explain why none could be found.
pub fn require_rater(
    cli_flag: Option<&str>,
    user_default: Option<&RaterId>,
) -> Result<RaterId, RaterResolutionError> {
    resolve_rater_with(cli_flag, user_default, &RealEnv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockEnv {
        vars: HashMap<String, String>,
    }

    impl MockEnv {
        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
        }
    }

    fn r(name: &str) -> RaterId {
        RaterId::new(name).unwrap()
    }

    #[test]
    fn flag_beats_env_and_user_config() {
        let env = MockEnv::default().var("ECGLABEL_RATER", "user2");
        let got = resolve_rater_with(Some("user1"), Some(&r("user3")), &env).unwrap();
        assert_eq!(got, r("user1"));
    }

    #[test]
    fn env_beats_user_config() {
        let env = MockEnv::default().var("ECGLABEL_RATER", "user2");
        let got = resolve_rater_with(None, Some(&r("user3")), &env).unwrap();
        assert_eq!(got, r("user2"));
    }

    #[test]
    fn blank_flag_and_env_fall_through() {
        let env = MockEnv::default().var("ECGLABEL_RATER", "  ");
        let got = resolve_rater_with(Some(""), Some(&r("user3")), &env).unwrap();
        assert_eq!(got, r("user3"));
    }

    #[test]
    fn missing_identity_is_an_error() {
        let err = resolve_rater_with(None, None, &MockEnv::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRater);
        assert!(err.to_cli_error().suggestion.is_some());
    }

    #[test]
    fn malformed_identity_is_rejected() {
        let err = resolve_rater_with(Some("two words"), None, &MockEnv::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRater);
    }
}
