//! Two-tier search configuration.
//!
//! [`TwoTierConfig`] is an immutable value constructed once at the system
//! boundary. [`TwoTierConfig::from_env`] applies environment overrides; any
//! value that fails to parse or falls outside its documented range is
//! replaced by the default and reported with a `warn!`. Core search code
//! never reads the environment itself.

use std::env;
use tracing::warn;

const DEFAULT_QUALITY_WEIGHT: f32 = 0.7;
const DEFAULT_RRF_K: f32 = 60.0;
const DEFAULT_MULTIPLIER: usize = 3;
const DEFAULT_QUALITY_TIMEOUT_MS: u64 = 500;

/// Configuration for the two-tier search pipeline.
#[derive(Debug, Clone)]
pub struct TwoTierConfig {
    /// Weight of the quality tier when blending refined scores, in `[0, 1]`.
    pub quality_weight: f32,
    /// RRF rank constant, strictly positive.
    pub rrf_k: f32,
    /// Candidate pool multiplier: each source retrieves `k * multiplier`.
    pub candidate_multiplier: usize,
    /// Skip the quality refinement phase entirely.
    pub fast_only: bool,
    /// Deadline for the quality phase in milliseconds.
    pub quality_timeout_ms: u64,
}

impl Default for TwoTierConfig {
    fn default() -> Self {
        Self {
            quality_weight: DEFAULT_QUALITY_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
            candidate_multiplier: DEFAULT_MULTIPLIER,
            fast_only: false,
            quality_timeout_ms: DEFAULT_QUALITY_TIMEOUT_MS,
        }
    }
}

impl TwoTierConfig {
    /// Builds a config from `WHIRR_*` environment variables.
    ///
    /// Recognized variables: `WHIRR_QUALITY_WEIGHT`, `WHIRR_RRF_K`,
    /// `WHIRR_CANDIDATE_MULTIPLIER`, `WHIRR_FAST_ONLY`,
    /// `WHIRR_QUALITY_TIMEOUT_MS`. Invalid or out-of-range values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            quality_weight: env_parse("WHIRR_QUALITY_WEIGHT", defaults.quality_weight, |w| {
                (0.0..=1.0).contains(&w)
            }),
            rrf_k: env_parse("WHIRR_RRF_K", defaults.rrf_k, |k| k > 0.0),
            candidate_multiplier: env_parse(
                "WHIRR_CANDIDATE_MULTIPLIER",
                defaults.candidate_multiplier,
                |m| m >= 1,
            ),
            fast_only: env_bool("WHIRR_FAST_ONLY", defaults.fast_only),
            quality_timeout_ms: env_parse(
                "WHIRR_QUALITY_TIMEOUT_MS",
                defaults.quality_timeout_ms,
                |_| true,
            ),
        }
    }

    /// Config with refinement disabled.
    pub fn fast_only() -> Self {
        Self {
            fast_only: true,
            ..Self::default()
        }
    }
}

fn env_parse<T>(key: &str, default: T, valid: impl Fn(T) -> bool) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) if valid(parsed) => parsed,
        Ok(parsed) => {
            warn!(%key, value = %parsed, fallback = %default, "config value out of range");
            default
        }
        Err(_) => {
            warn!(%key, value = %raw, fallback = %default, "config value failed to parse");
            default
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        other => {
            warn!(%key, value = %other, fallback = %default, "config value failed to parse");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TwoTierConfig::default();
        assert!((config.quality_weight - 0.7).abs() < f32::EPSILON);
        assert!((config.rrf_k - 60.0).abs() < f32::EPSILON);
        assert_eq!(config.candidate_multiplier, 3);
        assert!(!config.fast_only);
        assert_eq!(config.quality_timeout_ms, 500);
    }

    #[test]
    fn fast_only_preset() {
        let config = TwoTierConfig::fast_only();
        assert!(config.fast_only);
        assert_eq!(config.candidate_multiplier, 3);
    }

    #[test]
    fn env_override_and_range_fallback() {
        env::set_var("WHIRR_QUALITY_WEIGHT", "0.9");
        env::set_var("WHIRR_RRF_K", "-5");
        env::set_var("WHIRR_CANDIDATE_MULTIPLIER", "not-a-number");
        env::set_var("WHIRR_FAST_ONLY", "yes");

        let config = TwoTierConfig::from_env();
        assert!((config.quality_weight - 0.9).abs() < f32::EPSILON);
        assert!((config.rrf_k - 60.0).abs() < f32::EPSILON, "negative rrf_k falls back");
        assert_eq!(config.candidate_multiplier, 3);
        assert!(config.fast_only);

        env::remove_var("WHIRR_QUALITY_WEIGHT");
        env::remove_var("WHIRR_RRF_K");
        env::remove_var("WHIRR_CANDIDATE_MULTIPLIER");
        env::remove_var("WHIRR_FAST_ONLY");
    }
}
