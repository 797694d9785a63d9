//! Environment variable overrides for [`RuntimeConfig`].
//!
//! # Precedence
//!
//! 1. Builder methods called after [`RuntimeBuilder::with_env_overrides`](super::RuntimeBuilder::with_env_overrides)
//! 2. `FIBROUS_*` environment variables
//! 3. Builder methods called before it
//! 4. [`RuntimeConfig::default()`]
//!
//! # Supported Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `FIBROUS_MAX_OPS` | `usize` | `max_ops` |
//! | `FIBROUS_REPORT_FAILURES` | `bool` | `report_failures` |
//! | `FIBROUS_SEED` | `u64` | `seed` |
//! | `FIBROUS_THREAD_NAME` | `String` | `thread_name` |

use crate::error::ConfigError;
use crate::runtime::config::RuntimeConfig;

/// Variable overriding `max_ops`.
pub const ENV_MAX_OPS: &str = "FIBROUS_MAX_OPS";
/// Variable overriding `report_failures`.
pub const ENV_REPORT_FAILURES: &str = "FIBROUS_REPORT_FAILURES";
/// Variable overriding `seed`.
pub const ENV_SEED: &str = "FIBROUS_SEED";
/// Variable overriding `thread_name`.
pub const ENV_THREAD_NAME: &str = "FIBROUS_THREAD_NAME";

/// Applies the variables that are set. Fails on the first one that does
/// not parse, leaving earlier ones applied.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MAX_OPS) {
        config.max_ops = parse_usize(ENV_MAX_OPS, &val)?;
    }
    if let Some(val) = read_env(ENV_REPORT_FAILURES) {
        config.report_failures = parse_bool(ENV_REPORT_FAILURES, &val)?;
    }
    if let Some(val) = read_env(ENV_SEED) {
        config.seed = parse_u64(ENV_SEED, &val)?;
    }
    if let Some(val) = read_env(ENV_THREAD_NAME) {
        config.thread_name = val;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn invalid(var: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        var,
        expected,
        value: value.to_string(),
    }
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| invalid(var, "unsigned integer", val))
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    let trimmed = val.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|_| invalid(var, "u64 (decimal or 0x hex)", val))
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, "bool (true/false/1/0/yes/no)", val)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::env_lock;

    const ALL: [&str; 4] = [ENV_MAX_OPS, ENV_REPORT_FAILURES, ENV_SEED, ENV_THREAD_NAME];

    fn with_envs<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = env_lock();
        for name in ALL {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        f();
        for (name, _) in vars {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "YES", "On"] {
            assert!(parse_bool("TEST", val).unwrap(), "expected true for {val}");
        }
        for val in ["false", "0", "no", "OFF"] {
            assert!(!parse_bool("TEST", val).unwrap(), "expected false for {val}");
        }
        assert!(parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn parse_seed_accepts_hex() {
        assert_eq!(parse_u64("TEST", "0xff").unwrap(), 255);
        assert_eq!(parse_u64("TEST", " 42 ").unwrap(), 42);
        assert!(parse_u64("TEST", "0xzz").is_err());
    }

    #[test]
    fn overrides_apply() {
        with_envs(
            &[
                (ENV_MAX_OPS, "64"),
                (ENV_REPORT_FAILURES, "no"),
                (ENV_SEED, "7"),
                (ENV_THREAD_NAME, "io-loop"),
            ],
            || {
                let mut config = RuntimeConfig::default();
                apply_env_overrides(&mut config).unwrap();
                assert_eq!(config.max_ops, 64);
                assert!(!config.report_failures);
                assert_eq!(config.seed, 7);
                assert_eq!(config.thread_name, "io-loop");
            },
        );
    }

    #[test]
    fn unset_vars_leave_defaults() {
        with_envs(&[], || {
            let mut config = RuntimeConfig::default();
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config.max_ops, RuntimeConfig::default().max_ops);
            assert_eq!(config.seed, RuntimeConfig::default().seed);
        });
    }

    #[test]
    fn invalid_value_names_var_and_value() {
        with_envs(&[(ENV_MAX_OPS, "not_a_number")], || {
            let mut config = RuntimeConfig::default();
            let msg = apply_env_overrides(&mut config).unwrap_err().to_string();
            assert!(msg.contains(ENV_MAX_OPS), "error should mention var name: {msg}");
            assert!(msg.contains("not_a_number"), "error should mention bad value: {msg}");
        });
    }
}
