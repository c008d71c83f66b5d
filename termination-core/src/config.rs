//! Configuration: leaf group size, branch factor, and debug logging, bound
//! either directly or from environment variables.
//!
//! The env var names and coercion rules are taken verbatim from the
//! OpenSHMEM sources this core was distilled from (`env_group_size`,
//! `env_branch_k`, `env_debug_enabled` in every `global_done_*.c` variant):
//! an absent, empty, or unparseable value silently falls back to the
//! default, and so does an out-of-range one (`G < 1`, `K < 2`) — this layer
//! never fails a run over a malformed knob.

use std::env;

/// Leaf group size (`G`). Default 8, matching the source's `G_LEAF = 8`.
pub const DEFAULT_LEAF_GROUP_SIZE: usize = 8;
/// Branching factor above the leaf (`K`). Default 8.
pub const DEFAULT_BRANCH_FACTOR: usize = 8;

const ENV_GROUP_SIZE: &str = "GLOBAL_GROUP_SIZE";
const ENV_BRANCH_K: &str = "GLOBAL_BRANCH_K";
const ENV_DEBUG: &str = "GLOBAL_DONE_DEBUG";

/// Which termination protocol variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Flat STAR: one level, `G` may exceed `N`.
    Star,
    /// Hierarchical H-STAR: `L` levels with branching `K`.
    HStar,
    /// Dynamic-leader variant: last-finisher election via fetch-add.
    Dynamic,
}

/// The exit ordering policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Variant A: collective barrier after observing the gate. Default.
    Barrier,
    /// Variant B: root-last with acknowledgement counting.
    RootLast,
    /// Variant C: root calls a job-wide terminate; PEs never observe the
    /// gate locally. Not modeled by the in-process simulated substrate
    /// (there is no "job" to externally kill), documented for completeness.
    RootProcessExit,
}

/// The bound configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Leaf group size (`G`).
    pub leaf_group_size: usize,
    /// Branching factor (`K`), used above the leaf by H-STAR and Dynamic.
    pub branch_factor: usize,
    /// Enables per-PE and planner debug logs.
    pub debug: bool,
    /// Which protocol variant to run.
    pub variant: Variant,
    /// Which exit ordering policy to use.
    pub exit_policy: ExitPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            leaf_group_size: DEFAULT_LEAF_GROUP_SIZE,
            branch_factor: DEFAULT_BRANCH_FACTOR,
            debug: false,
            variant: Variant::HStar,
            exit_policy: ExitPolicy::Barrier,
        }
    }
}

impl Config {
    /// Builds a [`Config`] from environment variables, falling back to the
    /// defaults on anything absent or malformed. `variant` and `exit_policy`
    /// are not externally bound and are always the defaults; callers pick a
    /// variant in code via [`Config::with_variant`].
    pub fn from_env() -> Self {
        Config {
            leaf_group_size: env_leaf_group_size(),
            branch_factor: env_branch_factor(),
            debug: env_debug_enabled(),
            ..Config::default()
        }
    }

    /// Returns a copy of this config with a different variant selected.
    pub fn with_variant(self, variant: Variant) -> Self {
        Config { variant, ..self }
    }

    /// Returns a copy of this config with a different exit policy selected.
    pub fn with_exit_policy(self, exit_policy: ExitPolicy) -> Self {
        Config { exit_policy, ..self }
    }
}

fn parse_coerced(raw: Option<String>, floor: usize, default: usize) -> usize {
    match raw.as_deref() {
        None => default,
        Some("") => default,
        Some(s) => match s.parse::<i64>() {
            Ok(v) if v >= floor as i64 => v as usize,
            _ => default,
        },
    }
}

fn env_leaf_group_size() -> usize {
    parse_coerced(env::var(ENV_GROUP_SIZE).ok(), 1, DEFAULT_LEAF_GROUP_SIZE)
}

fn env_branch_factor() -> usize {
    parse_coerced(env::var(ENV_BRANCH_K).ok(), 2, DEFAULT_BRANCH_FACTOR)
}

fn env_debug_enabled() -> bool {
    match env::var(ENV_DEBUG) {
        Err(_) => false,
        Ok(s) => !(s.is_empty() || s == "0"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_matches_source_semantics() {
        assert_eq!(parse_coerced(None, 1, 8), 8);
        assert_eq!(parse_coerced(Some(String::new()), 1, 8), 8);
        assert_eq!(parse_coerced(Some("not-a-number".into()), 1, 8), 8);
        assert_eq!(parse_coerced(Some("0".into()), 1, 8), 8);
        assert_eq!(parse_coerced(Some("4".into()), 1, 8), 4);
        assert_eq!(parse_coerced(Some("1".into()), 2, 8), 8);
    }

    #[test]
    fn default_config_uses_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.leaf_group_size, 8);
        assert_eq!(config.branch_factor, 8);
        assert!(!config.debug);
    }
}
