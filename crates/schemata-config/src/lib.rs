//! Configuration for schemata.
//!
//! Looks for `.config/schemata.styx` in a directory or any of its parents.
//! Every field is optional; unset fields fall back to the built-in defaults
//! exposed by the accessor methods.
//!
//! ```text
//! matching {
//!     volatile-keys (name created-at last-altered-at comment)
//!     tie-break (name ordinal)
//! }
//! planner {
//!     soft-hop-cost 2048
//! }
//! ```

use facet::Facet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location of the configuration file, relative to a search directory.
pub const CONFIG_PATH: &str = ".config/schemata.styx";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct Config {
    /// How nodes are matched across two versions of a tree.
    #[facet(default)]
    pub matching: MatchConfig,

    /// Tunables for the CREATE/DROP ordering planner.
    #[facet(default)]
    pub planner: PlannerConfig,
}

/// Which rule decides between several equally-resembling candidates when
/// pairing elements of an unordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[facet(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TieBreak {
    /// Prefer the candidate at the same ordinal position.
    Ordinal,
    /// Prefer the candidate whose name no other unmatched element claims.
    Name,
}

/// Matching configuration.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct MatchConfig {
    /// Property keys ignored when deciding whether two nodes are the same
    /// entity (kebab-case property names).
    #[facet(default)]
    pub volatile_keys: Option<Vec<String>>,

    /// Tie-break rules, applied in order.
    #[facet(default)]
    pub tie_break: Option<Vec<TieBreak>>,
}

impl MatchConfig {
    pub const DEFAULT_VOLATILE_KEYS: &'static [&'static str] =
        &["name", "created-at", "last-altered-at"];

    pub const DEFAULT_TIE_BREAK: &'static [TieBreak] = &[TieBreak::Ordinal, TieBreak::Name];

    pub fn volatile_keys(&self) -> Vec<&str> {
        match &self.volatile_keys {
            Some(keys) => keys.iter().map(String::as_str).collect(),
            None => Self::DEFAULT_VOLATILE_KEYS.to_vec(),
        }
    }

    pub fn tie_break(&self) -> &[TieBreak] {
        self.tie_break
            .as_deref()
            .unwrap_or(Self::DEFAULT_TIE_BREAK)
    }
}

/// Planner configuration.
///
/// A dependency path between two tables starts at `base_score` and loses
/// `hard_hop_cost` per NOT NULL foreign key hop and `soft_hop_cost` per
/// nullable hop. Only the relative sizes matter: hard hops must cost less
/// than soft ones so enforced dependencies outweigh optional ones.
#[derive(Debug, Clone, Default, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct PlannerConfig {
    #[facet(default)]
    pub base_score: Option<i64>,

    #[facet(default)]
    pub hard_hop_cost: Option<i64>,

    #[facet(default)]
    pub soft_hop_cost: Option<i64>,
}

impl PlannerConfig {
    pub const DEFAULT_BASE_SCORE: i64 = 1 << 24;
    pub const DEFAULT_HARD_HOP_COST: i64 = 16;
    pub const DEFAULT_SOFT_HOP_COST: i64 = 1024;

    pub fn base_score(&self) -> i64 {
        self.base_score.unwrap_or(Self::DEFAULT_BASE_SCORE)
    }

    pub fn hard_hop_cost(&self) -> i64 {
        self.hard_hop_cost.unwrap_or(Self::DEFAULT_HARD_HOP_COST)
    }

    pub fn soft_hop_cost(&self) -> i64 {
        self.soft_hop_cost.unwrap_or(Self::DEFAULT_SOFT_HOP_COST)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no .config/schemata.styx found in {0} or any parent")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse .config/schemata.styx: {0}")]
    Parse(String),
}

/// Parse a configuration document.
pub fn from_str(source: &str) -> Result<Config, ConfigError> {
    facet_styx::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.display().to_string(),
        source,
    })?;
    Ok((from_str(&content)?, config_path))
}

/// Find the configuration file by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_PATH);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound(start.display().to_string()));
        }
    }
}
