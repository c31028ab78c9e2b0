//! Structural comparison, diffing and dependency ordering for database
//! schema trees.
//!
//! This crate provides:
//! - A comparison protocol ([`ComparisonVisitor`]) driven by per-kind
//!   property descriptors, with stock visitors for structural equality,
//!   filtered equality and node collection
//! - Diff trees ([`DiffTree`]) that pair renamed entities by resemblance
//! - A planner ([`DependencyPlanner`]) that orders tables for CREATE and
//!   DROP from their foreign keys, cycles included
//!
//! Schema trees themselves come from [`schemata_model`], re-exported here as
//! [`model`].
//!
//! ```ignore
//! let settings = Settings::load(Path::new("."))?;
//! let changes = settings.comparator.diff(live.node(db)?, wanted.node(db)?);
//! println!("{changes}");
//!
//! let tables = schemata::collect_kind(wanted_root, NodeKind::Table);
//! for table in settings.planner.create_order(&tables) {
//!     // ...
//! }
//! ```

use std::path::Path;

mod compare;
mod diff;
mod error;
mod pairing;
pub mod planner;
mod visitor;

pub use compare::{
    CollectionMode, Comparator, ComparisonVisitor, ValueContext, resembles, structurally_equal,
};
pub use diff::{ChangeState, DiffBuilder, DiffId, DiffNode, DiffSubject, DiffTree, diff};
pub use error::{Error, Result};
pub use planner::{DependencyPlanner, Direction};
pub use visitor::{Collector, Filter, Structural, collect, collect_kind};

pub use schemata_config as config;
pub use schemata_model as model;

/// A configured comparator and planner.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub comparator: Comparator,
    pub planner: DependencyPlanner,
}

impl Settings {
    pub fn from_config(config: &config::Config) -> Result<Self> {
        Ok(Self {
            comparator: Comparator::from_config(&config.matching)?,
            planner: DependencyPlanner::new(&config.planner),
        })
    }

    /// Load `.config/schemata.styx` from `start` or one of its parents.
    pub fn load(start: &Path) -> Result<Self> {
        let (config, path) = config::load_from(start)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Self::from_config(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = config::from_str(
            r#"
matching {
  volatile-keys (name comment)
  tie-break (name)
}
planner {
  hard-hop-cost 8
}
"#,
        )
        .unwrap();
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.comparator.volatile_keys().len(), 2);
        assert_eq!(settings.comparator.tie_break(), [config::TieBreak::Name]);
    }

    #[test]
    fn test_settings_reject_unknown_volatile_key() {
        let config = config::from_str("matching {\n  volatile-keys (colour)\n}\n").unwrap();
        let err = Settings::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            Error::Model(model::ModelError::UnknownPropertyName(_))
        ));
        assert_eq!(err.to_string(), "model error: unknown property name 'colour'");
    }
}
