//! Host-side settings for decomposition runs.
//!
//! The host keeps these in its preference store; here they are plain data
//! loaded from JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::{Decompose, RunOptions};
use crate::scene::{HullAppearance, ObjectId};
use crate::solver::{ParameterSet, ResolvedParams, SolverAdapter, SolverKind, SolverPaths};

/// Settings shared by every run started from the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecompositionConfig {
    pub solver_paths: SolverPaths,
    /// Solver used when the caller does not pick one.
    pub solver: SolverKind,
    /// Options for `solver`; anything left out takes the solver default.
    pub params: ParameterSet,
    pub collection_name: String,
    /// Hull transparency percentage, `0..=100`.
    pub alpha: u8,
    pub timeout_secs: Option<u64>,
    pub temp_root: Option<PathBuf>,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            solver_paths: SolverPaths::default(),
            solver: SolverKind::default(),
            params: ParameterSet::new(),
            collection_name: "convex hulls".to_string(),
            alpha: 90,
            timeout_secs: None,
            temp_root: None,
        }
    }
}

impl DecompositionConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed JSON, or the first
    /// validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges and the configured solver options.
    ///
    /// Binary paths are not checked here; they are checked at the start of
    /// every run, since the files may appear or vanish in between.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        HullAppearance::new(self.alpha)?;
        if self.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid("collection_name must not be empty".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        ResolvedParams::resolve(self.solver.name(), self.adapter(self.solver).options(), &self.params)?;
        Ok(())
    }

    /// Adapter for `kind` using the configured binary paths.
    #[must_use]
    pub fn adapter(&self, kind: SolverKind) -> Arc<dyn SolverAdapter> {
        kind.adapter(&self.solver_paths)
    }

    /// Run options derived from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for an invalid `alpha`.
    pub fn run_options(&self) -> Result<RunOptions, ConfigError> {
        Ok(RunOptions {
            collection_name: self.collection_name.clone(),
            appearance: HullAppearance::new(self.alpha)?,
            timeout: self.timeout_secs.map(Duration::from_secs),
            temp_root: self.temp_root.clone(),
        })
    }

    /// Builds a run of the configured solver on `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for an invalid `alpha`.
    pub fn decompose(&self, source: ObjectId) -> Result<Decompose, ConfigError> {
        Ok(Decompose::new(
            source,
            self.adapter(self.solver),
            self.params.clone(),
            self.run_options()?,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::solver::ParamValue;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DecompositionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DecompositionConfig::default());
        let options = config.run_options().unwrap();
        assert_eq!(options.collection_name, "convex hulls");
        assert_eq!(options.timeout, None);
    }

    #[test]
    fn full_document_is_read() {
        let config = DecompositionConfig::from_json_str(
            r#"{
                "solver_paths": { "vhacd": "/opt/vhacd/TestVHACD", "coacd": "/opt/coacd/main" },
                "solver": "CoACD",
                "params": { "threshold": 0.1, "merge": false },
                "collection_name": "collision",
                "alpha": 50,
                "timeout_secs": 600
            }"#,
        )
        .unwrap();
        assert_eq!(config.solver, SolverKind::Coacd);
        assert_eq!(config.solver_paths.coacd, PathBuf::from("/opt/coacd/main"));
        assert_eq!(config.params.get("threshold"), Some(&ParamValue::Float(0.1)));
        assert_eq!(config.params.get("merge"), Some(&ParamValue::Bool(false)));
        assert_eq!(config.run_options().unwrap().timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.adapter(config.solver).kind(), SolverKind::Coacd);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            DecompositionConfig::from_json_str(r#"{ "alpha": 120 }"#),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            DecompositionConfig::from_json_str(r#"{ "collection_name": " " }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DecompositionConfig::from_json_str(r#"{ "params": { "max_hulls": 0 } }"#),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            DecompositionConfig::from_json_str(r#"{ "solver": "bullet" }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DecompositionConfig::from_json_str(r#"{ "colour": 1 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn solver_name_ignores_case() {
        for (name, kind) in [("COACD", SolverKind::Coacd), ("coacd", SolverKind::Coacd), ("VHacd", SolverKind::Vhacd)] {
            let config = DecompositionConfig::from_json_str(&format!(r#"{{ "solver": "{name}" }}"#)).unwrap();
            assert_eq!(config.solver, kind);
            assert_eq!(name.parse::<SolverKind>().unwrap(), kind);
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = DecompositionConfig::from_json_file(Path::new("/nonexistent/convex-decomp.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
