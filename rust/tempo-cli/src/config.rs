//! Configuration file parsing for `tempo.toml`.
//!
//! Searches the current directory then its ancestors. A missing file means
//! defaults; a file that exists but cannot be read or parsed is an error.
//!
//! ```toml
//! [driver]
//! repeat = 3
//! opt_level = "speed"
//!
//! [[case]]
//! variant = "int_arithmetic"
//! label = "ten"
//! input = 10
//! expected = 15
//!
//! [[case]]
//! variant = "str_to_str"
//! input = "hello"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempo_abi::{BoundaryValue, InvocationCase, SignatureVariant};
use tempo_codegen::OptLevel;
use thiserror::Error;

/// File name searched for in the current directory and its ancestors.
pub const CONFIG_FILE: &str = "tempo.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown opt_level '{0}' (expected none, speed or speed_and_size)")]
    InvalidOptLevel(String),
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct TempoConfig {
    #[serde(default)]
    pub driver: DriverSection,
    #[serde(default, rename = "case")]
    pub cases: Vec<CaseSpec>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct DriverSection {
    /// Invocations per case.
    pub repeat: Option<u32>,
    /// `none`, `speed` or `speed_and_size`.
    pub opt_level: Option<String>,
}

/// One `[[case]]` table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaseSpec {
    pub variant: SignatureVariant,
    pub label: Option<String>,
    pub input: BoundaryValue,
    /// Omitted means the output only has to be reproducible.
    pub expected: Option<BoundaryValue>,
}

impl CaseSpec {
    pub fn to_case(&self) -> InvocationCase {
        let label = self
            .label
            .clone()
            .unwrap_or_else(|| format!("f({})", self.input));
        match &self.expected {
            Some(expected) => InvocationCase::exact(label, self.input.clone(), expected.clone()),
            None => InvocationCase::deterministic(label, self.input.clone()),
        }
    }
}

impl TempoConfig {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find `tempo.toml` in `start` or the nearest ancestor that has one.
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load the nearest `tempo.toml` above the current directory, if any.
    pub fn discover() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let Ok(cwd) = std::env::current_dir() else {
            return Ok(None);
        };
        match Self::find(&cwd) {
            Some(path) => {
                let config = Self::load_from(&path)?;
                Ok(Some((path, config)))
            }
            None => Ok(None),
        }
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn opt_level(&self) -> Result<Option<OptLevel>, ConfigError> {
        self.driver
            .opt_level
            .as_deref()
            .map(|s| OptLevel::from_str(s).map_err(|_| ConfigError::InvalidOptLevel(s.to_string())))
            .transpose()
    }

    /// Cases configured for `variant`, in file order.
    pub fn cases_for(&self, variant: SignatureVariant) -> Vec<InvocationCase> {
        self.cases
            .iter()
            .filter(|case| case.variant == variant)
            .map(CaseSpec::to_case)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_abi::Expectation;

    #[test]
    fn empty_config_is_default() {
        let cfg = TempoConfig::parse("").expect("should parse");
        assert_eq!(cfg, TempoConfig::default());
        assert_eq!(cfg.opt_level().unwrap(), None);
    }

    #[test]
    fn parse_driver_section() {
        let cfg = TempoConfig::parse(
            r#"
[driver]
repeat = 4
opt_level = "speed_and_size"
"#,
        )
        .expect("should parse");
        assert_eq!(cfg.driver.repeat, Some(4));
        assert_eq!(cfg.opt_level().unwrap(), Some(OptLevel::SpeedAndSize));
    }

    #[test]
    fn invalid_opt_level() {
        let cfg = TempoConfig::parse("[driver]\nopt_level = \"ludicrous\"\n").unwrap();
        let err = cfg.opt_level().unwrap_err();
        assert!(err.to_string().contains("ludicrous"));
    }

    #[test]
    fn parse_cases() {
        let cfg = TempoConfig::parse(
            r#"
[[case]]
variant = "int_arithmetic"
label = "ten"
input = 10
expected = 15

[[case]]
variant = "str_to_str"
input = "hello"

[[case]]
variant = "int_arithmetic"
input = -5
"#,
        )
        .expect("should parse");
        assert_eq!(cfg.cases.len(), 3);

        let arithmetic = cfg.cases_for(SignatureVariant::IntArithmetic);
        assert_eq!(arithmetic.len(), 2);
        assert_eq!(arithmetic[0], InvocationCase::exact("ten", 10i64, 15i64));
        assert_eq!(arithmetic[1].label, "f(-5)");
        assert_eq!(arithmetic[1].expected, Expectation::Deterministic);

        let strings = cfg.cases_for(SignatureVariant::StrToStr);
        assert_eq!(strings[0].input, BoundaryValue::from("hello"));
        assert_eq!(strings[0].label, "f(\"hello\")");

        assert!(cfg.cases_for(SignatureVariant::IntToInt).is_empty());
    }

    #[test]
    fn unknown_variant_is_a_parse_error() {
        let result = TempoConfig::parse("[[case]]\nvariant = \"float_to_float\"\ninput = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn find_walks_up_to_ancestors() {
        let root = std::env::temp_dir().join(format!("tempo_config_{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "[driver]\nrepeat = 1\n").unwrap();

        let found = TempoConfig::find(&nested).expect("should find config");
        assert_eq!(found, root.join(CONFIG_FILE));
        let cfg = TempoConfig::load_from(&found).unwrap();
        assert_eq!(cfg.driver.repeat, Some(1));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn load_from_missing_file() {
        let err = TempoConfig::load_from(Path::new("/nonexistent/tempo.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().starts_with("cannot read '/nonexistent/tempo.toml'"));
    }
}
