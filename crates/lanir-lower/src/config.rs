use serde::{Deserialize, Serialize};

pub const PERF_ENV: &str = "LANIR_PERF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    /// Compute fragment-stage lod per lane instead of per 2x2 quad.
    pub no_quad_lod: bool,
    /// Verify SSA numbering and the absence of phis before walking a function.
    pub check_normalized: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        Self {
            no_quad_lod: false,
            check_normalized: true,
        }
    }
}

impl LowerConfig {
    /// Reads `LANIR_PERF`, a comma separated flag list (`no_quad_lod`, `no_check`).
    pub fn from_env() -> Self {
        match std::env::var(PERF_ENV) {
            Ok(flags) => Self::from_flags(&flags),
            Err(_) => Self::default(),
        }
    }

    pub fn from_flags(flags: &str) -> Self {
        let mut config = Self::default();
        for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag {
                "no_quad_lod" => config.no_quad_lod = true,
                "no_check" => config.check_normalized = false,
                unknown => tracing::warn!(flag = unknown, "ignoring unknown {} flag", PERF_ENV),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags() {
        let config = LowerConfig::from_flags("no_quad_lod, bogus,no_check");
        assert!(config.no_quad_lod);
        assert!(!config.check_normalized);
        assert_eq!(LowerConfig::from_flags(""), LowerConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config: LowerConfig = serde_json::from_str(r#"{"no_quad_lod": true}"#).unwrap();
        assert_eq!(
            config,
            LowerConfig {
                no_quad_lod: true,
                check_normalized: true,
            }
        );
    }
}
