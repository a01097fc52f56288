//! Version information for survivor.

/// survivor version from Cargo.toml
pub const SURVIVOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VersionInfo {
    /// Server version.
    pub survivor: &'static str,
    /// Deployment label (e.g. an image tag), if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            survivor: SURVIVOR_VERSION,
            build: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(mut self, build: String) -> Self {
        self.build = Some(build);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_info_has_crate_version() {
        let info = VersionInfo::new();
        assert_eq!(info.survivor, SURVIVOR_VERSION);
        assert!(info.build.is_none());
    }

    #[test]
    fn version_info_serializes_minimal() {
        let info = VersionInfo {
            survivor: "0.1.0",
            build: None,
        };
        insta::assert_json_snapshot!(info, @r#"
        {
          "survivor": "0.1.0"
        }
        "#);
    }

    #[test]
    fn version_info_serializes_build() {
        let info = VersionInfo {
            survivor: "0.1.0",
            build: None,
        }
        .with_build("2026.10.1".to_string());
        insta::assert_json_snapshot!(info, @r#"
        {
          "survivor": "0.1.0",
          "build": "2026.10.1"
        }
        "#);
    }
}
