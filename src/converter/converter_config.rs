use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::producer::{DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, Format};
use crate::transform::GroupOptions;

use super::helpers::{expand_tilde, fetch_text};

// ============================================================================
// Converter Config Types
// ============================================================================

/// One input of the conversion: a file path, an `http(s)://` URL or `-` for stdin
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Source {
    /// Name used in log messages
    pub name: String,

    /// Where to read the subscription from
    pub url: String,
}

/// Converter configuration parsed from TOML file
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConverterConfig {
    /// Target format selector; the canonical YAML document when absent
    #[serde(default)]
    pub format: Option<String>,

    /// Output file path; stdout when absent
    #[serde(default)]
    pub output: Option<String>,

    /// Remove every node whose server is an IPv6 literal
    #[serde(default)]
    pub ipv4_only: bool,

    /// Suffix repeated node names with ` 2`, ` 3`, ...
    #[serde(default = "default_true")]
    pub unique_names: bool,

    /// Build default groups and a `MATCH` rule when the input carries no groups
    #[serde(default = "default_true")]
    pub generate_groups: bool,

    /// Add one group per flag emoji found in node names
    #[serde(default = "default_true")]
    pub country_code_groups: bool,

    /// List of country codes to build groups for (e.g., ["US", "JP", "HK"])
    /// If empty or not specified, every country code found in node names is used
    #[serde(default)]
    pub country_codes: Vec<String>,

    /// Test URL for the generated url-test group
    #[serde(default = "default_test_url")]
    pub test_url: String,

    /// Test interval in seconds for the generated url-test group
    #[serde(default = "default_test_interval")]
    pub test_interval: u32,

    /// Inputs (required - at least one)
    pub sources: Vec<Source>,
}

// ============================================================================
// Converter Config Implementation
// ============================================================================

impl ConverterConfig {
    /// Config with default settings for the given inputs
    pub fn from_inputs(inputs: &[String]) -> Self {
        let sources = inputs
            .iter()
            .enumerate()
            .map(|(idx, url)| Source {
                name: format!("input-{}", idx + 1),
                url: url.clone(),
            })
            .collect();
        Self {
            format: None,
            output: None,
            ipv4_only: false,
            unique_names: true,
            generate_groups: true,
            country_code_groups: true,
            country_codes: Vec::new(),
            test_url: default_test_url(),
            test_interval: default_test_interval(),
            sources,
        }
    }

    /// Parse converter config from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ConverterConfig =
            toml::from_str(content).context("Failed to parse converter config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the fields serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("At least one source is required");
        }
        self.target_format()?;
        if self.test_interval == 0 {
            anyhow::bail!("test_interval must be greater than zero");
        }
        Ok(())
    }

    /// Get the parsed target format
    pub fn target_format(&self) -> Result<Option<Format>> {
        self.format
            .as_deref()
            .map(|s| s.parse::<Format>())
            .transpose()
            .with_context(|| format!("Invalid format: {}", self.format.as_deref().unwrap_or_default()))
    }

    /// Settings for generated groups
    pub fn group_options(&self) -> GroupOptions {
        GroupOptions {
            country_groups: self.country_code_groups,
            country_codes: self.country_codes.clone(),
            test_url: self.test_url.clone(),
            test_interval: self.test_interval,
        }
    }

    /// Load converter config from file path
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read converter config from {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Load converter config from file path or URL
    pub async fn load(path_or_url: &str) -> Result<Self> {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            Self::from_url(path_or_url).await
        } else {
            let expanded = expand_tilde(path_or_url);
            Self::from_file(Path::new(&expanded)).await
        }
    }

    /// Load converter config from URL
    pub async fn from_url(url: &str) -> Result<Self> {
        let content = fetch_text(url).await?;
        Self::from_toml(&content)
    }
}

fn default_true() -> bool {
    true
}

fn default_test_url() -> String {
    DEFAULT_TEST_URL.to_string()
}

fn default_test_interval() -> u32 {
    DEFAULT_TEST_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_defaults() {
        let config = ConverterConfig::from_toml(
            r#"
[[sources]]
name = "main"
url = "https://example.com/sub"
"#,
        )
        .unwrap();
        assert_eq!(config.format, None);
        assert!(config.unique_names);
        assert!(config.generate_groups);
        assert!(!config.ipv4_only);
        assert_eq!(config.test_interval, 300);
        assert_eq!(config.target_format().unwrap(), None);
        assert_eq!(config.sources[0].name, "main");
    }

    #[test]
    fn test_from_toml_full() {
        let config = ConverterConfig::from_toml(
            r#"
format = "sing-box"
output = "./out/sing-box.json"
ipv4_only = true
country_codes = ["us", "JP"]
test_interval = 600

[[sources]]
name = "a"
url = "./a.txt"

[[sources]]
name = "b"
url = "~/b.yaml"
"#,
        )
        .unwrap();
        assert_eq!(config.target_format().unwrap(), Some(Format::SingBox));
        assert_eq!(config.sources.len(), 2);
        let options = config.group_options();
        assert_eq!(options.test_interval, 600);
        assert_eq!(options.country_codes, vec!["us", "JP"]);
    }

    #[test]
    fn test_from_toml_requires_sources() {
        let err = ConverterConfig::from_toml("sources = []").unwrap_err();
        assert!(err.to_string().contains("At least one source"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_format() {
        let content = "format = \"netscape\"\n[[sources]]\nname = \"a\"\nurl = \"a\"\n";
        let err = ConverterConfig::from_toml(content).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid format"));
    }

    #[test]
    fn test_from_inputs() {
        let config = ConverterConfig::from_inputs(&["-".to_string(), "b.txt".to_string()]);
        assert_eq!(config.sources[1].name, "input-2");
        assert!(config.validate().is_ok());
        assert!(ConverterConfig::from_inputs(&[]).validate().is_err());
    }
}
