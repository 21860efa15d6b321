//! Conversion orchestration module
//!
//! This module reads every configured source, decodes it, applies the node
//! transforms and hands the result to the requested producer.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::emit::emit_config;
use crate::parser::{DecodeReport, SubscriptionType, detect_subscription_type, parse_subscription};
use crate::producer::{CONTENT_TYPE_YAML, Format, Produced, produce};
use crate::transform::{GroupOptions, dedupe_names, filter_ipv6_nodes, generate_default_groups};

// Sub-modules
pub mod converter_config;
pub mod helpers;

// Re-exports
pub use converter_config::{ConverterConfig, Source};
pub use helpers::{expand_tilde, fetch_text, read_source};

// ============================================================================
// Conversion Pipeline
// ============================================================================

/// Transform switches applied between decoding and producing
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub ipv4_only: bool,
    pub unique_names: bool,
    /// Build default groups when the input carries none
    pub generate_groups: bool,
    pub groups: GroupOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            ipv4_only: false,
            unique_names: true,
            generate_groups: true,
            groups: GroupOptions::default(),
        }
    }
}

impl From<&ConverterConfig> for ConvertOptions {
    fn from(config: &ConverterConfig) -> Self {
        Self {
            ipv4_only: config.ipv4_only,
            unique_names: config.unique_names,
            generate_groups: config.generate_groups,
            groups: config.group_options(),
        }
    }
}

/// Decodes one subscription text and produces it in `format`
///
/// Without a format a Clash YAML input is re-emitted as it is, top-level keys
/// included, unless `ipv4_only` asks for nodes to be removed.
pub fn convert_text(content: &str, format: Option<Format>, options: &ConvertOptions) -> Result<Produced> {
    if format.is_none()
        && !options.ipv4_only
        && detect_subscription_type(content) == SubscriptionType::ClashYaml
    {
        return reemit_yaml(content);
    }
    let report = parse_subscription(content)?;
    finish(report, format, options)
}

fn reemit_yaml(content: &str) -> Result<Produced> {
    debug!("No output format requested, re-emitting the YAML document");
    let document: serde_yaml::Value =
        serde_yaml::from_str(content).context("Invalid Clash YAML subscription")?;
    Ok(Produced {
        content: emit_config(&document),
        content_type: CONTENT_TYPE_YAML,
        warnings: Vec::new(),
    })
}

/// Applies the transforms to a decoded report and produces it
///
/// Renaming and group generation only happen for a target format; the
/// canonical document keeps the decoded nodes as they are.
fn finish(report: DecodeReport, format: Option<Format>, options: &ConvertOptions) -> Result<Produced> {
    for failure in &report.failures {
        warn!("Skipped input {}", failure);
    }

    let DecodeReport {
        mut nodes,
        mut groups,
        mut rules,
        ..
    } = report;

    if options.ipv4_only {
        nodes = filter_ipv6_nodes(nodes);
    }
    let reshape = format.is_some();
    if reshape && options.unique_names {
        dedupe_names(&mut nodes);
    }
    if reshape && groups.is_empty() && options.generate_groups && !nodes.is_empty() {
        let (generated, catch_all) = generate_default_groups(&nodes, &options.groups);
        groups = generated;
        if rules.is_empty() {
            rules = catch_all;
        }
    }

    debug!(
        "Producing {} nodes, {} groups, {} rules as {}",
        nodes.len(),
        groups.len(),
        rules.len(),
        format.map_or("canonical yaml", |f| f.as_str())
    );
    let produced = produce(format, &nodes, &groups, &rules)?;
    for warning in &produced.warnings {
        warn!("{}", warning);
    }
    Ok(produced)
}

// ============================================================================
// Converter
// ============================================================================

/// Converter that orchestrates reading, decoding and producing
pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    /// Create a new converter with the given config
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Load converter from path or URL
    pub async fn load(path_or_url: &str) -> Result<Self> {
        let config = ConverterConfig::load(path_or_url).await?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run the conversion process
    pub async fn convert(&self) -> Result<Produced> {
        info!("Starting conversion of {} source(s)", self.config.sources.len());

        let format = self.config.target_format()?;
        let options = ConvertOptions::from(&self.config);

        if format.is_none()
            && let [source] = self.config.sources.as_slice()
        {
            let content = read_source(&source.url)
                .await
                .with_context(|| format!("Failed to read source '{}'", source.name))?;
            return tokio::task::spawn_blocking(move || convert_text(&content, None, &options))
                .await
                .with_context(|| format!("Conversion task for '{}' panicked", source.name))?;
        }

        let report = self.decode_sources().await?;
        info!(
            "Decoded {} nodes ({} skipped inputs)",
            report.nodes.len(),
            report.failures.len()
        );
        finish(report, format, &options)
    }

    /// Convert and write to the output file, or stdout without one
    pub async fn convert_to_output(&self, output_override: Option<&str>) -> Result<()> {
        let produced = self.convert().await?;

        let Some(output_path) = output_override.or(self.config.output.as_deref()) else {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(produced.content.as_bytes())
                .await
                .context("Failed to write output to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
            return Ok(());
        };

        let expanded_path = expand_tilde(output_path);
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        tokio::fs::write(path, &produced.content)
            .await
            .with_context(|| format!("Failed to write output to {:?}", path))?;

        info!("Output written to {:?} ({})", path, produced.content_type);
        Ok(())
    }

    /// Read every source and decode each on the blocking pool.
    ///
    /// Reports are merged in source order. A source that cannot be read is
    /// skipped with a warning; failing all of them is an error.
    async fn decode_sources(&self) -> Result<DecodeReport> {
        let total = self.config.sources.len();
        let mut handles = Vec::with_capacity(total);

        for (index, source) in self.config.sources.iter().enumerate() {
            info!(
                "Reading source [{}/{}]: '{}' from {}",
                index + 1,
                total,
                source.name,
                source.url
            );
            match read_source(&source.url).await {
                Ok(content) => {
                    let handle = tokio::task::spawn_blocking(move || parse_subscription(&content));
                    handles.push((source.name.clone(), handle));
                }
                Err(e) => {
                    warn!("Failed to read source '{}': {:#}", source.name, e);
                }
            }
        }

        if handles.is_empty() {
            anyhow::bail!("None of the {} source(s) could be read", total);
        }

        let mut merged = DecodeReport::default();
        for (name, handle) in handles {
            let report = handle
                .await
                .with_context(|| format!("Decoding task for '{}' panicked", name))?
                .with_context(|| format!("Failed to decode source '{}'", name))?;
            debug!("Source '{}' decoded {} nodes", name, report.nodes.len());
            merged.merge(report);
        }
        Ok(merged)
    }
}
