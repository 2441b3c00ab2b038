//! Configuration types for the doc2md pipeline.
//!
//! Two layers of configuration exist:
//!
//! * [`PipelineOptions`] — per-request switches carried on the wire
//!   (`ocrEnabled`, `preserveTables`, …). Unknown keys are rejected.
//! * [`OrchestratorConfig`] — process-wide settings fixed when the
//!   [`crate::PipelineOrchestrator`] is built (size limits, naming of
//!   derived output locations).

use crate::error::Doc2MdError;
use serde::{Deserialize, Serialize};

/// Per-request processing options.
///
/// # Example
/// ```rust
/// use doc2md::PipelineOptions;
///
/// let opts = PipelineOptions::builder()
///     .preserve_tables(false)
///     .generate_toc(true)
///     .build();
/// assert!(opts.ocr_enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Ask the parser to OCR pages without a text layer. Default: true.
    ///
    /// Forwarded to the parser only; the core does not inspect it.
    pub ocr_enabled: bool,

    /// Keep tables as GFM tables. Default: true.
    ///
    /// When false, table blocks are flattened to plain-text rows before
    /// rendering. Table counts in the report are unaffected.
    pub preserve_tables: bool,

    /// Run the Markdown optimiser. Default: true.
    ///
    /// When false the raw rendering passes through unchanged and
    /// `appliedRules` is empty.
    pub markdown_optimization: bool,

    /// Prepend a generated table of contents. Default: false.
    pub generate_toc: bool,

    /// Prepend YAML front matter (title, pages, tables). Default: false.
    pub add_metadata_header: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            preserve_tables: true,
            markdown_optimization: true,
            generate_toc: false,
            add_metadata_header: false,
        }
    }
}

impl PipelineOptions {
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`PipelineOptions`]. Every combination of switches is valid,
/// so `build` cannot fail.
#[derive(Debug)]
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.options.ocr_enabled = v;
        self
    }

    pub fn preserve_tables(mut self, v: bool) -> Self {
        self.options.preserve_tables = v;
        self
    }

    pub fn markdown_optimization(mut self, v: bool) -> Self {
        self.options.markdown_optimization = v;
        self
    }

    pub fn generate_toc(mut self, v: bool) -> Self {
        self.options.generate_toc = v;
        self
    }

    pub fn add_metadata_header(mut self, v: bool) -> Self {
        self.options.add_metadata_header = v;
        self
    }

    pub fn build(self) -> PipelineOptions {
        self.options
    }
}

/// Settings shared by every run of one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Reject sources larger than this many bytes. Default: 256 MiB.
    pub max_source_bytes: u64,

    /// Extension given to a derived Markdown location. Default: `.md`.
    pub markdown_extension: String,

    /// Suffix given to a derived metadata location. Default: `.metadata.json`.
    pub metadata_suffix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 256 * 1024 * 1024,
            markdown_extension: ".md".to_string(),
            metadata_suffix: ".metadata.json".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Debug)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn max_source_bytes(mut self, n: u64) -> Self {
        self.config.max_source_bytes = n;
        self
    }

    pub fn markdown_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.markdown_extension = ext.into();
        self
    }

    pub fn metadata_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.metadata_suffix = suffix.into();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<OrchestratorConfig, Doc2MdError> {
        let c = &self.config;
        if c.max_source_bytes == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "max_source_bytes must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("markdown_extension", &c.markdown_extension),
            ("metadata_suffix", &c.metadata_suffix),
        ] {
            if !value.starts_with('.') || value.len() < 2 || value.contains('/') {
                return Err(Doc2MdError::InvalidConfig(format!(
                    "{name} must look like '.ext' (got '{value}')"
                )));
            }
        }
        if c.markdown_extension == c.metadata_suffix {
            return Err(Doc2MdError::InvalidConfig(
                "markdown_extension and metadata_suffix must differ".into(),
            ));
        }
        Ok(self.config)
    }
}
