//! Installer file naming

use regex::Regex;

use crate::{error::GupError, version::Version};

const VERSION_PLACEHOLDER: &str = "{version}";

/// File name pattern for installers, e.g. `StageInstrument-{version}-x64-Setup.msi`.
#[derive(Debug, Clone)]
pub struct ArtifactTemplate {
    prefix: String,
    suffix: String,
    matcher: Regex,
}

impl ArtifactTemplate {
    pub fn new(template: &str) -> Result<Self, GupError> {
        let (prefix, suffix) = template.split_once(VERSION_PLACEHOLDER).ok_or_else(|| {
            GupError::Config(format!(
                "artifact template '{}' must contain {}",
                template, VERSION_PLACEHOLDER
            ))
        })?;

        if suffix.contains(VERSION_PLACEHOLDER) {
            return Err(GupError::Config(format!(
                "artifact template '{}' contains {} more than once",
                template, VERSION_PLACEHOLDER
            )));
        }

        if template.contains(['/', '\\']) {
            return Err(GupError::Config(format!(
                "artifact template '{}' must be a plain file name",
                template
            )));
        }

        let pattern = format!(
            r"^{}(\d+(?:\.\d+)*){}$",
            regex::escape(prefix),
            regex::escape(suffix)
        );
        let matcher = Regex::new(&pattern)
            .map_err(|e| GupError::Config(format!("artifact template '{}': {}", template, e)))?;

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            matcher,
        })
    }

    pub fn file_name(&self, version: &Version) -> String {
        format!("{}{}{}", self.prefix, version, self.suffix)
    }

    /// Extracts the version text from a file name produced by this template.
    pub fn version_of<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        self.matcher
            .captures(file_name)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }
}
