//! Data types and structures for the GUP service

use serde::Deserialize;

use crate::{error::GupError, store::PendingArtifact, version::Version};

/// Whether clients must apply the update instead of offering it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceUpdate {
    Yes,
    #[default]
    No,
}

impl ForceUpdate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForceUpdate::Yes => "yes",
            ForceUpdate::No => "no",
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, ForceUpdate::Yes)
    }
}

impl std::str::FromStr for ForceUpdate {
    type Err = GupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" => Ok(ForceUpdate::Yes),
            "no" => Ok(ForceUpdate::No),
            _ => Err(GupError::InvalidForceFlag(s.to_string())),
        }
    }
}

impl std::fmt::Display for ForceUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The persisted server-side update state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub version: Version,
    pub force_update: ForceUpdate,
}

/// Query parameters for `/params`
#[derive(Deserialize, Debug)]
pub struct CheckParams {
    pub version: Option<String>,
}

/// Body of the `<GUP>` document returned to polling clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GupResponse {
    pub need_update: bool,
    pub need_force_update: bool,
    pub version: String,
    pub location: String,
}

/// Fields collected from a `/update` multipart request
#[derive(Debug, Default)]
pub struct PublishForm {
    pub version: Option<String>,
    pub force_update: Option<String>,
    pub installer: Option<PendingArtifact>,
}
