//! Update decision for a polling client

use std::cmp::Ordering;

use crate::{
    error::GupError,
    types::ForceUpdate,
    version::{Version, VersionFormat, compare},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateDecision {
    pub need_update: bool,
    pub need_force_update: bool,
}

impl UpdateDecision {
    /// An update is offered only when the server is strictly newer, and it is
    /// forced only when it is offered.
    pub fn evaluate(server: &Version, client: &Version, force: ForceUpdate) -> Self {
        let need_update = compare(server, client) == Ordering::Greater;
        Self {
            need_update,
            need_force_update: need_update && force.is_forced(),
        }
    }

    pub fn evaluate_raw(
        format: VersionFormat,
        server: &str,
        client: &str,
        force: ForceUpdate,
    ) -> Result<Self, GupError> {
        let server = format.parse(server)?;
        let client = format.parse(client)?;
        Ok(Self::evaluate(&server, &client, force))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(server: &str, client: &str, force: ForceUpdate) -> UpdateDecision {
        UpdateDecision::evaluate_raw(VersionFormat::default(), server, client, force).unwrap()
    }

    #[test]
    fn test_newer_server_needs_update() {
        assert_eq!(
            eval("2.0.0", "1.0.0", ForceUpdate::No),
            UpdateDecision {
                need_update: true,
                need_force_update: false,
            }
        );
        assert_eq!(
            eval("2.0.0", "1.0.0", ForceUpdate::Yes),
            UpdateDecision {
                need_update: true,
                need_force_update: true,
            }
        );
    }

    #[test]
    fn test_equal_versions_never_force() {
        assert_eq!(
            eval("1.0.0", "1.0.0", ForceUpdate::Yes),
            UpdateDecision {
                need_update: false,
                need_force_update: false,
            }
        );
    }

    #[test]
    fn test_newer_client_needs_nothing() {
        assert_eq!(
            eval("1.0.0", "1.2.0", ForceUpdate::Yes),
            UpdateDecision {
                need_update: false,
                need_force_update: false,
            }
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        let format = VersionFormat::default();
        assert!(matches!(
            UpdateDecision::evaluate_raw(format, "2.0.0", "not-a-version", ForceUpdate::No),
            Err(GupError::InvalidVersion(_))
        ));
        assert!(matches!(
            UpdateDecision::evaluate_raw(format, "-1", "1.0.0", ForceUpdate::No),
            Err(GupError::InvalidVersion(_))
        ));
        assert!(UpdateDecision::evaluate_raw(format, "2.0", "1.0.0", ForceUpdate::No).is_err());
    }
}
