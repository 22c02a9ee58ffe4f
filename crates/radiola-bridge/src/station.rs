use serde::{Deserialize, Serialize};

/// Errors raised while resolving or validating stations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StationError {
    /// No station is registered under the requested code.
    #[error("station {0:?} not found")]
    NotFound(String),
    /// The station code or definition is malformed.
    #[error("invalid station: {0}")]
    Invalid(String),
}

/// A live radio station that can be tuned in by its short code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Station {
    /// Short code typed on the command line, e.g. `reso`.
    pub name: String,
    /// Human-readable description shown in listings.
    #[serde(default)]
    pub description: String,
    /// Live stream endpoint handed to the decoder.
    pub url: String,
}

impl Station {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
        }
    }

    /// Checks that the station can be looked up and played.
    pub fn validate(&self) -> Result<(), StationError> {
        if self.name.trim().is_empty() {
            return Err(StationError::Invalid(
                "station name cannot be empty".to_string(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(StationError::Invalid(format!(
                "station {:?} has an empty URL",
                self.name
            )));
        }
        Ok(())
    }

    /// Description when present, otherwise the code.
    pub fn display_name(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}
