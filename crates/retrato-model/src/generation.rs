// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use retrato_core::GenerationId;
use serde::{Deserialize, Serialize};

use crate::product::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortraitStyle {
    Renaissance,
    Baroque,
    Victorian,
}

impl PortraitStyle {
    /// Unknown style input falls back to the default style rather than
    /// failing the upload.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        match input {
            "baroque" => Self::Baroque,
            "victorian" => Self::Victorian,
            _ => Self::Renaissance,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Renaissance => "renaissance",
            Self::Baroque => "baroque",
            Self::Victorian => "victorian",
        }
    }
}

impl Display for PortraitStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Generating,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        match input {
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Display for GenerationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One AI-rendered portrait: the uploaded original, the clean render and the
/// watermarked preview, plus where the pipeline currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generation {
    pub id: GenerationId,
    pub style: PortraitStyle,
    pub status: GenerationStatus,
    pub original_path: String,
    pub generated_path: Option<String>,
    pub watermarked_path: Option<String>,
    pub created_at: DateTime<Utc>,
}
