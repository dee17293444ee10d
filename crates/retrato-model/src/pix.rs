// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Gateway vocabulary for a PIX charge, passed through to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixStatus {
    Pending,
    Expired,
    Cancelled,
    Paid,
    Refunded,
}

impl PixStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
            Self::Paid => "PAID",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl Display for PixStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
