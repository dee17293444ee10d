// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    UnknownProduct(String),
    UnknownStatus(String),
    SizeNotOffered { kind: ProductKind, size: String },
    SizeRequired(ProductKind),
    ShippingNotApplicable,
    MissingField(&'static str),
    InvalidEmail(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProduct(value) => write!(f, "unknown product kind `{value}`"),
            Self::UnknownStatus(value) => write!(f, "unknown order status `{value}`"),
            Self::SizeNotOffered { kind, size } => {
                write!(f, "size `{size}` is not offered for {kind}")
            }
            Self::SizeRequired(kind) => write!(f, "a size must be chosen for {kind}"),
            Self::ShippingNotApplicable => {
                f.write_str("digital orders carry no size or shipping address")
            }
            Self::MissingField(name) => write!(f, "{name} must not be empty"),
            Self::InvalidEmail(value) => write!(f, "`{value}` is not a valid email address"),
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Digital,
    Print,
    Canvas,
}

impl ProductKind {
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        match input {
            "digital" => Ok(Self::Digital),
            "print" => Ok(Self::Print),
            "canvas" => Ok(Self::Canvas),
            other => Err(ModelError::UnknownProduct(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Digital => "digital",
            Self::Print => "print",
            Self::Canvas => "canvas",
        }
    }

    #[must_use]
    pub const fn is_physical(self) -> bool {
        matches!(self, Self::Print | Self::Canvas)
    }
}

impl Display for ProductKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSpec {
    pub kind: ProductKind,
    pub external_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: i64,
    pub sizes: &'static [&'static str],
}

impl ProductSpec {
    /// A size is valid only when the product offers it; digital products
    /// never carry one.
    pub fn validate_size(&self, size: Option<&str>) -> Result<(), ModelError> {
        match (self.kind.is_physical(), size) {
            (false, None) => Ok(()),
            (false, Some(_)) => Err(ModelError::ShippingNotApplicable),
            (true, None) => Err(ModelError::SizeRequired(self.kind)),
            (true, Some(size)) => {
                if self.sizes.contains(&size) {
                    Ok(())
                } else {
                    Err(ModelError::SizeNotOffered {
                        kind: self.kind,
                        size: size.to_string(),
                    })
                }
            }
        }
    }
}

pub const PRODUCT_CATALOG: [ProductSpec; 3] = [
    ProductSpec {
        kind: ProductKind::Digital,
        external_id: "portrait-digital",
        name: "Download Digital",
        description: "Retrato digital em alta resolução, sem marca d'água",
        price_cents: 2900,
        sizes: &[],
    },
    ProductSpec {
        kind: ProductKind::Print,
        external_id: "portrait-print",
        name: "Fine Art Print",
        description: "Impressão fine art com cores vibrantes",
        price_cents: 8900,
        sizes: &["20x30cm", "30x40cm", "40x50cm"],
    },
    ProductSpec {
        kind: ProductKind::Canvas,
        external_id: "portrait-canvas",
        name: "Quadro Canvas",
        description: "Impressão em canvas com moldura inclusa",
        price_cents: 19900,
        sizes: &["30x40cm", "40x60cm", "50x70cm"],
    },
];

#[must_use]
pub fn product_spec(kind: ProductKind) -> &'static ProductSpec {
    match kind {
        ProductKind::Digital => &PRODUCT_CATALOG[0],
        ProductKind::Print => &PRODUCT_CATALOG[1],
        ProductKind::Canvas => &PRODUCT_CATALOG[2],
    }
}
