#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "retrato-model";

mod customer;
mod generation;
mod money;
mod order;
mod pix;
mod product;

pub use customer::{Customer, CustomerDraft};
pub use generation::{Generation, GenerationStatus, PortraitStyle};
pub use money::format_brl;
pub use order::{Order, OrderStatus, ShippingAddress};
pub use pix::PixStatus;
pub use product::{product_spec, ModelError, ProductKind, ProductSpec, PRODUCT_CATALOG};
