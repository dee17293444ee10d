#![forbid(unsafe_code)]

pub const CRATE_NAME: &str = "retrato-store";

mod customers;
mod db;
mod error;
mod generations;
mod media;
mod orders;

pub use db::Db;
pub use error::{StoreError, StoreErrorCode};
pub use media::{Bucket, MediaStore};
pub use orders::{
    AdminOrderUpdate, CustomerSummary, GenerationSummary, OrderPage, OrderWithContext,
};
