//! Types shared between the database layer, the REST handlers and clients.

pub mod api;
pub mod models;
pub mod price;
pub mod validation;

pub use models::{AgeRange, Category, Condition, ListingStatus, Location, UnknownVariant};
pub use price::{Price, PriceError};
