//! LeiA keyed integrity functions
//!
//! The protocol needs one primitive: a keyed function that folds a 64-bit key
//! and a short list of 64-bit context fields into a 64-bit tag. The same
//! family derives session keys, tags data frames and tags epoch
//! announcements.
//!
//! # Design
//!
//! All functions in this crate are pure. The protocol engine is generic over
//! [`IntegrityFunction`], so the reference additive combiner can be swapped
//! for [`HmacSha256Mac`] without touching the state machine.
//!
//! # Security Properties
//!
//! - [`AdditiveMac`] is a placeholder with no cryptographic strength. It
//!   exists for interoperability with the reference firmware and for tests.
//! - [`HmacSha256Mac`] truncates HMAC-SHA-256 to 64 bits.
//! - [`tags_equal`] compares tags in constant time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod hmac_sha256;
pub mod integrity;

pub use hmac_sha256::HmacSha256Mac;
pub use integrity::{AdditiveMac, IntegrityFunction, tags_equal};
