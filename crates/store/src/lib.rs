//! REST adapter for the split workflow engine.
//!
//! [`RestStore`] implements the core store traits against the dashboard
//! backend's resource API. Which resources it talks to is decided by a
//! [`ResourceProfile`]; the two shipped profiles cover the two places the
//! dashboard splits documents:
//!
//! - delivery notes split from a work order, and
//! - partial purchase orders split from a quotation.

pub mod profiles;
pub mod rest;

pub use profiles::ResourceProfile;
pub use rest::RestStore;
