//! cslmp - CSL aircraft model resolution and multiplayer frame scheduling

pub mod core;
pub mod asset;
pub mod csl;
pub mod render;
