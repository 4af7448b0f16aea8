//! Response payload helpers

pub mod base64;
