//! API Module - Admin Surface
//!
//! Thin synchronous request/response calls exposed to the admin-command
//! collaborator. No state machine of its own; everything delegates to the
//! policy store and the raid detector.

pub mod admin;
