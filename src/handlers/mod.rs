//! Request handlers.

pub mod redirect;
