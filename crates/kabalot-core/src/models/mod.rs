//! Configuration and invoice record models.

pub mod config;
pub mod invoice;
