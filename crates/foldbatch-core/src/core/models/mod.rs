//! Data models for mutations and their computed results.

pub mod mutation;
pub mod residue;
