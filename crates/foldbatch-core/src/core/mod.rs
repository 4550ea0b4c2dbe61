//! # Core Module
//!
//! Stateless building blocks shared by every stage of the batch pipeline.
//!
//! - **Data Models** ([`models`]) - Residue codes, mutation identities, input and result records
//! - **Artifact Naming** ([`naming`]) - Pure mapping from a protein and artifact kind to a filename
//! - **File I/O** ([`io`]) - Mutation tables, structure conversion, and engine report parsing

pub mod io;
pub mod models;
pub mod naming;
