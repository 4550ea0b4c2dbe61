//! # foldbatch Core Library
//!
//! A resumable batch pipeline that turns curated protein point mutations into per-mutation
//! free-energy change (ddG) estimates by driving an external repair-and-mutagenesis engine
//! (FoldX-compatible command line) over a partitioned workload.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout so that every stateful step can be tested in
//! isolation from the filesystem conventions and the external program it drives.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MutationRecord`, `MutationKey`),
//!   residue code tables, pure artifact naming, and the tabular, structure, and report I/O.
//!
//! - **[`engine`]: The Logic Core.** The stateful pieces of a worker session: the
//!   completed-work ledger, the repair cache, the mutation evaluator, the checkpoint writer,
//!   and the seam to the external engine.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the two layers below:
//!   partitioning a mutation table into worker chunks, running a resumable worker session,
//!   and reporting a worker's progress.

pub mod core;
pub mod engine;
pub mod workflows;
