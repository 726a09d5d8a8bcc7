//! # Birth Intervals: Optimal Birth Decisions in a Life-History Model
//!
//! Computes, for every combination of a mother's age and her family composition,
//! whether giving birth this year maximizes expected reproductive value, using
//! **stochastic dynamic programming** (backward induction iterated to a fixed
//! point on the population growth rate). The resulting decisions then drive an
//! exact **forward projection** of the population distribution, from which
//! growth rates and birth-interval statistics are measured.
//!
//! ## Algorithm overview
//!
//! | Phase | Rust module | Description |
//! |-------|-------------|-------------|
//! | 0 | [`phase0_tables`] | Build static lookup tables: catalog dimensions, next-year family index with and without a birth, reachable state space |
//! | 1 | [`state_computation`] | Backward iteration: per state, birth vs. no-birth fitness over all survival outcomes; normalise by F[0][0]; repeat until the growth rate `r` settles |
//! | 2 | [`density::forward`] | Forward projection: push probability mass through the same transitions under the decision table |
//! | 3 | [`statistics`] | Birth intervals and life-table frequencies of the projected population |
//!
//! Both solvers enumerate one year's outcomes with
//! [`density::transitions::compute_transitions`]: every subset of surviving
//! children ([`subsets`]), mother alive or dead, newborn alive or dead, with
//! probabilities from the Siler-based [`survival`] model.
//!
//! ## State representation
//!
//! A state S = (a, f) where:
//! - `a` ∈ [0, motherArrayMax]: years since the mother matured; `motherArrayMax`
//!   is the absorbing "mother has died" row
//! - `f`: index of the family composition in the [`catalog::FamilyCatalog`]
//!
//! Compositions are [`types::AgeSet`] bit-sets of child ages. Flat index:
//! `state_index(a, f) = a * numFamilies + f`, so each mother age is one
//! contiguous row that a rayon worker can own.

#![allow(clippy::needless_range_loop)]

pub mod batch;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod density;
pub mod env_config;
pub mod errors;
pub mod phase0_tables;
pub mod run;
pub mod state_computation;
pub mod statistics;
pub mod storage;
pub mod subsets;
pub mod survival;
pub mod types;
