//! Population density projection under a fixed decision table.
//!
//! Instead of simulating individual mothers, this module pushes the exact
//! probability mass of every (mother age, family composition) state forward one
//! year at a time, using the same transition enumeration as the backward solver.

pub mod forward;
pub mod transitions;
