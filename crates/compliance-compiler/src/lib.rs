// SPDX-License-Identifier: MIT OR Apache-2.0
//! Applicability evaluator (C7) and regulatory plan compiler (C6).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod applicability;
pub mod compiler;

pub use applicability::{evaluate, parse, parse_and_evaluate, Expr};
pub use compiler::{compile, CompiledObligation, CompiledPlan};
