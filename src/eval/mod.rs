//! Concrete implementors of the [`Evaluator`](crate::trace::Evaluator) contract.
//!
//! The tuner itself never reaches into this module beyond the trait: everything
//! here exists to give the dataset loader and the worked examples something to
//! run against.

pub mod reference;

pub use reference::ReferenceEval;
