//! Flow-sensitive tracking of reflection-relevant values
//!
//! This module implements the forward analysis over a method body:
//! - Control Flow Graph model and builder, including exception regions
//! - Value-set lattice with inline singletons
//! - Classification of operands into lattice values
//! - A single reverse-postorder pass that enforces annotations at use sites

mod cfg;
mod classifier;
mod lattice;
mod solver;
mod value;

pub use cfg::{
    AnalysisUnit, BasicBlock, BlockId, CfgBuilder, ControlFlowGraph, ExceptionRegion, GenericInstantiation,
    Invocation, Operand, Operation, RegionKind, Slot, Statement, TypeArgument,
};
pub use classifier::ValueClassifier;
pub use lattice::{Iter, SlotState, ValueSet};
pub use solver::{DataflowDriver, DataflowResult};
pub use value::{AnnotatedValue, LatticeValue, MultiValue};
