//! Arena computation graph that lowered operators are built into.

pub mod conv;
pub mod dtype;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod node;
pub mod op;
pub mod ops;

pub use conv::ConvParams;
pub use dtype::{ElementType, Literal};
pub use graph::Graph;
pub use node::{NodeData, NodeId};
pub use op::{GraphOp, RoundMode};
