//! ONNX operator import.
//!
//! Nodes arrive with their inputs already bound to graph nodes; each
//! operator lowering appends the nodes that implement it and returns the
//! node's outputs.

pub mod attribute;
pub mod convpool;
pub mod node;
pub mod op;
pub mod options;
pub mod registry;

pub use attribute::{AttributeValue, FromAttribute};
pub use node::Node;
pub use options::LoweringOptions;
pub use registry::{LowerFn, OperatorRegistry};
