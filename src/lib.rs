//! Harp ONNX: lowering ONNX operators into harp computation graphs
//!
//! Operators arrive as [`onnx::Node`]s whose inputs are already bound to
//! nodes of a [`graph::Graph`]. A lowering appends the primitive nodes that
//! implement the operator and returns its outputs.
//!
//! # Architecture
//!
//! - **graph**: append-only arena graph with shape and type inference
//! - **builder**: composite builders, e.g. quantized linear convolution
//! - **onnx**: node abstraction, attribute helpers, operator lowerings and
//!   the operator registry
//!
//! # Example
//!
//! ```
//! use harp_onnx::prelude::*;
//!
//! let graph = Graph::new();
//! let x = graph.input("x", ElementType::U8, vec![1, 4, 8, 8]);
//! let x_scale = graph.input("x_scale", ElementType::F32, vec![]);
//! let x_zp = graph.input("x_zero_point", ElementType::U8, vec![]);
//! let w = graph.input("w", ElementType::I8, vec![4, 2, 3, 3]);
//! let w_scale = graph.input("w_scale", ElementType::F32, vec![]);
//! let w_zp = graph.input("w_zero_point", ElementType::I8, vec![]);
//! let y_scale = graph.input("y_scale", ElementType::F32, vec![]);
//! let y_zp = graph.input("y_zero_point", ElementType::I8, vec![]);
//!
//! let node = Node::new("QLinearConv")
//!     .with_name("conv")
//!     .with_attribute("group", 2i64)
//!     .with_input(x)
//!     .with_input(x_scale)
//!     .with_input(x_zp)
//!     .with_input(w)
//!     .with_input(w_scale)
//!     .with_input(w_zp)
//!     .with_input(y_scale)
//!     .with_input(y_zp);
//!
//! let outputs = OperatorRegistry::default().lower(&graph, &node, 10).unwrap();
//! assert_eq!(graph.shape(outputs[0]).unwrap(), vec![1, 4, 6, 6]);
//! ```

// ============================================================================
// Core Modules
// ============================================================================

pub mod builder;
pub mod error;
pub mod graph;
pub mod onnx;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{GraphError, ImportError, Result};
pub use graph::{ElementType, Graph, GraphOp, NodeId};
pub use onnx::{LoweringOptions, Node, OperatorRegistry};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module with commonly used types
pub mod prelude {
    // Graph
    pub use crate::graph::{ConvParams, ElementType, Graph, GraphOp, Literal, NodeId};

    // Errors
    pub use crate::error::{GraphError, ImportError};

    // Quantization builders
    pub use crate::builder::quantization::{ScaleBundle, ZeroPointBundle};

    // ONNX import
    pub use crate::onnx::op::quant_conv::{GroupedConvBuilder, LoweringPath};
    pub use crate::onnx::{AttributeValue, LoweringOptions, Node, OperatorRegistry};
}
