use std::cell::RefCell;

use crate::{
    error::GraphError,
    graph::{
        dtype::{ElementType, Literal},
        node::{NodeData, NodeId},
        op::GraphOp,
    },
};

/// Owns all the nodes of a computation graph.
///
/// The `Graph` uses interior mutability (`RefCell`) so that lowering code can
/// append nodes through a shared reference. Nodes are never removed or
/// rewritten once added, so every `NodeId` stays valid for the graph's lifetime.
#[derive(Default, Debug)]
pub struct Graph {
    /// A vector holding the data for all nodes in the graph.
    pub nodes: RefCell<Vec<NodeData>>,
    /// A list of node IDs that are considered inputs to the graph.
    pub inputs: RefCell<Vec<NodeId>>,
    /// A list of node IDs that are considered outputs of the graph.
    pub outputs: RefCell<Vec<NodeId>>,
}

impl Graph {
    /// Creates a new, empty computation graph.
    pub fn new() -> Self {
        Graph {
            nodes: RefCell::new(Vec::new()),
            inputs: RefCell::new(Vec::new()),
            outputs: RefCell::new(Vec::new()),
        }
    }

    /// Appends a node without any inference. Callers are responsible for
    /// `dtype` and `shape` being consistent with `op` and `src`.
    pub fn add_node(
        &self,
        op: GraphOp,
        src: Vec<NodeId>,
        dtype: ElementType,
        shape: Vec<usize>,
    ) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(NodeData {
            op,
            src,
            dtype,
            shape,
        });
        NodeId(id)
    }

    /// Adds a new input node to the graph.
    ///
    /// # Arguments
    ///
    /// * `name` - The name the tensor is bound to at execution time.
    /// * `dtype` - The element type of the input tensor.
    /// * `shape` - The shape of the input tensor; empty for a scalar.
    pub fn input(&self, name: impl Into<String>, dtype: ElementType, shape: Vec<usize>) -> NodeId {
        let id = self.add_node(
            GraphOp::Input { name: name.into() },
            vec![],
            dtype,
            shape,
        );
        self.inputs.borrow_mut().push(id);
        id
    }

    /// Creates a tensor of the given shape filled with one value.
    pub fn constant(
        &self,
        value: impl Into<Literal>,
        dtype: ElementType,
        shape: Vec<usize>,
    ) -> NodeId {
        self.add_node(GraphOp::Constant(value.into()), vec![], dtype, shape)
    }

    /// Marks an existing node as a graph output.
    pub fn add_output(&self, id: NodeId) -> Result<(), GraphError> {
        self.check(id)?;
        self.outputs.borrow_mut().push(id);
        Ok(())
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        if id.0 < self.nodes.borrow().len() {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id))
        }
    }

    /// Returns a copy of the node's data.
    pub fn node(&self, id: NodeId) -> Result<NodeData, GraphError> {
        self.nodes
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(GraphError::UnknownNode(id))
    }

    /// Element type and shape of a node.
    pub(crate) fn meta(&self, id: NodeId) -> Result<(ElementType, Vec<usize>), GraphError> {
        let nodes = self.nodes.borrow();
        let node = nodes.get(id.0).ok_or(GraphError::UnknownNode(id))?;
        Ok((node.dtype, node.shape.clone()))
    }

    pub fn dtype(&self, id: NodeId) -> Result<ElementType, GraphError> {
        self.meta(id).map(|(dtype, _)| dtype)
    }

    pub fn shape(&self, id: NodeId) -> Result<Vec<usize>, GraphError> {
        self.meta(id).map(|(_, shape)| shape)
    }

    pub fn op(&self, id: NodeId) -> Result<GraphOp, GraphError> {
        self.node(id).map(|node| node.op)
    }

    pub fn sources(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.node(id).map(|node| node.src)
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn inputs(&self) -> Vec<NodeId> {
        self.inputs.borrow().clone()
    }

    pub fn outputs(&self) -> Vec<NodeId> {
        self.outputs.borrow().clone()
    }

    /// Counts the nodes whose operation satisfies `predicate`.
    pub fn count_ops(&self, predicate: impl Fn(&GraphOp) -> bool) -> usize {
        self.nodes
            .borrow()
            .iter()
            .filter(|node| predicate(&node.op))
            .count()
    }
}
