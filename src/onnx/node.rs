use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    error::{GraphError, ImportError, Result},
    graph::NodeId,
    onnx::attribute::{AttributeValue, FromAttribute},
};

/// An ONNX operator node whose inputs are already bound to graph nodes.
///
/// Inputs are positional. An ONNX input with an empty name is kept as `None`
/// so that later operands keep their positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    name: String,
    op_type: String,
    domain: String,
    inputs: Vec<Option<NodeId>>,
    attributes: FxHashMap<String, AttributeValue>,
}

impl Node {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_input(mut self, input: NodeId) -> Self {
        self.inputs.push(Some(input));
        self
    }

    /// Appends an input slot that may be empty.
    pub fn with_optional_input(mut self, input: Option<NodeId>) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Operator domain; empty for the default ONNX domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn inputs(&self) -> &[Option<NodeId>] {
        &self.inputs
    }

    /// The input at `index`, which must exist and be non-null.
    pub fn input(&self, index: usize) -> Result<NodeId> {
        match self.inputs.get(index) {
            Some(Some(id)) => Ok(*id),
            Some(None) => {
                Err(self.invalid_argument(format!("input {index} is required but empty")))
            }
            None => Err(self.invalid_argument(format!(
                "input {index} is required but the node has {} inputs",
                self.inputs.len()
            ))),
        }
    }

    /// The input at `index` if present and non-null.
    pub fn optional_input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied().flatten()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Looks up an attribute, failing if it holds a different type.
    pub fn get_attribute<T: FromAttribute>(&self, name: &str) -> Result<Option<T>> {
        let Some(value) = self.attributes.get(name) else {
            return Ok(None);
        };
        T::from_attribute(value)
            .map(Some)
            .ok_or_else(|| ImportError::AttributeType {
                node: self.to_string(),
                name: name.to_string(),
                expected: T::TYPE_NAME,
                found: value.type_name(),
            })
    }

    /// Looks up an attribute, falling back to `default` when absent.
    pub fn get_attribute_value<T: FromAttribute>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.get_attribute(name)?.unwrap_or(default))
    }

    pub fn invalid_argument(&self, message: impl Into<String>) -> ImportError {
        ImportError::InvalidArgument {
            node: self.to_string(),
            message: message.into(),
        }
    }

    pub fn not_supported(&self, message: impl Into<String>) -> ImportError {
        ImportError::NotSupported {
            node: self.to_string(),
            message: message.into(),
        }
    }

    /// Attaches this node's identity to a graph construction failure.
    pub fn graph_error(&self, source: GraphError) -> ImportError {
        ImportError::Graph {
            node: self.to_string(),
            source,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Node({}): {}>", self.op_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let node = Node::new("QLinearConv").with_name("conv1");
        assert_eq!(node.to_string(), "<Node(QLinearConv): conv1>");
    }

    #[test]
    fn test_positional_inputs() {
        let node = Node::new("QLinearConv")
            .with_input(NodeId(0))
            .with_optional_input(None)
            .with_input(NodeId(2));

        assert_eq!(node.inputs().len(), 3);
        assert_eq!(node.input(0).unwrap(), NodeId(0));
        assert_eq!(node.input(2).unwrap(), NodeId(2));
        assert_eq!(node.optional_input(1), None);
        assert_eq!(node.optional_input(5), None);
        assert!(node.input(1).unwrap_err().to_string().contains("empty"));
        assert!(node.input(3).unwrap_err().to_string().contains("has 3 inputs"));
    }

    #[test]
    fn test_attribute_default() {
        let node = Node::new("QLinearConv").with_attribute("group", 2i64);
        assert_eq!(node.get_attribute_value("group", 1i64).unwrap(), 2);
        assert_eq!(node.get_attribute_value("missing", 1i64).unwrap(), 1);
        assert!(node.has_attribute("group"));
    }

    #[test]
    fn test_attribute_type_mismatch() {
        let node = Node::new("QLinearConv")
            .with_name("conv")
            .with_attribute("group", 2.0f32);
        let err = node.get_attribute_value("group", 1i64).unwrap_err();
        assert_eq!(
            err,
            ImportError::AttributeType {
                node: "<Node(QLinearConv): conv>".to_string(),
                name: "group".to_string(),
                expected: "int",
                found: "float",
            }
        );
    }
}
