//! Typed ONNX node attributes.

/// Value of a single node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    String(String),
    Strings(Vec<String>),
}

impl AttributeValue {
    /// Name of the variant, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Int(_) => "int",
            AttributeValue::Ints(_) => "ints",
            AttributeValue::Float(_) => "float",
            AttributeValue::Floats(_) => "floats",
            AttributeValue::String(_) => "string",
            AttributeValue::Strings(_) => "strings",
        }
    }
}

/// Conversion from an [`AttributeValue`] into a concrete Rust type.
pub trait FromAttribute: Sized {
    /// Attribute type name this conversion accepts.
    const TYPE_NAME: &'static str;

    /// Returns `None` when `value` holds another variant.
    fn from_attribute(value: &AttributeValue) -> Option<Self>;
}

macro_rules! impl_attribute_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromAttribute for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_attribute(value: &AttributeValue) -> Option<Self> {
                    match value {
                        AttributeValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::$variant(value)
                }
            }
        )*
    };
}

impl_attribute_conversions! {
    i64 => Int, "int";
    Vec<i64> => Ints, "ints";
    f32 => Float, "float";
    Vec<f32> => Floats, "floats";
    String => String, "string";
    Vec<String> => Strings, "strings";
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}
