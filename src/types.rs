//! The value type lattice used throughout the crate. Field and method descriptors parse into
//! these, instruction operands resolve to them, and the trace engine propagates them through
//! abstract frames as verification types.

use std::fmt::{self, Display, Formatter};

/// A JVM value type, extended with the verification-only markers (`top`, `null`,
/// `uninitializedThis`, `uninitialized(offset)` and return addresses) so a single lattice serves
/// descriptors, instruction operands and abstract frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Byte,
    Short,
    Char,

    /// The unusable type; also the reserved upper slot of a category 2 value.
    Top,
    /// The type of `aconst_null`, assignable to any reference type.
    Null,
    /// `this` before the `<init>` call in an instance initializer.
    UninitializedThis,
    /// The result of a `new` at the given bytecode offset, until its `<init>` runs.
    Uninitialized(u16),
    /// The address pushed by `jsr`, identified by the labels of the blocks it may return to.
    /// Multiple labels appear when call sites sharing a subroutine merge.
    ReturnAddress(Vec<u32>),

    /// A class or interface type by internal name, e.g. `java/lang/String`.
    Class(String),
    /// An array type with the given element type and dimension.
    Array { element: Box<Type>, dimension: u8 },

    /// Only valid in the return position of a method descriptor.
    Void,
}

impl Type {
    pub fn class(name: impl Into<String>) -> Self {
        Type::Class(name.into())
    }

    pub fn array(element: Type, dimension: u8) -> Self {
        debug_assert!(dimension >= 1);
        Type::Array {
            element: Box::new(element),
            dimension,
        }
    }

    pub fn return_address(label: u32) -> Self {
        Type::ReturnAddress(vec![label])
    }

    /// The computational category: 2 for `long` and `double` (two slots), 1 for everything else.
    pub fn category(&self) -> u8 {
        match self {
            Type::Long | Type::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Null
                | Type::Class(_)
                | Type::Array { .. }
                | Type::UninitializedThis
                | Type::Uninitialized(_)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Null | Type::Array { .. })
    }

    pub fn is_class_or_interface(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    /// Folds the int-like primitives down to `int`, the only form they take on the operand stack
    /// and in local variables.
    pub fn to_verification_type(&self) -> Type {
        match self {
            Type::Boolean | Type::Byte | Type::Short | Type::Char => Type::Int,
            other => other.clone(),
        }
    }

    /// The element type exposed by loading from an array of this type, with the dimension reduced
    /// by one: `int[][]` yields `int[]` and `int[]` yields `int`.
    pub fn array_element(&self) -> Option<Type> {
        match self {
            Type::Array { element, dimension } if *dimension > 1 => {
                Some(Type::array((**element).clone(), dimension - 1))
            }
            Type::Array { element, .. } => Some((**element).clone()),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Short => write!(f, "short"),
            Type::Char => write!(f, "char"),
            Type::Top => write!(f, "top"),
            Type::Null => write!(f, "null"),
            Type::UninitializedThis => write!(f, "uninitializedThis"),
            Type::Uninitialized(offset) => write!(f, "uninitialized(offset={})", offset),
            Type::ReturnAddress(labels) => {
                write!(f, "returnAddress(")?;
                for (index, label) in labels.iter().enumerate() {
                    if index > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", label)?;
                }
                write!(f, ")")
            }
            Type::Class(name) => write!(f, "{}", name),
            Type::Array { element, dimension } => {
                write!(f, "{}", element)?;
                for _ in 0..*dimension {
                    write!(f, "[]")?;
                }
                Ok(())
            }
            Type::Void => write!(f, "void"),
        }
    }
}

lazy_static::lazy_static! {
    pub static ref OBJECT: Type = Type::class("java/lang/Object");
    pub static ref THROWABLE: Type = Type::class("java/lang/Throwable");
    pub static ref STRING: Type = Type::class("java/lang/String");
    pub static ref CLASS: Type = Type::class("java/lang/Class");
    pub static ref METHOD_TYPE: Type = Type::class("java/lang/invoke/MethodType");
    pub static ref METHOD_HANDLE: Type = Type::class("java/lang/invoke/MethodHandle");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(Type::Long.category(), 2);
        assert_eq!(Type::Double.category(), 2);
        assert_eq!(Type::Int.category(), 1);
        assert_eq!(OBJECT.category(), 1);
        assert_eq!(Type::array(Type::Double, 1).category(), 1);
    }

    #[test]
    fn verification_type_folds_int_likes() {
        assert_eq!(Type::Boolean.to_verification_type(), Type::Int);
        assert_eq!(Type::Char.to_verification_type(), Type::Int);
        assert_eq!(Type::Long.to_verification_type(), Type::Long);
        assert_eq!(OBJECT.to_verification_type(), *OBJECT);
    }

    #[test]
    fn array_element_peels_one_dimension() {
        let matrix = Type::array(Type::Int, 2);
        assert_eq!(matrix.array_element(), Some(Type::array(Type::Int, 1)));
        assert_eq!(Type::array(Type::Int, 1).array_element(), Some(Type::Int));
        assert_eq!(Type::Int.array_element(), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Type::array(Type::Int, 2).to_string(), "int[][]");
        assert_eq!(Type::Uninitialized(7).to_string(), "uninitialized(offset=7)");
        assert_eq!(OBJECT.to_string(), "java/lang/Object");
    }
}
