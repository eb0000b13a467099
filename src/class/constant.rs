//! The constant pool and its entries.
//!
//! Pool indices are 1-based. Due to a poor choice in the JVM specification, 8 byte constants must
//! take up 2 slots for indexing; the slot following a `Long` or `Double` holds a `Placeholder`
//! that is never addressable and is skipped on write.

use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::ClassError;

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELD_REF: u8 = 9;
pub const TAG_METHOD_REF: u8 = 10;
pub const TAG_INTERFACE_METHOD_REF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: ReferenceKind,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },

    /// The unaddressable slot following a `Long` or `Double`.
    Placeholder,
}

impl Constant {
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => TAG_UTF8,
            Constant::Integer(_) => TAG_INTEGER,
            Constant::Float(_) => TAG_FLOAT,
            Constant::Long(_) => TAG_LONG,
            Constant::Double(_) => TAG_DOUBLE,
            Constant::Class { .. } => TAG_CLASS,
            Constant::String { .. } => TAG_STRING,
            Constant::FieldRef { .. } => TAG_FIELD_REF,
            Constant::MethodRef { .. } => TAG_METHOD_REF,
            Constant::InterfaceMethodRef { .. } => TAG_INTERFACE_METHOD_REF,
            Constant::NameAndType { .. } => TAG_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => TAG_METHOD_HANDLE,
            Constant::MethodType { .. } => TAG_METHOD_TYPE,
            Constant::Dynamic { .. } => TAG_DYNAMIC,
            Constant::InvokeDynamic { .. } => TAG_INVOKE_DYNAMIC,
            Constant::Module { .. } => TAG_MODULE,
            Constant::Package { .. } => TAG_PACKAGE,
            Constant::Placeholder => 0,
        }
    }

    /// Whether this constant occupies two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    fn read<T: Read + Seek>(buffer: &mut T) -> Result<Self, ClassError> {
        Ok(match buffer.read_u8()? {
            TAG_UTF8 => {
                let length = buffer.read_u16::<BigEndian>()?;
                let mut bytes = vec![0u8; length as usize];
                buffer.read_exact(&mut bytes)?;

                match cesu8::from_java_cesu8(&bytes) {
                    Ok(text) => Constant::Utf8(text.into_owned()),
                    Err(_) => return Err(ClassError::pool("invalid modified UTF-8")),
                }
            }
            TAG_INTEGER => Constant::Integer(buffer.read_i32::<BigEndian>()?),
            TAG_FLOAT => Constant::Float(buffer.read_f32::<BigEndian>()?),
            TAG_LONG => Constant::Long(buffer.read_i64::<BigEndian>()?),
            TAG_DOUBLE => Constant::Double(buffer.read_f64::<BigEndian>()?),
            TAG_CLASS => Constant::Class {
                name_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_STRING => Constant::String {
                string_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_FIELD_REF => Constant::FieldRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_METHOD_REF => Constant::MethodRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name_index: buffer.read_u16::<BigEndian>()?,
                descriptor_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: match ReferenceKind::from_u8(buffer.read_u8()?) {
                    Some(kind) => kind,
                    None => return Err(ClassError::pool("reference kind out of bounds")),
                },
                reference_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType {
                descriptor_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_MODULE => Constant::Module {
                name_index: buffer.read_u16::<BigEndian>()?,
            },
            TAG_PACKAGE => Constant::Package {
                name_index: buffer.read_u16::<BigEndian>()?,
            },
            x => return Err(ClassError::pool(format!("unknown constant tag {}", x))),
        })
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        if let Constant::Placeholder = self {
            return Ok(());
        }

        buffer.write_u8(self.tag())?;
        match self {
            Constant::Utf8(text) => {
                let encoded = cesu8::to_java_cesu8(text);
                buffer.write_u16::<BigEndian>(encoded.len() as u16)?;
                buffer.write_all(&encoded)
            }
            Constant::Integer(value) => buffer.write_i32::<BigEndian>(*value),
            Constant::Float(value) => buffer.write_f32::<BigEndian>(*value),
            Constant::Long(value) => buffer.write_i64::<BigEndian>(*value),
            Constant::Double(value) => buffer.write_f64::<BigEndian>(*value),
            Constant::Class { name_index } => buffer.write_u16::<BigEndian>(*name_index),
            Constant::String { string_index } => buffer.write_u16::<BigEndian>(*string_index),
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                buffer.write_u16::<BigEndian>(*class_index)?;
                buffer.write_u16::<BigEndian>(*name_and_type_index)
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                buffer.write_u16::<BigEndian>(*name_index)?;
                buffer.write_u16::<BigEndian>(*descriptor_index)
            }
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                buffer.write_u8(*reference_kind as u8)?;
                buffer.write_u16::<BigEndian>(*reference_index)
            }
            Constant::MethodType { descriptor_index } => {
                buffer.write_u16::<BigEndian>(*descriptor_index)
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                buffer.write_u16::<BigEndian>(*bootstrap_method_attr_index)?;
                buffer.write_u16::<BigEndian>(*name_and_type_index)
            }
            Constant::Module { name_index } | Constant::Package { name_index } => {
                buffer.write_u16::<BigEndian>(*name_index)
            }
            Constant::Placeholder => unreachable!(),
        }
    }
}

/// An ordered constant table addressable by 1-based index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    items: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        ConstantPool { items: Vec::new() }
    }

    /// The number of occupied slots; the on-disk count is one greater.
    pub fn len(&self) -> u16 {
        self.items.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassError> {
        if index == 0 || index as usize > self.items.len() {
            return Err(ClassError::pool(format!(
                "index {} out of range (1..={})",
                index,
                self.items.len()
            )));
        }

        match &self.items[index as usize - 1] {
            Constant::Placeholder => Err(ClassError::pool(format!(
                "index {} hits the second slot of a long/double",
                index
            ))),
            constant => Ok(constant),
        }
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str, ClassError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(ClassError::pool(format!(
                "expected Utf8 at index {}, found tag {}",
                index,
                other.tag()
            ))),
        }
    }

    /// Resolves a `Class` constant down to the class name it refers to.
    pub fn get_class_name(&self, index: u16) -> Result<&str, ClassError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.get_utf8(*name_index),
            other => Err(ClassError::pool(format!(
                "expected Class at index {}, found tag {}",
                index,
                other.tag()
            ))),
        }
    }

    pub fn get_name_and_type(&self, index: u16) -> Result<(&str, &str), ClassError> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.get_utf8(*name_index)?, self.get_utf8(*descriptor_index)?)),
            other => Err(ClassError::pool(format!(
                "expected NameAndType at index {}, found tag {}",
                index,
                other.tag()
            ))),
        }
    }

    /// Adds a constant, reusing the index of a structurally equal entry if one exists. Long and
    /// double constants reserve the slot after the returned index.
    pub fn add(&mut self, constant: Constant) -> u16 {
        for (position, existing) in self.items.iter().enumerate() {
            if *existing == constant {
                return position as u16 + 1;
            }
        }

        let wide = constant.is_wide();
        self.items.push(constant);
        let index = self.items.len() as u16;

        if wide {
            self.items.push(Constant::Placeholder);
        }

        index
    }

    pub fn add_utf8(&mut self, text: impl Into<String>) -> u16 {
        self.add(Constant::Utf8(text.into()))
    }

    pub fn add_class(&mut self, name: impl Into<String>) -> u16 {
        let name_index = self.add_utf8(name);
        self.add(Constant::Class { name_index })
    }

    pub fn read<T: Read + Seek>(buffer: &mut T) -> Result<Self, ClassError> {
        let count = buffer.read_u16::<BigEndian>()?;
        let mut items = Vec::with_capacity(count as usize);

        let mut index = 1;
        while index < count {
            let constant = Constant::read(buffer)?;
            trace!("\t{}/{}: {:?}", index, count, &constant);

            if constant.is_wide() {
                items.push(constant);
                items.push(Constant::Placeholder);
                index += 2;
            } else {
                items.push(constant);
                index += 1;
            }
        }

        Ok(ConstantPool { items })
    }

    pub fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        buffer.write_u16::<BigEndian>(self.items.len() as u16 + 1)?;

        for constant in &self.items {
            constant.write(buffer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn add_deduplicates_by_structure() {
        let mut pool = ConstantPool::new();
        let first = pool.add_utf8("hello");
        let second = pool.add_utf8("hello");
        assert_eq!(first, second);

        let other = pool.add_utf8("world");
        assert_ne!(first, other);
    }

    #[test]
    fn wide_constants_reserve_a_slot() {
        let mut pool = ConstantPool::new();
        let long_index = pool.add(Constant::Long(42));
        let next = pool.add_utf8("after");

        assert_eq!(next, long_index + 2);
        assert!(pool.get(long_index).is_ok());
        assert!(pool.get(long_index + 1).is_err());
    }

    #[test]
    fn get_rejects_out_of_range() {
        let pool = ConstantPool::new();
        assert!(pool.get(0).is_err());
        assert!(pool.get(1).is_err());
    }

    #[test]
    fn class_name_resolution() {
        let mut pool = ConstantPool::new();
        let class_index = pool.add_class("java/lang/Object");
        assert_eq!(pool.get_class_name(class_index).unwrap(), "java/lang/Object");
    }

    #[test]
    fn round_trip() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("name");
        pool.add(Constant::Integer(-3));
        pool.add(Constant::Double(1.5));
        pool.add_class("java/lang/String");

        let mut bytes = Vec::new();
        pool.write(&mut Cursor::new(&mut bytes)).unwrap();

        let reread = ConstantPool::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(reread.len(), pool.len());
        assert_eq!(reread.get_utf8(1).unwrap(), "name");
        assert_eq!(reread.get(2).unwrap(), &Constant::Integer(-3));
        assert_eq!(reread.get(3).unwrap(), &Constant::Double(1.5));
        assert!(reread.get(4).is_err());
    }
}
