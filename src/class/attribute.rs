//! The `Code` attribute and the attributes that live inside it, most importantly the
//! `StackMapTable` codec the verifier reads and emits.

use std::io::{Cursor, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;

use crate::class::constant::ConstantPool;
use crate::class::BufferedRead;
use crate::error::ClassError;
use crate::instruction::{self, class_constant_name, class_constant_type, Instruction};
use crate::types::Type;

/// An attribute kept in its raw form: name plus uninterpreted bytes. Anything this crate does
/// not model round-trips through this so writing preserves it bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.get_utf8(self.name_index)
    }
}

impl BufferedRead for AttributeInfo {
    fn read<T: Read + Seek>(buffer: &mut T) -> std::io::Result<Self> {
        let name_index = buffer.read_u16::<BigEndian>()?;
        let length = buffer.read_u32::<BigEndian>()?;

        let mut info = vec![0u8; length as usize];
        buffer.read_exact(&mut info)?;

        Ok(AttributeInfo { name_index, info })
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> std::io::Result<()> {
        buffer.write_u16::<BigEndian>(self.name_index)?;
        buffer.write_u32::<BigEndian>(self.info.len() as u32)?;
        buffer.write_all(&self.info)
    }
}

/// A protected region of a method and its handler. `catch_type` of `None` catches everything
/// (a `finally` range).
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRange {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<Type>,
}

impl ExceptionRange {
    fn read<T: Read + Seek>(pool: &ConstantPool, buffer: &mut T) -> Result<Self, ClassError> {
        let start_pc = buffer.read_u16::<BigEndian>()?;
        let end_pc = buffer.read_u16::<BigEndian>()?;
        let handler_pc = buffer.read_u16::<BigEndian>()?;

        let catch_type = match buffer.read_u16::<BigEndian>()? {
            0 => None,
            index => Some(class_constant_type(pool.get_class_name(index)?)?),
        };

        Ok(ExceptionRange {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }

    fn write<T: Write + Seek>(
        &self,
        pool: &mut ConstantPool,
        buffer: &mut T,
    ) -> Result<(), ClassError> {
        buffer.write_u16::<BigEndian>(self.start_pc)?;
        buffer.write_u16::<BigEndian>(self.end_pc)?;
        buffer.write_u16::<BigEndian>(self.handler_pc)?;

        let index = match &self.catch_type {
            None => 0,
            Some(type_) => pool.add_class(class_constant_name(type_)),
        };
        buffer.write_u16::<BigEndian>(index)?;
        Ok(())
    }
}

/// The decoded `Code` attribute of a method.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<(u32, Instruction)>,
    /// Length of the code array as originally read; exception ranges may end here.
    pub code_length: u32,
    pub exception_table: Vec<ExceptionRange>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub const NAME: &'static str = "Code";

    pub fn read(pool: &ConstantPool, bytes: &[u8]) -> Result<Self, ClassError> {
        let mut buffer = Cursor::new(bytes);

        let max_stack = buffer.read_u16::<BigEndian>()?;
        let max_locals = buffer.read_u16::<BigEndian>()?;

        let code_length = buffer.read_u32::<BigEndian>()?;
        let mut code = vec![0u8; code_length as usize];
        buffer.read_exact(&mut code)?;

        let exception_count = buffer.read_u16::<BigEndian>()?;
        let mut exception_table = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            exception_table.push(ExceptionRange::read(pool, &mut buffer)?);
        }

        let attributes = <Vec<AttributeInfo>>::read(&mut buffer)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code: instruction::read_code(pool, &code)?,
            code_length,
            exception_table,
            attributes,
        })
    }

    /// Re-encodes the attribute payload. Instruction offsets may shift; the exception table is
    /// remapped along with them.
    pub fn write(&self, pool: &mut ConstantPool) -> Result<Vec<u8>, ClassError> {
        let mut out = Cursor::new(Vec::new());
        out.write_u16::<BigEndian>(self.max_stack)?;
        out.write_u16::<BigEndian>(self.max_locals)?;

        let (code, mapping) = instruction::write_code(pool, &self.code, self.code_length)?;
        out.write_u32::<BigEndian>(code.len() as u32)?;
        out.write_all(&code)?;

        let remap = |pc: u16| -> Result<u16, ClassError> {
            mapping.get(&(pc as u32)).map(|new| *new as u16).ok_or_else(|| {
                ClassError::code(format!("exception table refers into an instruction at {}", pc))
            })
        };

        out.write_u16::<BigEndian>(self.exception_table.len() as u16)?;
        for range in &self.exception_table {
            let range = ExceptionRange {
                start_pc: remap(range.start_pc)?,
                end_pc: remap(range.end_pc)?,
                handler_pc: remap(range.handler_pc)?,
                catch_type: range.catch_type.clone(),
            };
            range.write(pool, &mut out)?;
        }

        self.attributes.write(&mut out)?;

        Ok(out.into_inner())
    }

    pub fn attribute_named(&self, pool: &ConstantPool, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name(pool).map(|n| n == name).unwrap_or(false))
    }

    pub fn stack_map_table(&self, pool: &ConstantPool) -> Result<Option<StackMapTable>, ClassError> {
        match self.attribute_named(pool, StackMapTable::NAME) {
            Some(attribute) => Ok(Some(StackMapTable::read(pool, &attribute.info)?)),
            None => Ok(None),
        }
    }

    pub fn line_number_table(
        &self,
        pool: &ConstantPool,
    ) -> Result<Option<LineNumberTable>, ClassError> {
        match self.attribute_named(pool, LineNumberTable::NAME) {
            Some(attribute) => Ok(Some(LineNumberTable::read(&mut Cursor::new(
                &attribute.info[..],
            ))?)),
            None => Ok(None),
        }
    }

    pub fn local_variable_table(
        &self,
        pool: &ConstantPool,
    ) -> Result<Option<LocalVariableTable>, ClassError> {
        match self.attribute_named(pool, LocalVariableTable::NAME) {
            Some(attribute) => Ok(Some(LocalVariableTable::read(&mut Cursor::new(
                &attribute.info[..],
            ))?)),
            None => Ok(None),
        }
    }

    /// Replaces (or installs) the `StackMapTable`, dropping it entirely for an empty one.
    pub fn set_stack_map_table(
        &mut self,
        pool: &mut ConstantPool,
        table: StackMapTable,
    ) -> Result<(), ClassError> {
        let name_index = pool.add_utf8(StackMapTable::NAME);
        self.attributes.retain(|attribute| attribute.name_index != name_index);

        if !table.frames.is_empty() {
            let info = table.write(pool)?;
            self.attributes.push(AttributeInfo { name_index, info });
        }

        Ok(())
    }
}

const FRAME_SAME_MAX: u8 = 63;
const FRAME_SAME_LOCALS_1_MIN: u8 = 64;
const FRAME_SAME_LOCALS_1_MAX: u8 = 127;
const FRAME_SAME_LOCALS_1_EXTENDED: u8 = 247;
const FRAME_CHOP_MIN: u8 = 248;
const FRAME_SAME_EXTENDED: u8 = 251;
const FRAME_APPEND_MIN: u8 = 252;
const FRAME_APPEND_MAX: u8 = 254;
const FRAME_FULL: u8 = 255;

/// One delta-encoded frame of a `StackMapTable`. The shapes follow JVMS §4.7.4; types here list
/// one entry per verification unit (a long or double is a single entry).
#[derive(Debug, Clone, PartialEq)]
pub enum StackMapFrame {
    /// Same locals as the previous frame, empty stack.
    Same { offset_delta: u16 },
    /// Same locals as the previous frame, exactly one stack item.
    SameLocals1StackItem { offset_delta: u16, stack_item: Type },
    /// As above but with an explicit 16-bit delta.
    SameLocals1StackItemExtended { offset_delta: u16, stack_item: Type },
    /// The last `chopped` locals are absent, empty stack.
    Chop { offset_delta: u16, chopped: u8 },
    /// Same locals with an explicit 16-bit delta, empty stack.
    SameExtended { offset_delta: u16 },
    /// 1-3 additional locals, empty stack.
    Append { offset_delta: u16, locals: Vec<Type> },
    /// Everything spelled out.
    Full {
        offset_delta: u16,
        locals: Vec<Type>,
        stack: Vec<Type>,
    },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { offset_delta }
            | StackMapFrame::SameLocals1StackItem { offset_delta, .. }
            | StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::SameExtended { offset_delta }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    fn read<T: Read + Seek>(pool: &ConstantPool, buffer: &mut T) -> Result<Self, ClassError> {
        let frame_type = buffer.read_u8()?;

        Ok(match frame_type {
            0..=FRAME_SAME_MAX => StackMapFrame::Same {
                offset_delta: frame_type as u16,
            },
            FRAME_SAME_LOCALS_1_MIN..=FRAME_SAME_LOCALS_1_MAX => {
                StackMapFrame::SameLocals1StackItem {
                    offset_delta: (frame_type - FRAME_SAME_LOCALS_1_MIN) as u16,
                    stack_item: read_verification_type(pool, buffer)?,
                }
            }
            FRAME_SAME_LOCALS_1_EXTENDED => StackMapFrame::SameLocals1StackItemExtended {
                offset_delta: buffer.read_u16::<BigEndian>()?,
                stack_item: read_verification_type(pool, buffer)?,
            },
            FRAME_CHOP_MIN..=250 => StackMapFrame::Chop {
                offset_delta: buffer.read_u16::<BigEndian>()?,
                chopped: FRAME_SAME_EXTENDED - frame_type,
            },
            FRAME_SAME_EXTENDED => StackMapFrame::SameExtended {
                offset_delta: buffer.read_u16::<BigEndian>()?,
            },
            FRAME_APPEND_MIN..=FRAME_APPEND_MAX => {
                let offset_delta = buffer.read_u16::<BigEndian>()?;
                let count = frame_type - FRAME_SAME_EXTENDED;
                let mut locals = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    locals.push(read_verification_type(pool, buffer)?);
                }
                StackMapFrame::Append {
                    offset_delta,
                    locals,
                }
            }
            FRAME_FULL => {
                let offset_delta = buffer.read_u16::<BigEndian>()?;

                let local_count = buffer.read_u16::<BigEndian>()?;
                let mut locals = Vec::with_capacity(local_count as usize);
                for _ in 0..local_count {
                    locals.push(read_verification_type(pool, buffer)?);
                }

                let stack_count = buffer.read_u16::<BigEndian>()?;
                let mut stack = Vec::with_capacity(stack_count as usize);
                for _ in 0..stack_count {
                    stack.push(read_verification_type(pool, buffer)?);
                }

                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
            tag => {
                return Err(ClassError::stack_map(format!("unknown frame tag {}", tag)));
            }
        })
    }

    fn write<T: Write + Seek>(
        &self,
        pool: &mut ConstantPool,
        buffer: &mut T,
    ) -> Result<(), ClassError> {
        match self {
            StackMapFrame::Same { offset_delta } => {
                debug_assert!(*offset_delta <= FRAME_SAME_MAX as u16);
                buffer.write_u8(*offset_delta as u8)?;
            }
            StackMapFrame::SameLocals1StackItem {
                offset_delta,
                stack_item,
            } => {
                debug_assert!(*offset_delta <= FRAME_SAME_MAX as u16);
                buffer.write_u8(FRAME_SAME_LOCALS_1_MIN + *offset_delta as u8)?;
                write_verification_type(stack_item, pool, buffer)?;
            }
            StackMapFrame::SameLocals1StackItemExtended {
                offset_delta,
                stack_item,
            } => {
                buffer.write_u8(FRAME_SAME_LOCALS_1_EXTENDED)?;
                buffer.write_u16::<BigEndian>(*offset_delta)?;
                write_verification_type(stack_item, pool, buffer)?;
            }
            StackMapFrame::Chop {
                offset_delta,
                chopped,
            } => {
                debug_assert!(*chopped >= 1 && *chopped <= 3);
                buffer.write_u8(FRAME_SAME_EXTENDED - chopped)?;
                buffer.write_u16::<BigEndian>(*offset_delta)?;
            }
            StackMapFrame::SameExtended { offset_delta } => {
                buffer.write_u8(FRAME_SAME_EXTENDED)?;
                buffer.write_u16::<BigEndian>(*offset_delta)?;
            }
            StackMapFrame::Append {
                offset_delta,
                locals,
            } => {
                debug_assert!(!locals.is_empty() && locals.len() <= 3);
                buffer.write_u8(FRAME_SAME_EXTENDED + locals.len() as u8)?;
                buffer.write_u16::<BigEndian>(*offset_delta)?;
                for local in locals {
                    write_verification_type(local, pool, buffer)?;
                }
            }
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                buffer.write_u8(FRAME_FULL)?;
                buffer.write_u16::<BigEndian>(*offset_delta)?;

                buffer.write_u16::<BigEndian>(locals.len() as u16)?;
                for local in locals {
                    write_verification_type(local, pool, buffer)?;
                }

                buffer.write_u16::<BigEndian>(stack.len() as u16)?;
                for item in stack {
                    write_verification_type(item, pool, buffer)?;
                }
            }
        }

        Ok(())
    }
}

/// Contains information about stack frames, used for inference verification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackMapTable {
    pub frames: Vec<StackMapFrame>,
}

impl StackMapTable {
    pub const NAME: &'static str = "StackMapTable";

    pub fn read(pool: &ConstantPool, bytes: &[u8]) -> Result<Self, ClassError> {
        let mut buffer = Cursor::new(bytes);
        let count = buffer.read_u16::<BigEndian>()?;

        let mut frames = Vec::with_capacity(count as usize);
        for _ in 0..count {
            frames.push(StackMapFrame::read(pool, &mut buffer)?);
        }

        Ok(StackMapTable { frames })
    }

    pub fn write(&self, pool: &mut ConstantPool) -> Result<Vec<u8>, ClassError> {
        let mut buffer = Cursor::new(Vec::new());
        buffer.write_u16::<BigEndian>(self.frames.len() as u16)?;

        for frame in &self.frames {
            frame.write(pool, &mut buffer)?;
        }

        Ok(buffer.into_inner())
    }

    /// The absolute bytecode offset of every frame, applying the delta bias: the first frame's
    /// delta is its offset, each following frame starts at `previous + delta + 1`.
    pub fn offsets(&self) -> Vec<u32> {
        let mut offsets = Vec::with_capacity(self.frames.len());
        let mut previous: Option<u32> = None;

        for frame in &self.frames {
            let offset = match previous {
                None => frame.offset_delta() as u32,
                Some(previous) => previous + frame.offset_delta() as u32 + 1,
            };
            offsets.push(offset);
            previous = Some(offset);
        }

        offsets
    }
}

const TYPE_TAG_TOP: u8 = 0;
const TYPE_TAG_INTEGER: u8 = 1;
const TYPE_TAG_FLOAT: u8 = 2;
const TYPE_TAG_DOUBLE: u8 = 3;
const TYPE_TAG_LONG: u8 = 4;
const TYPE_TAG_NULL: u8 = 5;
const TYPE_TAG_UNINITIALIZED_THIS: u8 = 6;
const TYPE_TAG_OBJECT: u8 = 7;
const TYPE_TAG_UNINITIALIZED: u8 = 8;

pub fn read_verification_type<T: Read + Seek>(
    pool: &ConstantPool,
    buffer: &mut T,
) -> Result<Type, ClassError> {
    Ok(match buffer.read_u8()? {
        TYPE_TAG_TOP => Type::Top,
        TYPE_TAG_INTEGER => Type::Int,
        TYPE_TAG_FLOAT => Type::Float,
        TYPE_TAG_DOUBLE => Type::Double,
        TYPE_TAG_LONG => Type::Long,
        TYPE_TAG_NULL => Type::Null,
        TYPE_TAG_UNINITIALIZED_THIS => Type::UninitializedThis,
        TYPE_TAG_OBJECT => {
            let index = buffer.read_u16::<BigEndian>()?;
            class_constant_type(pool.get_class_name(index)?)?
        }
        TYPE_TAG_UNINITIALIZED => Type::Uninitialized(buffer.read_u16::<BigEndian>()?),
        tag => {
            return Err(ClassError::stack_map(format!(
                "invalid verification type tag {}",
                tag
            )))
        }
    })
}

pub fn write_verification_type<T: Write + Seek>(
    type_: &Type,
    pool: &mut ConstantPool,
    buffer: &mut T,
) -> Result<(), ClassError> {
    match type_.to_verification_type() {
        Type::Top => buffer.write_u8(TYPE_TAG_TOP)?,
        Type::Int => buffer.write_u8(TYPE_TAG_INTEGER)?,
        Type::Float => buffer.write_u8(TYPE_TAG_FLOAT)?,
        Type::Double => buffer.write_u8(TYPE_TAG_DOUBLE)?,
        Type::Long => buffer.write_u8(TYPE_TAG_LONG)?,
        Type::Null => buffer.write_u8(TYPE_TAG_NULL)?,
        Type::UninitializedThis => buffer.write_u8(TYPE_TAG_UNINITIALIZED_THIS)?,
        Type::Uninitialized(offset) => {
            buffer.write_u8(TYPE_TAG_UNINITIALIZED)?;
            buffer.write_u16::<BigEndian>(offset)?;
        }
        reference @ Type::Class(_) | reference @ Type::Array { .. } => {
            let index = pool.add_class(class_constant_name(&reference));
            buffer.write_u8(TYPE_TAG_OBJECT)?;
            buffer.write_u16::<BigEndian>(index)?;
        }
        other => {
            return Err(ClassError::stack_map(format!(
                "type {} has no verification type encoding",
                other
            )))
        }
    }

    Ok(())
}

readable_struct! {
    pub struct LineNumber {
        start_pc: u16,
        line_number: u16,
    }
}

readable_struct! {
    pub no_copy struct LineNumberTable {
        table: Vec<LineNumber>,
    }
}

impl LineNumberTable {
    pub const NAME: &'static str = "LineNumberTable";
}

readable_struct! {
    pub struct InnerClass {
        inner_class_info: u16,
        outer_class_info: u16,
        inner_name_index: u16,
        inner_class_access_flags: crate::class::AccessFlags,
    }
}

readable_struct! {
    pub no_copy struct InnerClasses {
        classes: Vec<InnerClass>,
    }
}

impl InnerClasses {
    pub const NAME: &'static str = "InnerClasses";
}

readable_struct! {
    pub struct LocalVariableEntry {
        start_pc: u16,
        length: u16,
        name_index: u16,
        descriptor_index: u16,
        index: u16,
    }
}

readable_struct! {
    pub no_copy struct LocalVariableTable {
        variables: Vec<LocalVariableEntry>,
    }
}

impl LocalVariableTable {
    pub const NAME: &'static str = "LocalVariableTable";
}

/// Remaps `Uninitialized` offsets inside a stack map after instructions moved. Used by the
/// verifier when it rewrites a method body.
pub fn remap_stack_map(table: &mut StackMapTable, mapping: &HashMap<u32, u32>) {
    let remap_type = |type_: &mut Type| {
        if let Type::Uninitialized(offset) = type_ {
            if let Some(new) = mapping.get(&(*offset as u32)) {
                *offset = *new as u16;
            }
        }
    };

    for frame in &mut table.frames {
        match frame {
            StackMapFrame::SameLocals1StackItem { stack_item, .. }
            | StackMapFrame::SameLocals1StackItemExtended { stack_item, .. } => {
                remap_type(stack_item)
            }
            StackMapFrame::Append { locals, .. } => locals.iter_mut().for_each(remap_type),
            StackMapFrame::Full { locals, stack, .. } => {
                locals.iter_mut().for_each(remap_type);
                stack.iter_mut().for_each(remap_type);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction::*;

    #[test]
    fn stack_map_round_trip() {
        let mut pool = ConstantPool::new();
        let table = StackMapTable {
            frames: vec![
                StackMapFrame::Same { offset_delta: 6 },
                StackMapFrame::Append {
                    offset_delta: 4,
                    locals: vec![Type::Int, Type::Long],
                },
                StackMapFrame::SameLocals1StackItem {
                    offset_delta: 2,
                    stack_item: Type::class("java/lang/String"),
                },
                StackMapFrame::Chop {
                    offset_delta: 10,
                    chopped: 2,
                },
                StackMapFrame::Full {
                    offset_delta: 300,
                    locals: vec![Type::Uninitialized(3), Type::Top],
                    stack: vec![Type::Null, Type::Double],
                },
            ],
        };

        let bytes = table.write(&mut pool).unwrap();
        let reread = StackMapTable::read(&pool, &bytes).unwrap();
        assert_eq!(reread, table);
        assert_eq!(reread.offsets(), vec![6, 11, 14, 25, 326]);
    }

    #[test]
    fn unknown_frame_tag_is_fatal() {
        let mut pool = ConstantPool::new();
        // Tag 246 falls outside every defined frame shape.
        let bytes = [0x00, 0x01, 246];
        match StackMapTable::read(&mut pool, &bytes) {
            Err(ClassError::MalformedStackMap(_)) => {}
            other => panic!("expected MalformedStackMap, got {:?}", other),
        }
    }

    #[test]
    fn verification_type_tags() {
        let mut pool = ConstantPool::new();
        let mut buffer = Cursor::new(Vec::new());
        for type_ in &[
            Type::Top,
            Type::Int,
            Type::Float,
            Type::Double,
            Type::Long,
            Type::Null,
            Type::UninitializedThis,
            Type::class("java/lang/Object"),
            Type::array(Type::Int, 1),
            Type::Uninitialized(17),
        ] {
            write_verification_type(type_, &mut pool, &mut buffer).unwrap();
        }

        let bytes = buffer.into_inner();
        assert_eq!(bytes[0], TYPE_TAG_TOP);
        assert_eq!(bytes[1], TYPE_TAG_INTEGER);

        let mut reader = Cursor::new(&bytes[..]);
        let mut reread = Vec::new();
        while (reader.position() as usize) < bytes.len() {
            reread.push(read_verification_type(&pool, &mut reader).unwrap());
        }

        assert_eq!(reread[7], Type::class("java/lang/Object"));
        assert_eq!(reread[8], Type::array(Type::Int, 1));
        assert_eq!(reread[9], Type::Uninitialized(17));
    }

    #[test]
    fn code_attribute_round_trip() {
        let mut pool = ConstantPool::new();

        let original = CodeAttribute {
            max_stack: 2,
            max_locals: 2,
            code: vec![
                (0, iconst_1),
                (1, istore(1)),
                (2, iload(1)),
                (3, ifeq(4)),
                (6, iconst_0),
                (7, goto(-5)),
            ],
            code_length: 10,
            exception_table: vec![ExceptionRange {
                start_pc: 0,
                end_pc: 6,
                handler_pc: 6,
                catch_type: Some(Type::class("java/io/IOException")),
            }],
            attributes: Vec::new(),
        };

        let bytes = original.write(&mut pool).unwrap();
        let reread = CodeAttribute::read(&pool, &bytes).unwrap();

        assert_eq!(reread.max_stack, 2);
        assert_eq!(reread.code, original.code);
        assert_eq!(reread.exception_table, original.exception_table);
    }

    #[test]
    fn set_stack_map_table_replaces_previous() {
        let mut pool = ConstantPool::new();
        let mut code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: vec![(0, r#return)],
            code_length: 1,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        let table = StackMapTable {
            frames: vec![StackMapFrame::Same { offset_delta: 0 }],
        };
        code.set_stack_map_table(&mut pool, table.clone()).unwrap();
        assert_eq!(code.attributes.len(), 1);
        assert_eq!(code.stack_map_table(&pool).unwrap().unwrap(), table);

        code.set_stack_map_table(&mut pool, StackMapTable::default())
            .unwrap();
        assert!(code.stack_map_table(&pool).unwrap().is_none());
    }
}
