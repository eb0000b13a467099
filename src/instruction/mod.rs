//! The instruction model. One enum variant per opcode, with operands resolved against the
//! constant pool at read time and re-interned on write.
//!
//! Naming follows the JVM mnemonics directly, so the variants are lower case like the
//! specification spells them.
#![allow(non_camel_case_types)]

mod info;
mod trace;

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::class::constant::{Constant, ConstantPool, ReferenceKind};
use crate::descriptor;
use crate::error::ClassError;
use crate::types::Type;

/// The `wide` prefix opcode; not an instruction of its own, it widens the operand of the
/// instruction that follows.
pub const WIDE: u8 = 0xc4;

/// A field or method referenced from an instruction, fully resolved to names and types.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    pub class: Type,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    /// Parses the descriptor as a field type.
    pub fn field_type(&self) -> Result<Type, ClassError> {
        descriptor::parse_field_descriptor(&self.descriptor, false, false)
    }

    /// Parses the descriptor as a method signature.
    pub fn method_type(&self) -> Result<(Vec<Type>, Type), ClassError> {
        descriptor::parse_method_descriptor(&self.descriptor, false, false)
    }
}

/// A constant resolvable by the `ldc` family.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadableConstant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(Type),
    MethodType(String),
    MethodHandle {
        kind: ReferenceKind,
        reference: MemberRef,
        interface: bool,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name: String,
        descriptor: String,
    },
}

impl LoadableConstant {
    /// The verification type this constant has once pushed.
    pub fn loaded_type(&self) -> Type {
        match self {
            LoadableConstant::Int(_) => Type::Int,
            LoadableConstant::Float(_) => Type::Float,
            LoadableConstant::Long(_) => Type::Long,
            LoadableConstant::Double(_) => Type::Double,
            LoadableConstant::String(_) => crate::types::STRING.clone(),
            LoadableConstant::Class(_) => crate::types::CLASS.clone(),
            LoadableConstant::MethodType(_) => crate::types::METHOD_TYPE.clone(),
            LoadableConstant::MethodHandle { .. } => crate::types::METHOD_HANDLE.clone(),
            LoadableConstant::Dynamic { descriptor, .. } => {
                descriptor::parse_field_descriptor(descriptor, false, true)
                    .unwrap_or(Type::Top)
                    .to_verification_type()
            }
        }
    }

    pub fn category(&self) -> u8 {
        match self {
            LoadableConstant::Long(_) | LoadableConstant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    nop,
    aconst_null,
    iconst_m1,
    iconst_0,
    iconst_1,
    iconst_2,
    iconst_3,
    iconst_4,
    iconst_5,
    lconst_0,
    lconst_1,
    fconst_0,
    fconst_1,
    fconst_2,
    dconst_0,
    dconst_1,
    bipush(i8),
    sipush(i16),
    ldc(LoadableConstant),
    ldc_w(LoadableConstant),
    ldc2_w(LoadableConstant),

    iload(u16),
    lload(u16),
    fload(u16),
    dload(u16),
    aload(u16),
    iaload,
    laload,
    faload,
    daload,
    aaload,
    baload,
    caload,
    saload,
    istore(u16),
    lstore(u16),
    fstore(u16),
    dstore(u16),
    astore(u16),
    iastore,
    lastore,
    fastore,
    dastore,
    aastore,
    bastore,
    castore,
    sastore,

    pop,
    pop2,
    dup,
    dup_x1,
    dup_x2,
    dup2,
    dup2_x1,
    dup2_x2,
    swap,

    iadd,
    ladd,
    fadd,
    dadd,
    isub,
    lsub,
    fsub,
    dsub,
    imul,
    lmul,
    fmul,
    dmul,
    idiv,
    ldiv,
    fdiv,
    ddiv,
    irem,
    lrem,
    frem,
    drem,
    ineg,
    lneg,
    fneg,
    dneg,
    ishl,
    lshl,
    ishr,
    lshr,
    iushr,
    lushr,
    iand,
    land,
    ior,
    lor,
    ixor,
    lxor,
    iinc { index: u16, constant: i16 },

    i2l,
    i2f,
    i2d,
    l2i,
    l2f,
    l2d,
    f2i,
    f2l,
    f2d,
    d2i,
    d2l,
    d2f,
    i2b,
    i2c,
    i2s,

    lcmp,
    fcmpl,
    fcmpg,
    dcmpl,
    dcmpg,
    ifeq(i16),
    ifne(i16),
    iflt(i16),
    ifge(i16),
    ifgt(i16),
    ifle(i16),
    if_icmpeq(i16),
    if_icmpne(i16),
    if_icmplt(i16),
    if_icmpge(i16),
    if_icmpgt(i16),
    if_icmple(i16),
    if_acmpeq(i16),
    if_acmpne(i16),

    goto(i16),
    jsr(i16),
    ret(u16),
    tableswitch {
        default: i32,
        low: i32,
        offsets: Vec<i32>,
    },
    lookupswitch {
        default: i32,
        pairs: Vec<(i32, i32)>,
    },
    ireturn,
    lreturn,
    freturn,
    dreturn,
    areturn,
    r#return,

    getstatic(MemberRef),
    putstatic(MemberRef),
    getfield(MemberRef),
    putfield(MemberRef),
    invokevirtual(MemberRef),
    invokespecial(MemberRef),
    invokestatic(MemberRef),
    invokeinterface { method: MemberRef, count: u8 },
    invokedynamic {
        bootstrap_method_attr_index: u16,
        name: String,
        descriptor: String,
    },
    new(Type),
    newarray(Type),
    anewarray(Type),
    arraylength,
    athrow,
    checkcast(Type),
    instanceof(Type),
    monitorenter,
    monitorexit,
    multianewarray { array_type: Type, dimension: u8 },
    ifnull(i16),
    ifnonnull(i16),
    goto_w(i32),
    jsr_w(i32),
}

/// Resolves a `Class` constant's name to a type. Array classes spell their names in descriptor
/// form (`[I`, `[Ljava/lang/String;`), everything else is a plain internal name.
pub fn class_constant_type(name: &str) -> Result<Type, ClassError> {
    if name.starts_with('[') {
        descriptor::parse_field_descriptor(name, false, false)
    } else {
        Ok(Type::class(name))
    }
}

/// The inverse of [`class_constant_type`].
pub fn class_constant_name(type_: &Type) -> String {
    match type_ {
        Type::Class(name) => name.clone(),
        other => descriptor::to_descriptor(other),
    }
}

fn newarray_element(code: u8) -> Result<Type, ClassError> {
    Ok(match code {
        4 => Type::Boolean,
        5 => Type::Char,
        6 => Type::Float,
        7 => Type::Double,
        8 => Type::Byte,
        9 => Type::Short,
        10 => Type::Int,
        11 => Type::Long,
        x => return Err(ClassError::code(format!("invalid newarray type code {}", x))),
    })
}

fn newarray_code(element: &Type) -> Result<u8, ClassError> {
    Ok(match element {
        Type::Boolean => 4,
        Type::Char => 5,
        Type::Float => 6,
        Type::Double => 7,
        Type::Byte => 8,
        Type::Short => 9,
        Type::Int => 10,
        Type::Long => 11,
        other => {
            return Err(ClassError::code(format!(
                "newarray cannot allocate element type {}",
                other
            )))
        }
    })
}

fn resolve_member(pool: &ConstantPool, index: u16) -> Result<MemberRef, ClassError> {
    let (class_index, name_and_type_index) = match pool.get(index)? {
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
        } => (*class_index, *name_and_type_index),
        other => {
            return Err(ClassError::pool(format!(
                "expected a field or method ref at index {}, found tag {}",
                index,
                other.tag()
            )))
        }
    };

    let class = class_constant_type(pool.get_class_name(class_index)?)?;
    let (name, descriptor) = pool.get_name_and_type(name_and_type_index)?;

    Ok(MemberRef {
        class,
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
    })
}

fn resolve_loadable(pool: &ConstantPool, index: u16) -> Result<LoadableConstant, ClassError> {
    Ok(match pool.get(index)? {
        Constant::Integer(value) => LoadableConstant::Int(*value),
        Constant::Float(value) => LoadableConstant::Float(*value),
        Constant::Long(value) => LoadableConstant::Long(*value),
        Constant::Double(value) => LoadableConstant::Double(*value),
        Constant::String { string_index } => {
            LoadableConstant::String(pool.get_utf8(*string_index)?.to_owned())
        }
        Constant::Class { name_index } => {
            LoadableConstant::Class(class_constant_type(pool.get_utf8(*name_index)?)?)
        }
        Constant::MethodType { descriptor_index } => {
            LoadableConstant::MethodType(pool.get_utf8(*descriptor_index)?.to_owned())
        }
        Constant::MethodHandle {
            reference_kind,
            reference_index,
        } => {
            let interface = matches!(
                pool.get(*reference_index)?,
                Constant::InterfaceMethodRef { .. }
            );
            LoadableConstant::MethodHandle {
                kind: *reference_kind,
                reference: resolve_member(pool, *reference_index)?,
                interface,
            }
        }
        Constant::Dynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } => {
            let (name, desc) = pool.get_name_and_type(*name_and_type_index)?;
            LoadableConstant::Dynamic {
                bootstrap_method_attr_index: *bootstrap_method_attr_index,
                name: name.to_owned(),
                descriptor: desc.to_owned(),
            }
        }
        other => {
            return Err(ClassError::pool(format!(
                "constant with tag {} is not loadable",
                other.tag()
            )))
        }
    })
}

fn intern_member(pool: &mut ConstantPool, member: &MemberRef, tag: u8) -> u16 {
    let class_index = {
        let name = class_constant_name(&member.class);
        pool.add_class(name)
    };
    let name_index = pool.add_utf8(member.name.clone());
    let descriptor_index = pool.add_utf8(member.descriptor.clone());
    let name_and_type_index = pool.add(Constant::NameAndType {
        name_index,
        descriptor_index,
    });

    pool.add(match tag {
        crate::class::constant::TAG_FIELD_REF => Constant::FieldRef {
            class_index,
            name_and_type_index,
        },
        crate::class::constant::TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        },
        _ => Constant::MethodRef {
            class_index,
            name_and_type_index,
        },
    })
}

fn intern_loadable(pool: &mut ConstantPool, constant: &LoadableConstant) -> u16 {
    match constant {
        LoadableConstant::Int(value) => pool.add(Constant::Integer(*value)),
        LoadableConstant::Float(value) => pool.add(Constant::Float(*value)),
        LoadableConstant::Long(value) => pool.add(Constant::Long(*value)),
        LoadableConstant::Double(value) => pool.add(Constant::Double(*value)),
        LoadableConstant::String(text) => {
            let string_index = pool.add_utf8(text.clone());
            pool.add(Constant::String { string_index })
        }
        LoadableConstant::Class(type_) => pool.add_class(class_constant_name(type_)),
        LoadableConstant::MethodType(descriptor) => {
            let descriptor_index = pool.add_utf8(descriptor.clone());
            pool.add(Constant::MethodType { descriptor_index })
        }
        LoadableConstant::MethodHandle {
            kind,
            reference,
            interface,
        } => {
            let tag = match kind {
                ReferenceKind::GetField
                | ReferenceKind::GetStatic
                | ReferenceKind::PutField
                | ReferenceKind::PutStatic => crate::class::constant::TAG_FIELD_REF,
                ReferenceKind::InvokeInterface => crate::class::constant::TAG_INTERFACE_METHOD_REF,
                _ if *interface => crate::class::constant::TAG_INTERFACE_METHOD_REF,
                _ => crate::class::constant::TAG_METHOD_REF,
            };
            let reference_index = intern_member(pool, reference, tag);
            pool.add(Constant::MethodHandle {
                reference_kind: *kind,
                reference_index,
            })
        }
        LoadableConstant::Dynamic {
            bootstrap_method_attr_index,
            name,
            descriptor,
        } => {
            let name_index = pool.add_utf8(name.clone());
            let descriptor_index = pool.add_utf8(descriptor.clone());
            let name_and_type_index = pool.add(Constant::NameAndType {
                name_index,
                descriptor_index,
            });
            pool.add(Constant::Dynamic {
                bootstrap_method_attr_index: *bootstrap_method_attr_index,
                name_and_type_index,
            })
        }
    }
}

/// Decodes a whole `Code` array into `(offset, instruction)` pairs. The cursor position inside
/// the method is significant: switch tables align to 4 bytes relative to the method start.
pub fn read_code(pool: &ConstantPool, code: &[u8]) -> Result<Vec<(u32, Instruction)>, ClassError> {
    let mut buffer = Cursor::new(code);
    let mut instructions = Vec::new();

    while (buffer.position() as usize) < code.len() {
        let offset = buffer.position() as u32;
        let instruction = Instruction::read(pool, &mut buffer, offset)?;
        trace!("\t{}: {:?}", offset, instruction);
        instructions.push((offset, instruction));
    }

    Ok(instructions)
}

/// Re-encodes a full instruction stream. Instructions may shift position relative to how they
/// were originally decoded (canonical compact forms, pool index widths), so branch and switch
/// operands are retargeted through an old-offset to new-offset map, which is also returned for
/// remapping exception tables and stack maps.
pub fn write_code(
    pool: &mut ConstantPool,
    instructions: &[(u32, Instruction)],
    old_code_length: u32,
) -> Result<(Vec<u8>, hashbrown::HashMap<u32, u32>), ClassError> {
    let mut mapping = hashbrown::HashMap::with_capacity(instructions.len() + 1);
    let mut position = 0u32;

    for (old_offset, instruction) in instructions {
        mapping.insert(*old_offset, position);
        position += instruction.encoded_size(position, pool);
    }

    // The exclusive end of the code array is a valid exception range bound.
    mapping.entry(old_code_length).or_insert(position);

    let remap = |old_offset: u32, old_target: i64| -> Result<i32, ClassError> {
        let target = mapping
            .get(&(old_target as u32))
            .copied()
            .ok_or_else(|| {
                ClassError::code(format!(
                    "branch from {} into the middle of an instruction at {}",
                    old_offset, old_target
                ))
            })?;
        Ok(target as i32 - mapping[&old_offset] as i32)
    };

    let mut buffer = Cursor::new(Vec::with_capacity(position as usize));
    for (old_offset, instruction) in instructions {
        use Instruction::*;

        let patched = match instruction {
            ifeq(_) | ifne(_) | iflt(_) | ifge(_) | ifgt(_) | ifle(_) | if_icmpeq(_)
            | if_icmpne(_) | if_icmplt(_) | if_icmpge(_) | if_icmpgt(_) | if_icmple(_)
            | if_acmpeq(_) | if_acmpne(_) | ifnull(_) | ifnonnull(_) | goto(_) | jsr(_)
            | goto_w(_) | jsr_w(_) => {
                let old_relative = instruction.jump_offset().unwrap() as i64;
                let relative = remap(*old_offset, *old_offset as i64 + old_relative)?;
                instruction.retarget(relative)?
            }
            tableswitch {
                default,
                low,
                offsets,
            } => {
                let mut patched_offsets = Vec::with_capacity(offsets.len());
                for offset in offsets {
                    patched_offsets.push(remap(*old_offset, *old_offset as i64 + *offset as i64)?);
                }
                tableswitch {
                    default: remap(*old_offset, *old_offset as i64 + *default as i64)?,
                    low: *low,
                    offsets: patched_offsets,
                }
            }
            lookupswitch { default, pairs } => {
                let mut patched_pairs = Vec::with_capacity(pairs.len());
                for (value, offset) in pairs {
                    patched_pairs
                        .push((*value, remap(*old_offset, *old_offset as i64 + *offset as i64)?));
                }
                lookupswitch {
                    default: remap(*old_offset, *old_offset as i64 + *default as i64)?,
                    pairs: patched_pairs,
                }
            }
            other => other.clone(),
        };

        debug_assert_eq!(buffer.position() as u32, mapping[old_offset]);
        patched.write(pool, &mut buffer)?;
    }

    Ok((buffer.into_inner(), mapping))
}

impl Instruction {
    /// Replaces the relative offset of an explicit jump, failing if the new distance does not fit
    /// the instruction's operand width.
    pub(crate) fn retarget(&self, relative: i32) -> Result<Instruction, ClassError> {
        use Instruction::*;

        let narrow = || -> Result<i16, ClassError> {
            if relative > i16::max_value() as i32 || relative < i16::min_value() as i32 {
                return Err(ClassError::code(format!(
                    "branch offset {} does not fit in 16 bits",
                    relative
                )));
            }
            Ok(relative as i16)
        };

        Ok(match self {
            ifeq(_) => ifeq(narrow()?),
            ifne(_) => ifne(narrow()?),
            iflt(_) => iflt(narrow()?),
            ifge(_) => ifge(narrow()?),
            ifgt(_) => ifgt(narrow()?),
            ifle(_) => ifle(narrow()?),
            if_icmpeq(_) => if_icmpeq(narrow()?),
            if_icmpne(_) => if_icmpne(narrow()?),
            if_icmplt(_) => if_icmplt(narrow()?),
            if_icmpge(_) => if_icmpge(narrow()?),
            if_icmpgt(_) => if_icmpgt(narrow()?),
            if_icmple(_) => if_icmple(narrow()?),
            if_acmpeq(_) => if_acmpeq(narrow()?),
            if_acmpne(_) => if_acmpne(narrow()?),
            ifnull(_) => ifnull(narrow()?),
            ifnonnull(_) => ifnonnull(narrow()?),
            goto(_) => goto(narrow()?),
            jsr(_) => jsr(narrow()?),
            goto_w(_) => goto_w(relative),
            jsr_w(_) => jsr_w(relative),
            other => other.clone(),
        })
    }

    /// Reads a single instruction starting at the opcode byte. `offset` is the instruction's
    /// position relative to the start of the method.
    pub fn read(
        pool: &ConstantPool,
        buffer: &mut Cursor<&[u8]>,
        offset: u32,
    ) -> Result<Self, ClassError> {
        use Instruction::*;

        let opcode = buffer.read_u8()?;
        Ok(match opcode {
            0x00 => nop,
            0x01 => aconst_null,
            0x02 => iconst_m1,
            0x03 => iconst_0,
            0x04 => iconst_1,
            0x05 => iconst_2,
            0x06 => iconst_3,
            0x07 => iconst_4,
            0x08 => iconst_5,
            0x09 => lconst_0,
            0x0a => lconst_1,
            0x0b => fconst_0,
            0x0c => fconst_1,
            0x0d => fconst_2,
            0x0e => dconst_0,
            0x0f => dconst_1,
            0x10 => bipush(buffer.read_i8()?),
            0x11 => sipush(buffer.read_i16::<BigEndian>()?),
            0x12 => ldc(resolve_loadable(pool, buffer.read_u8()? as u16)?),
            0x13 => ldc_w(resolve_loadable(pool, buffer.read_u16::<BigEndian>()?)?),
            0x14 => ldc2_w(resolve_loadable(pool, buffer.read_u16::<BigEndian>()?)?),

            0x15 => iload(buffer.read_u8()? as u16),
            0x16 => lload(buffer.read_u8()? as u16),
            0x17 => fload(buffer.read_u8()? as u16),
            0x18 => dload(buffer.read_u8()? as u16),
            0x19 => aload(buffer.read_u8()? as u16),
            0x1a..=0x1d => iload((opcode - 0x1a) as u16),
            0x1e..=0x21 => lload((opcode - 0x1e) as u16),
            0x22..=0x25 => fload((opcode - 0x22) as u16),
            0x26..=0x29 => dload((opcode - 0x26) as u16),
            0x2a..=0x2d => aload((opcode - 0x2a) as u16),
            0x2e => iaload,
            0x2f => laload,
            0x30 => faload,
            0x31 => daload,
            0x32 => aaload,
            0x33 => baload,
            0x34 => caload,
            0x35 => saload,

            0x36 => istore(buffer.read_u8()? as u16),
            0x37 => lstore(buffer.read_u8()? as u16),
            0x38 => fstore(buffer.read_u8()? as u16),
            0x39 => dstore(buffer.read_u8()? as u16),
            0x3a => astore(buffer.read_u8()? as u16),
            0x3b..=0x3e => istore((opcode - 0x3b) as u16),
            0x3f..=0x42 => lstore((opcode - 0x3f) as u16),
            0x43..=0x46 => fstore((opcode - 0x43) as u16),
            0x47..=0x4a => dstore((opcode - 0x47) as u16),
            0x4b..=0x4e => astore((opcode - 0x4b) as u16),
            0x4f => iastore,
            0x50 => lastore,
            0x51 => fastore,
            0x52 => dastore,
            0x53 => aastore,
            0x54 => bastore,
            0x55 => castore,
            0x56 => sastore,

            0x57 => pop,
            0x58 => pop2,
            0x59 => dup,
            0x5a => dup_x1,
            0x5b => dup_x2,
            0x5c => dup2,
            0x5d => dup2_x1,
            0x5e => dup2_x2,
            0x5f => swap,

            0x60 => iadd,
            0x61 => ladd,
            0x62 => fadd,
            0x63 => dadd,
            0x64 => isub,
            0x65 => lsub,
            0x66 => fsub,
            0x67 => dsub,
            0x68 => imul,
            0x69 => lmul,
            0x6a => fmul,
            0x6b => dmul,
            0x6c => idiv,
            0x6d => ldiv,
            0x6e => fdiv,
            0x6f => ddiv,
            0x70 => irem,
            0x71 => lrem,
            0x72 => frem,
            0x73 => drem,
            0x74 => ineg,
            0x75 => lneg,
            0x76 => fneg,
            0x77 => dneg,
            0x78 => ishl,
            0x79 => lshl,
            0x7a => ishr,
            0x7b => lshr,
            0x7c => iushr,
            0x7d => lushr,
            0x7e => iand,
            0x7f => land,
            0x80 => ior,
            0x81 => lor,
            0x82 => ixor,
            0x83 => lxor,
            0x84 => iinc {
                index: buffer.read_u8()? as u16,
                constant: buffer.read_i8()? as i16,
            },

            0x85 => i2l,
            0x86 => i2f,
            0x87 => i2d,
            0x88 => l2i,
            0x89 => l2f,
            0x8a => l2d,
            0x8b => f2i,
            0x8c => f2l,
            0x8d => f2d,
            0x8e => d2i,
            0x8f => d2l,
            0x90 => d2f,
            0x91 => i2b,
            0x92 => i2c,
            0x93 => i2s,

            0x94 => lcmp,
            0x95 => fcmpl,
            0x96 => fcmpg,
            0x97 => dcmpl,
            0x98 => dcmpg,
            0x99 => ifeq(buffer.read_i16::<BigEndian>()?),
            0x9a => ifne(buffer.read_i16::<BigEndian>()?),
            0x9b => iflt(buffer.read_i16::<BigEndian>()?),
            0x9c => ifge(buffer.read_i16::<BigEndian>()?),
            0x9d => ifgt(buffer.read_i16::<BigEndian>()?),
            0x9e => ifle(buffer.read_i16::<BigEndian>()?),
            0x9f => if_icmpeq(buffer.read_i16::<BigEndian>()?),
            0xa0 => if_icmpne(buffer.read_i16::<BigEndian>()?),
            0xa1 => if_icmplt(buffer.read_i16::<BigEndian>()?),
            0xa2 => if_icmpge(buffer.read_i16::<BigEndian>()?),
            0xa3 => if_icmpgt(buffer.read_i16::<BigEndian>()?),
            0xa4 => if_icmple(buffer.read_i16::<BigEndian>()?),
            0xa5 => if_acmpeq(buffer.read_i16::<BigEndian>()?),
            0xa6 => if_acmpne(buffer.read_i16::<BigEndian>()?),

            0xa7 => goto(buffer.read_i16::<BigEndian>()?),
            0xa8 => jsr(buffer.read_i16::<BigEndian>()?),
            0xa9 => ret(buffer.read_u8()? as u16),
            0xaa => {
                // 0-3 bytes padding to get proper alignment
                while buffer.position() % 4 != 0 {
                    buffer.read_u8()?;
                }

                let default = buffer.read_i32::<BigEndian>()?;
                let low = buffer.read_i32::<BigEndian>()?;
                let high = buffer.read_i32::<BigEndian>()?;
                if high < low {
                    return Err(ClassError::code(format!(
                        "tableswitch with high {} < low {}",
                        high, low
                    )));
                }

                let mut offsets = Vec::with_capacity((high - low + 1) as usize);
                for _ in 0..(high - low + 1) {
                    offsets.push(buffer.read_i32::<BigEndian>()?);
                }

                tableswitch {
                    default,
                    low,
                    offsets,
                }
            }
            0xab => {
                while buffer.position() % 4 != 0 {
                    buffer.read_u8()?;
                }

                let default = buffer.read_i32::<BigEndian>()?;
                let num_pairs = buffer.read_i32::<BigEndian>()?;
                let mut pairs = Vec::with_capacity(num_pairs.max(0) as usize);

                for _ in 0..num_pairs {
                    pairs.push((
                        buffer.read_i32::<BigEndian>()?,
                        buffer.read_i32::<BigEndian>()?,
                    ));
                }

                lookupswitch { default, pairs }
            }
            0xac => ireturn,
            0xad => lreturn,
            0xae => freturn,
            0xaf => dreturn,
            0xb0 => areturn,
            0xb1 => r#return,

            0xb2 => getstatic(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb3 => putstatic(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb4 => getfield(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb5 => putfield(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb6 => invokevirtual(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb7 => invokespecial(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb8 => invokestatic(resolve_member(pool, buffer.read_u16::<BigEndian>()?)?),
            0xb9 => {
                let method = resolve_member(pool, buffer.read_u16::<BigEndian>()?)?;
                let count = buffer.read_u8()?;
                buffer.read_u8()?; // reserved zero byte
                invokeinterface { method, count }
            }
            0xba => {
                let index = buffer.read_u16::<BigEndian>()?;
                buffer.read_u16::<BigEndian>()?; // two reserved zero bytes
                match pool.get(index)? {
                    Constant::InvokeDynamic {
                        bootstrap_method_attr_index,
                        name_and_type_index,
                    } => {
                        let (name, desc) = pool.get_name_and_type(*name_and_type_index)?;
                        invokedynamic {
                            bootstrap_method_attr_index: *bootstrap_method_attr_index,
                            name: name.to_owned(),
                            descriptor: desc.to_owned(),
                        }
                    }
                    other => {
                        return Err(ClassError::pool(format!(
                            "expected InvokeDynamic at index {}, found tag {}",
                            index,
                            other.tag()
                        )))
                    }
                }
            }
            0xbb => new(class_constant_type(
                pool.get_class_name(buffer.read_u16::<BigEndian>()?)?,
            )?),
            0xbc => newarray(newarray_element(buffer.read_u8()?)?),
            0xbd => {
                // The operand names the element type; the result is one dimension up.
                let element = class_constant_type(
                    pool.get_class_name(buffer.read_u16::<BigEndian>()?)?,
                )?;
                anewarray(match element {
                    Type::Array { element, dimension } => Type::Array {
                        element,
                        dimension: dimension + 1,
                    },
                    other => Type::array(other, 1),
                })
            }
            0xbe => arraylength,
            0xbf => athrow,
            0xc0 => checkcast(class_constant_type(
                pool.get_class_name(buffer.read_u16::<BigEndian>()?)?,
            )?),
            0xc1 => instanceof(class_constant_type(
                pool.get_class_name(buffer.read_u16::<BigEndian>()?)?,
            )?),
            0xc2 => monitorenter,
            0xc3 => monitorexit,
            WIDE => Self::read_wide(buffer)?,
            0xc5 => multianewarray {
                array_type: class_constant_type(
                    pool.get_class_name(buffer.read_u16::<BigEndian>()?)?,
                )?,
                dimension: buffer.read_u8()?,
            },
            0xc6 => ifnull(buffer.read_i16::<BigEndian>()?),
            0xc7 => ifnonnull(buffer.read_i16::<BigEndian>()?),
            0xc8 => goto_w(buffer.read_i32::<BigEndian>()?),
            0xc9 => jsr_w(buffer.read_i32::<BigEndian>()?),
            opcode => return Err(ClassError::UnknownOpcode { opcode, offset }),
        })
    }

    /// The `wide` prefix extends the operand of the next instruction from 8 to 16 bits (both
    /// operands for `iinc`).
    fn read_wide(buffer: &mut Cursor<&[u8]>) -> Result<Self, ClassError> {
        use Instruction::*;

        let opcode = buffer.read_u8()?;
        Ok(match opcode {
            0x15 => iload(buffer.read_u16::<BigEndian>()?),
            0x16 => lload(buffer.read_u16::<BigEndian>()?),
            0x17 => fload(buffer.read_u16::<BigEndian>()?),
            0x18 => dload(buffer.read_u16::<BigEndian>()?),
            0x19 => aload(buffer.read_u16::<BigEndian>()?),
            0x36 => istore(buffer.read_u16::<BigEndian>()?),
            0x37 => lstore(buffer.read_u16::<BigEndian>()?),
            0x38 => fstore(buffer.read_u16::<BigEndian>()?),
            0x39 => dstore(buffer.read_u16::<BigEndian>()?),
            0x3a => astore(buffer.read_u16::<BigEndian>()?),
            0x84 => iinc {
                index: buffer.read_u16::<BigEndian>()?,
                constant: buffer.read_i16::<BigEndian>()?,
            },
            0xa9 => ret(buffer.read_u16::<BigEndian>()?),
            opcode => {
                return Err(ClassError::code(format!(
                    "opcode 0x{:02x} cannot take the wide prefix",
                    opcode
                )))
            }
        })
    }

    fn write_local(
        buffer: &mut Cursor<Vec<u8>>,
        opcode: u8,
        compact_base: Option<u8>,
        index: u16,
    ) -> Result<(), ClassError> {
        match compact_base {
            // The `_0` through `_3` forms save an operand byte.
            Some(base) if index <= 3 => buffer.write_u8(base + index as u8)?,
            _ if index <= u8::max_value() as u16 => {
                buffer.write_u8(opcode)?;
                buffer.write_u8(index as u8)?;
            }
            _ => {
                buffer.write_u8(WIDE)?;
                buffer.write_u8(opcode)?;
                buffer.write_u16::<BigEndian>(index)?;
            }
        }
        Ok(())
    }

    /// Encodes this instruction at the buffer's current position, interning any referenced
    /// constants into `pool`. The position matters for switch padding and must be the
    /// instruction's offset relative to the method start.
    pub fn write(
        &self,
        pool: &mut ConstantPool,
        buffer: &mut Cursor<Vec<u8>>,
    ) -> Result<(), ClassError> {
        use Instruction::*;

        match self {
            nop => buffer.write_u8(0x00)?,
            aconst_null => buffer.write_u8(0x01)?,
            iconst_m1 => buffer.write_u8(0x02)?,
            iconst_0 => buffer.write_u8(0x03)?,
            iconst_1 => buffer.write_u8(0x04)?,
            iconst_2 => buffer.write_u8(0x05)?,
            iconst_3 => buffer.write_u8(0x06)?,
            iconst_4 => buffer.write_u8(0x07)?,
            iconst_5 => buffer.write_u8(0x08)?,
            lconst_0 => buffer.write_u8(0x09)?,
            lconst_1 => buffer.write_u8(0x0a)?,
            fconst_0 => buffer.write_u8(0x0b)?,
            fconst_1 => buffer.write_u8(0x0c)?,
            fconst_2 => buffer.write_u8(0x0d)?,
            dconst_0 => buffer.write_u8(0x0e)?,
            dconst_1 => buffer.write_u8(0x0f)?,
            bipush(value) => {
                buffer.write_u8(0x10)?;
                buffer.write_i8(*value)?;
            }
            sipush(value) => {
                buffer.write_u8(0x11)?;
                buffer.write_i16::<BigEndian>(*value)?;
            }
            // ldc vs ldc_w is decided by the width of the interned index, not by how the
            // instruction was originally spelled.
            ldc(constant) | ldc_w(constant) => {
                let index = intern_loadable(pool, constant);
                if index <= u8::max_value() as u16 {
                    buffer.write_u8(0x12)?;
                    buffer.write_u8(index as u8)?;
                } else {
                    buffer.write_u8(0x13)?;
                    buffer.write_u16::<BigEndian>(index)?;
                }
            }
            ldc2_w(constant) => {
                let index = intern_loadable(pool, constant);
                buffer.write_u8(0x14)?;
                buffer.write_u16::<BigEndian>(index)?;
            }

            iload(index) => Self::write_local(buffer, 0x15, Some(0x1a), *index)?,
            lload(index) => Self::write_local(buffer, 0x16, Some(0x1e), *index)?,
            fload(index) => Self::write_local(buffer, 0x17, Some(0x22), *index)?,
            dload(index) => Self::write_local(buffer, 0x18, Some(0x26), *index)?,
            aload(index) => Self::write_local(buffer, 0x19, Some(0x2a), *index)?,
            iaload => buffer.write_u8(0x2e)?,
            laload => buffer.write_u8(0x2f)?,
            faload => buffer.write_u8(0x30)?,
            daload => buffer.write_u8(0x31)?,
            aaload => buffer.write_u8(0x32)?,
            baload => buffer.write_u8(0x33)?,
            caload => buffer.write_u8(0x34)?,
            saload => buffer.write_u8(0x35)?,
            istore(index) => Self::write_local(buffer, 0x36, Some(0x3b), *index)?,
            lstore(index) => Self::write_local(buffer, 0x37, Some(0x3f), *index)?,
            fstore(index) => Self::write_local(buffer, 0x38, Some(0x43), *index)?,
            dstore(index) => Self::write_local(buffer, 0x39, Some(0x47), *index)?,
            astore(index) => Self::write_local(buffer, 0x3a, Some(0x4b), *index)?,
            iastore => buffer.write_u8(0x4f)?,
            lastore => buffer.write_u8(0x50)?,
            fastore => buffer.write_u8(0x51)?,
            dastore => buffer.write_u8(0x52)?,
            aastore => buffer.write_u8(0x53)?,
            bastore => buffer.write_u8(0x54)?,
            castore => buffer.write_u8(0x55)?,
            sastore => buffer.write_u8(0x56)?,

            pop => buffer.write_u8(0x57)?,
            pop2 => buffer.write_u8(0x58)?,
            dup => buffer.write_u8(0x59)?,
            dup_x1 => buffer.write_u8(0x5a)?,
            dup_x2 => buffer.write_u8(0x5b)?,
            dup2 => buffer.write_u8(0x5c)?,
            dup2_x1 => buffer.write_u8(0x5d)?,
            dup2_x2 => buffer.write_u8(0x5e)?,
            swap => buffer.write_u8(0x5f)?,

            iadd => buffer.write_u8(0x60)?,
            ladd => buffer.write_u8(0x61)?,
            fadd => buffer.write_u8(0x62)?,
            dadd => buffer.write_u8(0x63)?,
            isub => buffer.write_u8(0x64)?,
            lsub => buffer.write_u8(0x65)?,
            fsub => buffer.write_u8(0x66)?,
            dsub => buffer.write_u8(0x67)?,
            imul => buffer.write_u8(0x68)?,
            lmul => buffer.write_u8(0x69)?,
            fmul => buffer.write_u8(0x6a)?,
            dmul => buffer.write_u8(0x6b)?,
            idiv => buffer.write_u8(0x6c)?,
            ldiv => buffer.write_u8(0x6d)?,
            fdiv => buffer.write_u8(0x6e)?,
            ddiv => buffer.write_u8(0x6f)?,
            irem => buffer.write_u8(0x70)?,
            lrem => buffer.write_u8(0x71)?,
            frem => buffer.write_u8(0x72)?,
            drem => buffer.write_u8(0x73)?,
            ineg => buffer.write_u8(0x74)?,
            lneg => buffer.write_u8(0x75)?,
            fneg => buffer.write_u8(0x76)?,
            dneg => buffer.write_u8(0x77)?,
            ishl => buffer.write_u8(0x78)?,
            lshl => buffer.write_u8(0x79)?,
            ishr => buffer.write_u8(0x7a)?,
            lshr => buffer.write_u8(0x7b)?,
            iushr => buffer.write_u8(0x7c)?,
            lushr => buffer.write_u8(0x7d)?,
            iand => buffer.write_u8(0x7e)?,
            land => buffer.write_u8(0x7f)?,
            ior => buffer.write_u8(0x80)?,
            lor => buffer.write_u8(0x81)?,
            ixor => buffer.write_u8(0x82)?,
            lxor => buffer.write_u8(0x83)?,
            iinc { index, constant } => {
                if *index <= u8::max_value() as u16
                    && *constant >= i8::min_value() as i16
                    && *constant <= i8::max_value() as i16
                {
                    buffer.write_u8(0x84)?;
                    buffer.write_u8(*index as u8)?;
                    buffer.write_i8(*constant as i8)?;
                } else {
                    buffer.write_u8(WIDE)?;
                    buffer.write_u8(0x84)?;
                    buffer.write_u16::<BigEndian>(*index)?;
                    buffer.write_i16::<BigEndian>(*constant)?;
                }
            }

            i2l => buffer.write_u8(0x85)?,
            i2f => buffer.write_u8(0x86)?,
            i2d => buffer.write_u8(0x87)?,
            l2i => buffer.write_u8(0x88)?,
            l2f => buffer.write_u8(0x89)?,
            l2d => buffer.write_u8(0x8a)?,
            f2i => buffer.write_u8(0x8b)?,
            f2l => buffer.write_u8(0x8c)?,
            f2d => buffer.write_u8(0x8d)?,
            d2i => buffer.write_u8(0x8e)?,
            d2l => buffer.write_u8(0x8f)?,
            d2f => buffer.write_u8(0x90)?,
            i2b => buffer.write_u8(0x91)?,
            i2c => buffer.write_u8(0x92)?,
            i2s => buffer.write_u8(0x93)?,

            lcmp => buffer.write_u8(0x94)?,
            fcmpl => buffer.write_u8(0x95)?,
            fcmpg => buffer.write_u8(0x96)?,
            dcmpl => buffer.write_u8(0x97)?,
            dcmpg => buffer.write_u8(0x98)?,
            ifeq(offset) => Self::write_branch(buffer, 0x99, *offset)?,
            ifne(offset) => Self::write_branch(buffer, 0x9a, *offset)?,
            iflt(offset) => Self::write_branch(buffer, 0x9b, *offset)?,
            ifge(offset) => Self::write_branch(buffer, 0x9c, *offset)?,
            ifgt(offset) => Self::write_branch(buffer, 0x9d, *offset)?,
            ifle(offset) => Self::write_branch(buffer, 0x9e, *offset)?,
            if_icmpeq(offset) => Self::write_branch(buffer, 0x9f, *offset)?,
            if_icmpne(offset) => Self::write_branch(buffer, 0xa0, *offset)?,
            if_icmplt(offset) => Self::write_branch(buffer, 0xa1, *offset)?,
            if_icmpge(offset) => Self::write_branch(buffer, 0xa2, *offset)?,
            if_icmpgt(offset) => Self::write_branch(buffer, 0xa3, *offset)?,
            if_icmple(offset) => Self::write_branch(buffer, 0xa4, *offset)?,
            if_acmpeq(offset) => Self::write_branch(buffer, 0xa5, *offset)?,
            if_acmpne(offset) => Self::write_branch(buffer, 0xa6, *offset)?,

            goto(offset) => Self::write_branch(buffer, 0xa7, *offset)?,
            jsr(offset) => Self::write_branch(buffer, 0xa8, *offset)?,
            ret(index) => {
                if *index <= u8::max_value() as u16 {
                    buffer.write_u8(0xa9)?;
                    buffer.write_u8(*index as u8)?;
                } else {
                    buffer.write_u8(WIDE)?;
                    buffer.write_u8(0xa9)?;
                    buffer.write_u16::<BigEndian>(*index)?;
                }
            }
            tableswitch {
                default,
                low,
                offsets,
            } => {
                buffer.write_u8(0xaa)?;
                while buffer.position() % 4 != 0 {
                    buffer.write_u8(0)?;
                }

                buffer.write_i32::<BigEndian>(*default)?;
                buffer.write_i32::<BigEndian>(*low)?;
                buffer.write_i32::<BigEndian>(*low + offsets.len() as i32 - 1)?;
                for offset in offsets {
                    buffer.write_i32::<BigEndian>(*offset)?;
                }
            }
            lookupswitch { default, pairs } => {
                buffer.write_u8(0xab)?;
                while buffer.position() % 4 != 0 {
                    buffer.write_u8(0)?;
                }

                buffer.write_i32::<BigEndian>(*default)?;
                buffer.write_i32::<BigEndian>(pairs.len() as i32)?;
                for (match_value, offset) in pairs {
                    buffer.write_i32::<BigEndian>(*match_value)?;
                    buffer.write_i32::<BigEndian>(*offset)?;
                }
            }
            ireturn => buffer.write_u8(0xac)?,
            lreturn => buffer.write_u8(0xad)?,
            freturn => buffer.write_u8(0xae)?,
            dreturn => buffer.write_u8(0xaf)?,
            areturn => buffer.write_u8(0xb0)?,
            r#return => buffer.write_u8(0xb1)?,

            getstatic(member) => Self::write_member(pool, buffer, 0xb2, member, false)?,
            putstatic(member) => Self::write_member(pool, buffer, 0xb3, member, false)?,
            getfield(member) => Self::write_member(pool, buffer, 0xb4, member, false)?,
            putfield(member) => Self::write_member(pool, buffer, 0xb5, member, false)?,
            invokevirtual(member) => Self::write_member(pool, buffer, 0xb6, member, true)?,
            invokespecial(member) => Self::write_member(pool, buffer, 0xb7, member, true)?,
            invokestatic(member) => Self::write_member(pool, buffer, 0xb8, member, true)?,
            invokeinterface { method, count } => {
                let index = intern_member(
                    pool,
                    method,
                    crate::class::constant::TAG_INTERFACE_METHOD_REF,
                );
                buffer.write_u8(0xb9)?;
                buffer.write_u16::<BigEndian>(index)?;
                buffer.write_u8(*count)?;
                buffer.write_u8(0)?;
            }
            invokedynamic {
                bootstrap_method_attr_index,
                name,
                descriptor,
            } => {
                let name_index = pool.add_utf8(name.clone());
                let descriptor_index = pool.add_utf8(descriptor.clone());
                let name_and_type_index = pool.add(Constant::NameAndType {
                    name_index,
                    descriptor_index,
                });
                let index = pool.add(Constant::InvokeDynamic {
                    bootstrap_method_attr_index: *bootstrap_method_attr_index,
                    name_and_type_index,
                });
                buffer.write_u8(0xba)?;
                buffer.write_u16::<BigEndian>(index)?;
                buffer.write_u16::<BigEndian>(0)?;
            }
            new(type_) => {
                let index = pool.add_class(class_constant_name(type_));
                buffer.write_u8(0xbb)?;
                buffer.write_u16::<BigEndian>(index)?;
            }
            newarray(element) => {
                buffer.write_u8(0xbc)?;
                buffer.write_u8(newarray_code(element)?)?;
            }
            anewarray(array_type) => {
                let element = match array_type {
                    Type::Array { element, dimension } if *dimension > 1 => Type::Array {
                        element: element.clone(),
                        dimension: dimension - 1,
                    },
                    Type::Array { element, .. } => (**element).clone(),
                    other => {
                        return Err(ClassError::code(format!(
                            "anewarray carries non-array type {}",
                            other
                        )))
                    }
                };
                let index = pool.add_class(class_constant_name(&element));
                buffer.write_u8(0xbd)?;
                buffer.write_u16::<BigEndian>(index)?;
            }
            arraylength => buffer.write_u8(0xbe)?,
            athrow => buffer.write_u8(0xbf)?,
            checkcast(type_) => {
                let index = pool.add_class(class_constant_name(type_));
                buffer.write_u8(0xc0)?;
                buffer.write_u16::<BigEndian>(index)?;
            }
            instanceof(type_) => {
                let index = pool.add_class(class_constant_name(type_));
                buffer.write_u8(0xc1)?;
                buffer.write_u16::<BigEndian>(index)?;
            }
            monitorenter => buffer.write_u8(0xc2)?,
            monitorexit => buffer.write_u8(0xc3)?,
            multianewarray {
                array_type,
                dimension,
            } => {
                let index = pool.add_class(class_constant_name(array_type));
                buffer.write_u8(0xc5)?;
                buffer.write_u16::<BigEndian>(index)?;
                buffer.write_u8(*dimension)?;
            }
            ifnull(offset) => Self::write_branch(buffer, 0xc6, *offset)?,
            ifnonnull(offset) => Self::write_branch(buffer, 0xc7, *offset)?,
            goto_w(offset) => {
                buffer.write_u8(0xc8)?;
                buffer.write_i32::<BigEndian>(*offset)?;
            }
            jsr_w(offset) => {
                buffer.write_u8(0xc9)?;
                buffer.write_i32::<BigEndian>(*offset)?;
            }
        }

        Ok(())
    }

    fn write_branch(buffer: &mut Cursor<Vec<u8>>, opcode: u8, offset: i16) -> Result<(), ClassError> {
        buffer.write_u8(opcode)?;
        buffer.write_i16::<BigEndian>(offset)?;
        Ok(())
    }

    fn write_member(
        pool: &mut ConstantPool,
        buffer: &mut Cursor<Vec<u8>>,
        opcode: u8,
        member: &MemberRef,
        method: bool,
    ) -> Result<(), ClassError> {
        let tag = if method {
            crate::class::constant::TAG_METHOD_REF
        } else {
            crate::class::constant::TAG_FIELD_REF
        };
        let index = intern_member(pool, member, tag);
        buffer.write_u8(opcode)?;
        buffer.write_u16::<BigEndian>(index)?;
        Ok(())
    }

    /// The number of bytes this instruction occupies when written at `offset` (switch padding
    /// depends on it). Pool-touching instructions intern their constants so the width of the
    /// `ldc` index is known; `add` is idempotent so this is safe to call before [`Self::write`].
    pub fn encoded_size(&self, offset: u32, pool: &mut ConstantPool) -> u32 {
        use Instruction::*;

        match self {
            bipush(_) => 2,
            sipush(_) => 3,
            ldc(constant) | ldc_w(constant) => {
                if intern_loadable(pool, constant) <= u8::max_value() as u16 {
                    2
                } else {
                    3
                }
            }
            ldc2_w(constant) => {
                intern_loadable(pool, constant);
                3
            }
            iload(index) | lload(index) | fload(index) | dload(index) | aload(index)
            | istore(index) | lstore(index) | fstore(index) | dstore(index) | astore(index) => {
                match *index {
                    0..=3 => 1,
                    4..=255 => 2,
                    _ => 4,
                }
            }
            ret(index) => {
                if *index <= u8::max_value() as u16 {
                    2
                } else {
                    4
                }
            }
            iinc { index, constant } => {
                if *index <= u8::max_value() as u16
                    && *constant >= i8::min_value() as i16
                    && *constant <= i8::max_value() as i16
                {
                    3
                } else {
                    6
                }
            }
            ifeq(_) | ifne(_) | iflt(_) | ifge(_) | ifgt(_) | ifle(_) | if_icmpeq(_)
            | if_icmpne(_) | if_icmplt(_) | if_icmpge(_) | if_icmpgt(_) | if_icmple(_)
            | if_acmpeq(_) | if_acmpne(_) | ifnull(_) | ifnonnull(_) | goto(_) | jsr(_) => 3,
            goto_w(_) | jsr_w(_) => 5,
            tableswitch { offsets, .. } => {
                let padding = (4 - (offset + 1) % 4) % 4;
                1 + padding + 12 + 4 * offsets.len() as u32
            }
            lookupswitch { pairs, .. } => {
                let padding = (4 - (offset + 1) % 4) % 4;
                1 + padding + 8 + 8 * pairs.len() as u32
            }
            getstatic(member) | putstatic(member) | getfield(member) | putfield(member) => {
                intern_member(pool, member, crate::class::constant::TAG_FIELD_REF);
                3
            }
            invokevirtual(member) | invokespecial(member) | invokestatic(member) => {
                intern_member(pool, member, crate::class::constant::TAG_METHOD_REF);
                3
            }
            invokeinterface { method, .. } => {
                intern_member(
                    pool,
                    method,
                    crate::class::constant::TAG_INTERFACE_METHOD_REF,
                );
                5
            }
            invokedynamic { .. } => 5,
            new(type_) | checkcast(type_) | instanceof(type_) => {
                pool.add_class(class_constant_name(type_));
                3
            }
            newarray(_) => 2,
            anewarray(_) => 3,
            multianewarray { array_type, .. } => {
                pool.add_class(class_constant_name(array_type));
                4
            }
            _ => 1,
        }
    }
}
