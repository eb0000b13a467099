use std::io::{self, Cursor, Error, ErrorKind, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::class::attribute::{AttributeInfo, CodeAttribute, InnerClasses};
use crate::class::constant::ConstantPool;
use crate::class::{check_magic_number, BufferedRead, ClassVersion};
use crate::descriptor;
use crate::error::ClassError;
use crate::types::Type;

bitflags! {
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

impl BufferedRead for AccessFlags {
    fn read<T: Read + Seek>(buffer: &mut T) -> io::Result<Self> {
        match AccessFlags::from_bits(buffer.read_u16::<BigEndian>()?) {
            Some(flags) => Ok(flags),
            None => Err(Error::new(
                ErrorKind::InvalidData,
                "access flags can not be parsed",
            )),
        }
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        buffer.write_u16::<BigEndian>(self.bits())
    }
}

readable_struct! {
    pub no_copy struct FieldInfo {
        access_flags: AccessFlags,
        name_index: u16,
        descriptor_index: u16,
        attributes: Vec<AttributeInfo>,
    }
}

impl FieldInfo {
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.get_utf8(self.name_index)
    }

    pub fn field_type(&self, pool: &ConstantPool) -> Result<Type, ClassError> {
        let raw = pool.get_utf8(self.descriptor_index)?;
        match descriptor::parse_field_descriptor(raw, false, false) {
            Ok(type_) => Ok(type_),
            Err(error) => {
                warn!("invalid field descriptor {:?}: {}", raw, error);
                descriptor::parse_field_descriptor(raw, false, true)
            }
        }
    }
}

readable_struct! {
    pub no_copy struct MethodInfo {
        access_flags: AccessFlags,
        name_index: u16,
        descriptor_index: u16,
        attributes: Vec<AttributeInfo>,
    }
}

impl MethodInfo {
    pub fn name<'p>(&self, pool: &'p ConstantPool) -> Result<&'p str, ClassError> {
        pool.get_utf8(self.name_index)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }

    pub fn is_abstract_or_native(&self) -> bool {
        self.access_flags
            .intersects(AccessFlags::ABSTRACT | AccessFlags::NATIVE)
    }

    /// The parsed `(arguments, return)` pair. A malformed descriptor is recovered best-effort so
    /// this always yields the tuple shape, with `top` standing in for what could not be read.
    pub fn descriptor(&self, pool: &ConstantPool) -> Result<(Vec<Type>, Type), ClassError> {
        let raw = pool.get_utf8(self.descriptor_index)?;
        match descriptor::parse_method_descriptor(raw, false, false) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                warn!("invalid method descriptor {:?}: {}", raw, error);
                descriptor::parse_method_descriptor(raw, false, true)
            }
        }
    }

    pub fn code(&self, pool: &ConstantPool) -> Result<Option<CodeAttribute>, ClassError> {
        for attribute in &self.attributes {
            if attribute.name(pool)? == CodeAttribute::NAME {
                return Ok(Some(CodeAttribute::read(pool, &attribute.info)?));
            }
        }
        Ok(None)
    }

    /// Re-encodes and installs a `Code` attribute, replacing the existing one.
    pub fn set_code(&mut self, pool: &mut ConstantPool, code: &CodeAttribute) -> Result<(), ClassError> {
        let name_index = pool.add_utf8(CodeAttribute::NAME);
        let info = code.write(pool)?;

        for attribute in &mut self.attributes {
            if attribute.name_index == name_index {
                attribute.info = info;
                return Ok(());
            }
        }

        self.attributes.push(AttributeInfo { name_index, info });
        Ok(())
    }
}

/// A parsed class file: the constant pool plus the structures hanging off it. Attribute payloads
/// this crate does not model are preserved raw so writing reproduces them exactly.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: ClassVersion,
    pub constant_pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> Result<Self, ClassError> {
        let mut buffer = Cursor::new(data);

        if !check_magic_number(&mut buffer)? {
            return Err(ClassError::code("bad magic number"));
        }

        let version = ClassVersion::read(&mut buffer)?;
        trace!("class file version {:?}", version);

        let constant_pool = ConstantPool::read(&mut buffer)?;

        let access_flags = AccessFlags::read(&mut buffer)?;
        let this_class = buffer.read_u16::<BigEndian>()?;
        let super_class = buffer.read_u16::<BigEndian>()?;
        let interfaces = <Vec<u16>>::read(&mut buffer)?;
        let fields = <Vec<FieldInfo>>::read(&mut buffer)?;
        let methods = <Vec<MethodInfo>>::read(&mut buffer)?;
        let attributes = <Vec<AttributeInfo>>::read(&mut buffer)?;

        Ok(ClassFile {
            version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn write(&self) -> Result<Vec<u8>, ClassError> {
        let mut vec = Vec::new();
        let mut buffer = Cursor::new(&mut vec);

        buffer.write_u32::<BigEndian>(0xCAFE_BABE)?;
        self.version.write(&mut buffer)?;
        self.constant_pool.write(&mut buffer)?;

        self.access_flags.write(&mut buffer)?;
        buffer.write_u16::<BigEndian>(self.this_class)?;
        buffer.write_u16::<BigEndian>(self.super_class)?;
        self.interfaces.write(&mut buffer)?;
        self.fields.write(&mut buffer)?;
        self.methods.write(&mut buffer)?;
        self.attributes.write(&mut buffer)?;

        Ok(vec)
    }

    pub fn name(&self) -> Result<&str, ClassError> {
        self.constant_pool.get_class_name(self.this_class)
    }

    pub fn inner_classes(&self) -> Result<Option<InnerClasses>, ClassError> {
        for attribute in &self.attributes {
            if attribute.name(&self.constant_pool)? == InnerClasses::NAME {
                let mut buffer = Cursor::new(&attribute.info[..]);
                return Ok(Some(InnerClasses::read(&mut buffer)?));
            }
        }
        Ok(None)
    }

    pub fn super_name(&self) -> Result<Option<&str>, ClassError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.constant_pool.get_class_name(self.super_class)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::attribute::ExceptionRange;
    use crate::instruction::Instruction::*;

    fn sample_class() -> ClassFile {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class("Example");
        let super_class = pool.add_class("java/lang/Object");

        let name_index = pool.add_utf8("answer");
        let descriptor_index = pool.add_utf8("()I");

        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: vec![(0, iconst_1), (1, ireturn)],
            code_length: 2,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        let mut method = MethodInfo {
            access_flags: AccessFlags::PUBLIC,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        };
        method.set_code(&mut pool, &code).unwrap();

        ClassFile {
            version: ClassVersion::new(52, 0),
            constant_pool: pool,
            access_flags: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: vec![method],
            attributes: Vec::new(),
        }
    }

    #[test]
    fn class_file_round_trip() {
        let class = sample_class();
        let bytes = class.write().unwrap();

        let reread = ClassFile::parse(&bytes).unwrap();
        assert_eq!(reread.name().unwrap(), "Example");
        assert_eq!(reread.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(reread.methods.len(), 1);

        let code = reread.methods[0].code(&reread.constant_pool).unwrap().unwrap();
        assert_eq!(code.code, vec![(0, iconst_1), (1, ireturn)]);

        // A second write is byte-identical: the pool is already canonical.
        assert_eq!(reread.write().unwrap(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            ClassFile::parse(&[0xde, 0xad, 0xbe, 0xef]),
            Err(ClassError::MalformedCode(_))
        ));
    }

    #[test]
    fn method_descriptor_fallback_keeps_tuple_shape() {
        let mut pool = ConstantPool::new();
        let name_index = pool.add_utf8("broken");
        let descriptor_index = pool.add_utf8("(Inot a descriptor");

        let method = MethodInfo {
            access_flags: AccessFlags::PUBLIC,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        };

        let (arguments, return_type) = method.descriptor(&pool).unwrap();
        assert_eq!(arguments, vec![Type::Int]);
        assert_eq!(return_type, Type::Top);
    }

    #[test]
    fn inner_classes_attribute_round_trips() {
        use crate::class::attribute::{InnerClass, InnerClasses};
        use std::io::Cursor;

        let mut class = sample_class();
        let inner = InnerClasses {
            classes: vec![InnerClass {
                inner_class_info: 1,
                outer_class_info: 2,
                inner_name_index: 3,
                inner_class_access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
            }],
        };

        let mut info = Vec::new();
        inner.write(&mut Cursor::new(&mut info)).unwrap();
        let name_index = class.constant_pool.add_utf8("InnerClasses");
        class.attributes.push(AttributeInfo { name_index, info });

        let bytes = class.write().unwrap();
        let reread = ClassFile::parse(&bytes).unwrap();
        assert_eq!(reread.inner_classes().unwrap(), Some(inner));
    }

    #[test]
    fn exception_table_survives_code_round_trip() {
        let mut pool = ConstantPool::new();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: vec![(0, iconst_1), (1, ireturn)],
            code_length: 2,
            exception_table: vec![ExceptionRange {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
                catch_type: None,
            }],
            attributes: Vec::new(),
        };

        let bytes = code.write(&mut pool).unwrap();
        let reread = CodeAttribute::read(&pool, &bytes).unwrap();
        assert_eq!(reread.exception_table, code.exception_table);
    }
}
