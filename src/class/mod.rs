/// Generates a plain struct whose binary layout is the concatenation of its fields, together
/// with its [`BufferedRead`] impl.
macro_rules! readable_struct {
    (pub struct $name:ident { $($field:ident: $type:ty,)* }) => {
        #[derive(Debug, Copy, Clone, PartialEq)]
        pub struct $name {
            $(pub $field: $type,)*
        }

        readable_struct!(@codec $name { $($field,)* });
    };
    (pub no_copy struct $name:ident { $($field:ident: $type:ty,)* }) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(pub $field: $type,)*
        }

        readable_struct!(@codec $name { $($field,)* });
    };
    (@codec $name:ident { $($field:ident,)* }) => {
        impl crate::class::BufferedRead for $name {
            fn read<T: std::io::Read + std::io::Seek>(buffer: &mut T) -> std::io::Result<Self> {
                Ok($name {
                    $($field: crate::class::BufferedRead::read(buffer)?,)*
                })
            }

            fn write<T: std::io::Write + std::io::Seek>(&self, buffer: &mut T) -> std::io::Result<()> {
                $(self.$field.write(buffer)?;)*
                Ok(())
            }
        }
    };
}

pub mod attribute;
mod class_file;
pub mod constant;
mod version;

pub use class_file::*;
pub use version::*;

use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Binary codec for the fixed-layout pieces of a class file. Structures whose encoding needs the
/// constant pool (constants themselves, instructions, stack maps) define their own `read`/`write`
/// pairs taking the pool instead.
pub trait BufferedRead: Sized {
    fn read<T: Read + Seek>(buffer: &mut T) -> io::Result<Self>;

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()>;
}

// Tables in the class file format are length-prefixed with a u16 count.
impl<I: BufferedRead> BufferedRead for Vec<I> {
    fn read<T: Read + Seek>(buffer: &mut T) -> io::Result<Self> {
        let count = buffer.read_u16::<BigEndian>()?;
        let mut items = Vec::with_capacity(count as usize);

        for _ in 0..count {
            items.push(I::read(buffer)?);
        }

        Ok(items)
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        buffer.write_u16::<BigEndian>(self.len() as u16)?;

        for item in self {
            item.write(buffer)?;
        }

        Ok(())
    }
}

impl BufferedRead for u16 {
    fn read<T: Read + Seek>(buffer: &mut T) -> io::Result<Self> {
        buffer.read_u16::<BigEndian>()
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        buffer.write_u16::<BigEndian>(*self)
    }
}
