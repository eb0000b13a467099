use std::cmp::Ordering;
use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::class::BufferedRead;

pub fn check_magic_number<T: Read>(buffer: &mut T) -> io::Result<bool> {
    let magic = buffer.read_u32::<BigEndian>()?;
    Ok(magic == 0xCAFE_BABE)
}

/// Major/minor class file version.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClassVersion(pub u16, pub u16);

impl ClassVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        ClassVersion(major, minor)
    }

    /// Version 50.0 (Java 6) introduced the `StackMapTable` attribute.
    pub const STACK_MAP_TABLE: ClassVersion = ClassVersion(50, 0);
}

impl BufferedRead for ClassVersion {
    fn read<T: Read + Seek>(buffer: &mut T) -> io::Result<Self> {
        let minor = buffer.read_u16::<BigEndian>()?;
        let major = buffer.read_u16::<BigEndian>()?;
        Ok(ClassVersion(major, minor))
    }

    fn write<T: Write + Seek>(&self, buffer: &mut T) -> io::Result<()> {
        let ClassVersion(major, minor) = *self;

        buffer.write_u16::<BigEndian>(minor)?;
        buffer.write_u16::<BigEndian>(major)
    }
}

impl PartialOrd for ClassVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.cmp(&other.0) {
            Ordering::Equal => self.1.cmp(&other.1),
            x => x,
        }
    }
}
