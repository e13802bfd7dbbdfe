use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// One of the 16 data-directory slots in the PE optional header: an RVA
/// and a size, both zero when the directory is unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub rva: u32,
    pub size: u32,
}

impl DataDirectory {
    pub const SIZE: u64 = 8;

    pub fn new(rva: u32, size: u32) -> Self {
        DataDirectory { rva, size }
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(DataDirectory {
            rva: r.read_u32::<LittleEndian>()?,
            size: r.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.rva)?;
        w.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }
}

/// Indices into the 16-entry data-directory array this linker cares about;
/// everything else is always zero.
#[derive(Debug, Clone, Copy)]
pub enum DataDirectoryIndex {
    Export = 0,
    Import = 1,
    Resource = 2,
    Exception = 3,
    Certificate = 4,
    BaseRelocation = 5,
    Debug = 6,
    Copyright = 7,
    GlobalPtr = 8,
    Tls = 9,
    LoadConfig = 10,
    BoundImport = 11,
    Iat = 12,
    DelayImport = 13,
    ClrRuntime = 14,
    Reserved = 15,
}

pub const NUMBER_OF_DATA_DIRECTORIES: usize = 16;
