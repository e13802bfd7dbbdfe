use super::characteristics::SectionCharacteristics;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Section header, 40 bytes, used identically for object-file sections and
/// output PE sections.
#[derive(Debug, Clone, Default)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

impl SectionHeader {
    pub const SIZE: u64 = 40;

    /// NUL-padded 8-byte section name; truncates names over 8 bytes the
    /// way the rest of this linker's section names never do (long-name
    /// string-table indirection is not supported).
    pub fn name_bytes(name: &str) -> [u8; 8] {
        let mut buf = [0u8; 8];
        let bytes = name.as_bytes();
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut name = [0u8; 8];
        r.read_exact(&mut name)?;
        Ok(SectionHeader {
            name,
            virtual_size: r.read_u32::<LittleEndian>()?,
            virtual_address: r.read_u32::<LittleEndian>()?,
            size_of_raw_data: r.read_u32::<LittleEndian>()?,
            pointer_to_raw_data: r.read_u32::<LittleEndian>()?,
            pointer_to_relocations: r.read_u32::<LittleEndian>()?,
            pointer_to_linenumbers: r.read_u32::<LittleEndian>()?,
            number_of_relocations: r.read_u16::<LittleEndian>()?,
            number_of_linenumbers: r.read_u16::<LittleEndian>()?,
            characteristics: SectionCharacteristics::new(r.read_u32::<LittleEndian>()?),
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.name)?;
        w.write_u32::<LittleEndian>(self.virtual_size)?;
        w.write_u32::<LittleEndian>(self.virtual_address)?;
        w.write_u32::<LittleEndian>(self.size_of_raw_data)?;
        w.write_u32::<LittleEndian>(self.pointer_to_raw_data)?;
        w.write_u32::<LittleEndian>(self.pointer_to_relocations)?;
        w.write_u32::<LittleEndian>(self.pointer_to_linenumbers)?;
        w.write_u16::<LittleEndian>(self.number_of_relocations)?;
        w.write_u16::<LittleEndian>(self.number_of_linenumbers)?;
        w.write_u32::<LittleEndian>(self.characteristics.0)?;
        Ok(())
    }
}
