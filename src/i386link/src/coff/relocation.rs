use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// i386 relocation types this linker understands. Anything else is
/// an `UnsupportedRelocation` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationType {
    Absolute,
    Dir32Va,
    Dir32Rva,
    Rel32,
    Other(u16),
}

impl RelocationType {
    pub fn from_raw(value: u16) -> Self {
        match value {
            0x00 => RelocationType::Absolute,
            0x06 => RelocationType::Dir32Va,
            0x07 => RelocationType::Dir32Rva,
            0x14 => RelocationType::Rel32,
            other => RelocationType::Other(other),
        }
    }

    pub fn raw(&self) -> u16 {
        match self {
            RelocationType::Absolute => 0x00,
            RelocationType::Dir32Va => 0x06,
            RelocationType::Dir32Rva => 0x07,
            RelocationType::Rel32 => 0x14,
            RelocationType::Other(v) => *v,
        }
    }
}

/// A 10-byte COFF relocation entry.
#[derive(Debug, Clone, Copy)]
pub struct RelocationEntry {
    pub virtual_address: u32,
    pub symbol_table_index: u32,
    pub kind: RelocationType,
}

impl RelocationEntry {
    pub const SIZE: u64 = 10;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(RelocationEntry {
            virtual_address: r.read_u32::<LittleEndian>()?,
            symbol_table_index: r.read_u32::<LittleEndian>()?,
            kind: RelocationType::from_raw(r.read_u16::<LittleEndian>()?),
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.virtual_address)?;
        w.write_u32::<LittleEndian>(self.symbol_table_index)?;
        w.write_u16::<LittleEndian>(self.kind.raw())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let entry = RelocationEntry {
            virtual_address: 1,
            symbol_table_index: 3,
            kind: RelocationType::Rel32,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), RelocationEntry::SIZE as usize);

        let decoded = RelocationEntry::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.virtual_address, 1);
        assert_eq!(decoded.symbol_table_index, 3);
        assert_eq!(decoded.kind, RelocationType::Rel32);
    }

    #[test]
    fn unknown_type_round_trips_as_other() {
        assert_eq!(RelocationType::from_raw(0x99).raw(), 0x99);
    }
}
