use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// One 20-byte entry in the import directory array, one per imported DLL
/// plus a trailing all-zero terminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportDirectoryEntry {
    pub import_lookup_table_rva: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    pub name_rva: u32,
    pub import_address_table_rva: u32,
}

impl ImportDirectoryEntry {
    pub const SIZE: u64 = 20;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(ImportDirectoryEntry {
            import_lookup_table_rva: r.read_u32::<LittleEndian>()?,
            time_date_stamp: r.read_u32::<LittleEndian>()?,
            forwarder_chain: r.read_u32::<LittleEndian>()?,
            name_rva: r.read_u32::<LittleEndian>()?,
            import_address_table_rva: r.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.import_lookup_table_rva)?;
        w.write_u32::<LittleEndian>(self.time_date_stamp)?;
        w.write_u32::<LittleEndian>(self.forwarder_chain)?;
        w.write_u32::<LittleEndian>(self.name_rva)?;
        w.write_u32::<LittleEndian>(self.import_address_table_rva)?;
        Ok(())
    }
}

/// Hint/name table entry: a 2-byte hint (always 0, this linker never
/// consults the export ordinal hint) followed by the NUL-terminated
/// function name.
#[derive(Debug, Clone)]
pub struct HintNameEntry {
    pub hint: u16,
    pub name: String,
}

impl HintNameEntry {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.hint)?;
        w.write_all(self.name.as_bytes())?;
        w.write_u8(0)?;
        Ok(())
    }

    /// On-disk size including the hint field and the NUL terminator, not
    /// including any padding.
    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn import_directory_entry_round_trips() {
        let entry = ImportDirectoryEntry {
            import_lookup_table_rva: 0x2000,
            time_date_stamp: 0,
            forwarder_chain: 0,
            name_rva: 0x2100,
            import_address_table_rva: 0x2200,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), ImportDirectoryEntry::SIZE as usize);

        let decoded = ImportDirectoryEntry::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.name_rva, 0x2100);
    }

    #[test]
    fn hint_name_entry_encodes_hint_then_name_then_nul() {
        let entry = HintNameEntry {
            hint: 0,
            name: "MessageBoxA".to_string(),
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), entry.encoded_len());
        assert_eq!(&buf[2..13], b"MessageBoxA");
        assert_eq!(buf[13], 0);
    }
}
