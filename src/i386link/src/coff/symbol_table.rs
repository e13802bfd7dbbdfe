use super::characteristics::{StorageClass, SymbolType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Either an inline 8-byte name or, when the first four bytes are zero, an
/// offset into the object's string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolName {
    Inline([u8; 8]),
    StringTableOffset(u32),
}

impl SymbolName {
    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut raw = [0u8; 8];
        r.read_exact(&mut raw)?;
        if raw[0..4] == [0, 0, 0, 0] {
            let offset = u32::from_le_bytes(raw[4..8].try_into().unwrap());
            Ok(SymbolName::StringTableOffset(offset))
        } else {
            Ok(SymbolName::Inline(raw))
        }
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            SymbolName::Inline(bytes) => w.write_all(bytes),
            SymbolName::StringTableOffset(offset) => {
                w.write_all(&[0u8; 4])?;
                w.write_u32::<LittleEndian>(*offset)
            }
        }
    }

    pub fn inline_str(&self) -> Option<String> {
        match self {
            SymbolName::Inline(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(8);
                Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            SymbolName::StringTableOffset(_) => None,
        }
    }
}

/// Standard (non-auxiliary) symbol-table slot, 18 bytes.
#[derive(Debug, Clone)]
pub struct StandardSymbol {
    pub name: SymbolName,
    pub value: u32,
    pub section_number: i16,
    pub symbol_type: SymbolType,
    pub storage_class: StorageClass,
    pub number_of_aux_symbols: u8,
}

impl StandardSymbol {
    pub const SIZE: u64 = 18;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let name = SymbolName::read(r)?;
        let value = r.read_u32::<LittleEndian>()?;
        let section_number = r.read_i16::<LittleEndian>()?;
        let symbol_type = SymbolType::new(r.read_u16::<LittleEndian>()?);
        let storage_class = StorageClass::new(r.read_u8()?);
        let number_of_aux_symbols = r.read_u8()?;

        Ok(StandardSymbol {
            name,
            value,
            section_number,
            symbol_type,
            storage_class,
            number_of_aux_symbols,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.name.write(w)?;
        w.write_u32::<LittleEndian>(self.value)?;
        w.write_i16::<LittleEndian>(self.section_number)?;
        w.write_u16::<LittleEndian>(self.symbol_type.0)?;
        w.write_u8(self.storage_class.0)?;
        w.write_u8(self.number_of_aux_symbols)?;
        Ok(())
    }

    pub fn is_external(&self) -> bool {
        self.storage_class.is(StorageClass::EXTERNAL)
    }
}

/// Auxiliary symbol record, one of five sub-variants, each 18
/// bytes, decoded from the immediately preceding `StandardSymbol`'s
/// `(storage_class, type, section_number, value)` tuple rather than an
/// in-band tag. `Unknown` preserves the raw bytes of an aux slot this
/// linker does not need to interpret so round-tripping still works.
#[derive(Debug, Clone)]
pub enum AuxRecord {
    FunctionDefinition {
        tag_index: u32,
        total_size: u32,
        pointer_to_line_number: u32,
        pointer_to_next_function: u32,
    },
    FunctionBeginEnd {
        line_number: u16,
        pointer_to_next_function: u32,
    },
    WeakExternal {
        tag_index: u32,
        characteristics: u32,
    },
    File {
        filename: [u8; 18],
    },
    SectionDefinition {
        length: u32,
        number_of_relocations: u16,
        number_of_line_numbers: u16,
        checksum: u32,
        number: u16,
        selection: u8,
    },
    Unknown([u8; 18]),
}

impl AuxRecord {
    pub const SIZE: u64 = 18;

    /// Picks the sub-variant from the preceding standard symbol's storage
    /// class, type and section number, then decodes it.
    pub fn read<R: Read>(r: &mut R, preceding: &StandardSymbol) -> io::Result<Self> {
        let mut raw = [0u8; 18];
        r.read_exact(&mut raw)?;
        let mut cursor = io::Cursor::new(&raw[..]);

        if preceding.storage_class.is(StorageClass::EXTERNAL)
            && preceding.symbol_type.is_function()
            && preceding.section_number > 0
        {
            return Ok(AuxRecord::FunctionDefinition {
                tag_index: cursor.read_u32::<LittleEndian>()?,
                total_size: cursor.read_u32::<LittleEndian>()?,
                pointer_to_line_number: cursor.read_u32::<LittleEndian>()?,
                pointer_to_next_function: cursor.read_u32::<LittleEndian>()?,
            });
        }

        if preceding.storage_class.is(StorageClass::FUNCTION) {
            cursor.set_position(4);
            let line_number = cursor.read_u16::<LittleEndian>()?;
            cursor.set_position(12);
            let pointer_to_next_function = cursor.read_u32::<LittleEndian>()?;
            return Ok(AuxRecord::FunctionBeginEnd {
                line_number,
                pointer_to_next_function,
            });
        }

        if preceding.storage_class.is(StorageClass::EXTERNAL)
            && preceding.section_number == 0
            && preceding.value == 0
        {
            return Ok(AuxRecord::WeakExternal {
                tag_index: cursor.read_u32::<LittleEndian>()?,
                characteristics: cursor.read_u32::<LittleEndian>()?,
            });
        }

        if preceding.storage_class.is(StorageClass::FILE) {
            return Ok(AuxRecord::File { filename: raw });
        }

        if preceding.storage_class.is(StorageClass::STATIC) {
            let length = cursor.read_u32::<LittleEndian>()?;
            let number_of_relocations = cursor.read_u16::<LittleEndian>()?;
            let number_of_line_numbers = cursor.read_u16::<LittleEndian>()?;
            let checksum = cursor.read_u32::<LittleEndian>()?;
            let number = cursor.read_u16::<LittleEndian>()?;
            let selection = cursor.read_u8()?;
            return Ok(AuxRecord::SectionDefinition {
                length,
                number_of_relocations,
                number_of_line_numbers,
                checksum,
                number,
                selection,
            });
        }

        Ok(AuxRecord::Unknown(raw))
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut raw = [0u8; 18];
        {
            let mut cursor = io::Cursor::new(&mut raw[..]);
            match self {
                AuxRecord::FunctionDefinition {
                    tag_index,
                    total_size,
                    pointer_to_line_number,
                    pointer_to_next_function,
                } => {
                    cursor.write_u32::<LittleEndian>(*tag_index)?;
                    cursor.write_u32::<LittleEndian>(*total_size)?;
                    cursor.write_u32::<LittleEndian>(*pointer_to_line_number)?;
                    cursor.write_u32::<LittleEndian>(*pointer_to_next_function)?;
                }
                AuxRecord::FunctionBeginEnd {
                    line_number,
                    pointer_to_next_function,
                } => {
                    cursor.set_position(4);
                    cursor.write_u16::<LittleEndian>(*line_number)?;
                    cursor.set_position(12);
                    cursor.write_u32::<LittleEndian>(*pointer_to_next_function)?;
                }
                AuxRecord::WeakExternal {
                    tag_index,
                    characteristics,
                } => {
                    cursor.write_u32::<LittleEndian>(*tag_index)?;
                    cursor.write_u32::<LittleEndian>(*characteristics)?;
                }
                AuxRecord::File { filename } => {
                    return w.write_all(filename);
                }
                AuxRecord::SectionDefinition {
                    length,
                    number_of_relocations,
                    number_of_line_numbers,
                    checksum,
                    number,
                    selection,
                } => {
                    cursor.write_u32::<LittleEndian>(*length)?;
                    cursor.write_u16::<LittleEndian>(*number_of_relocations)?;
                    cursor.write_u16::<LittleEndian>(*number_of_line_numbers)?;
                    cursor.write_u32::<LittleEndian>(*checksum)?;
                    cursor.write_u16::<LittleEndian>(*number)?;
                    cursor.write_u8(*selection)?;
                }
                AuxRecord::Unknown(bytes) => {
                    return w.write_all(bytes);
                }
            }
        }
        w.write_all(&raw)
    }
}

/// The object's string table: a 4-byte total-size prefix followed by
/// consecutive NUL-terminated strings, indexed by byte offset from the
/// start of the table (the first string therefore sits at offset 4).
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    raw: Vec<u8>,
}

impl StringTable {
    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let size = r.read_u32::<LittleEndian>()?;
        let mut raw = vec![0u8; 4];
        raw[0..4].copy_from_slice(&size.to_le_bytes());
        if size >= 4 {
            let mut rest = vec![0u8; (size - 4) as usize];
            r.read_exact(&mut rest)?;
            raw.extend_from_slice(&rest);
        }
        Ok(StringTable { raw })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.raw)
    }

    pub fn get(&self, offset: u32) -> Option<String> {
        let offset = offset as usize;
        if offset < 4 || offset >= self.raw.len() {
            return None;
        }
        let end = self.raw[offset..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| offset + p)?;
        Some(String::from_utf8_lossy(&self.raw[offset..end]).into_owned())
    }

    pub fn len(&self) -> u32 {
        self.raw.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn standard_symbol_round_trips_with_inline_name() {
        let symbol = StandardSymbol {
            name: SymbolName::Inline(inline_name(".text")),
            value: 0,
            section_number: 1,
            symbol_type: SymbolType::new(0),
            storage_class: StorageClass::new(StorageClass::STATIC),
            number_of_aux_symbols: 1,
        };
        let mut buf = Vec::new();
        symbol.write(&mut buf).unwrap();
        assert_eq!(buf.len(), StandardSymbol::SIZE as usize);

        let decoded = StandardSymbol::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.name.inline_str().unwrap(), ".text");
        assert_eq!(decoded.section_number, 1);
    }

    #[test]
    fn section_definition_aux_follows_static_symbol() {
        let standard = StandardSymbol {
            name: SymbolName::Inline(inline_name(".text")),
            value: 0,
            section_number: 1,
            symbol_type: SymbolType::new(0),
            storage_class: StorageClass::new(StorageClass::STATIC),
            number_of_aux_symbols: 1,
        };
        let aux = AuxRecord::SectionDefinition {
            length: 32,
            number_of_relocations: 2,
            number_of_line_numbers: 0,
            checksum: 0,
            number: 1,
            selection: 0,
        };
        let mut buf = Vec::new();
        aux.write(&mut buf).unwrap();
        assert_eq!(buf.len(), AuxRecord::SIZE as usize);

        let decoded = AuxRecord::read(&mut Cursor::new(buf), &standard).unwrap();
        match decoded {
            AuxRecord::SectionDefinition { length, .. } => assert_eq!(length, 32),
            other => panic!("expected SectionDefinition, got {other:?}"),
        }
    }

    #[test]
    fn string_table_indexes_by_byte_offset() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&13u32.to_le_bytes());
        raw.extend_from_slice(b"_f\0");
        raw.extend_from_slice(b"_main\0");
        let table = StringTable::read(&mut Cursor::new(raw)).unwrap();
        assert_eq!(table.get(4).unwrap(), "_f");
        assert_eq!(table.get(7).unwrap(), "_main");
    }

    fn inline_name(name: &str) -> [u8; 8] {
        let mut buf = [0u8; 8];
        let bytes = name.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }
}
