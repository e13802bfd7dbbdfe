use super::characteristics::FileCharacteristics;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// COFF file header — used both as the header of an object file and,
/// unchanged in layout, as the PE file header that follows the `PE\0\0`
/// signature (20 bytes either way).
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub optional_header_size: u16,
    pub characteristics: FileCharacteristics,
}

impl FileHeader {
    pub const SIZE: u64 = 20;
    pub const MACHINE_I386: u16 = 0x014c;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(FileHeader {
            machine: r.read_u16::<LittleEndian>()?,
            number_of_sections: r.read_u16::<LittleEndian>()?,
            time_date_stamp: r.read_u32::<LittleEndian>()?,
            pointer_to_symbol_table: r.read_u32::<LittleEndian>()?,
            number_of_symbols: r.read_u32::<LittleEndian>()?,
            optional_header_size: r.read_u16::<LittleEndian>()?,
            characteristics: FileCharacteristics::new(r.read_u16::<LittleEndian>()?),
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.machine)?;
        w.write_u16::<LittleEndian>(self.number_of_sections)?;
        w.write_u32::<LittleEndian>(self.time_date_stamp)?;
        w.write_u32::<LittleEndian>(self.pointer_to_symbol_table)?;
        w.write_u32::<LittleEndian>(self.number_of_symbols)?;
        w.write_u16::<LittleEndian>(self.optional_header_size)?;
        w.write_u16::<LittleEndian>(self.characteristics.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips() {
        let header = FileHeader {
            machine: FileHeader::MACHINE_I386,
            number_of_sections: 3,
            time_date_stamp: 0,
            pointer_to_symbol_table: 0x1234,
            number_of_symbols: 7,
            optional_header_size: 224,
            characteristics: FileCharacteristics::output_image(),
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), FileHeader::SIZE as usize);

        let decoded = FileHeader::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.machine, header.machine);
        assert_eq!(decoded.number_of_sections, header.number_of_sections);
        assert_eq!(decoded.characteristics, header.characteristics);
    }
}
