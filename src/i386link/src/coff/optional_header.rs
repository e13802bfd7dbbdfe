use super::data_directory::{DataDirectory, NUMBER_OF_DATA_DIRECTORIES};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// PE32 optional header: 96 bytes of standard + NT-specific fields
/// followed by 16 data directories (224 bytes total). This is the only
/// optional-header variant the layout engine ever produces.
#[derive(Debug, Clone)]
pub struct OptionalHeader32 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,

    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_os_version: u16,
    pub minor_os_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,

    pub data_directories: [DataDirectory; NUMBER_OF_DATA_DIRECTORIES],
}

impl OptionalHeader32 {
    pub const SIZE: u64 = 96 + (NUMBER_OF_DATA_DIRECTORIES as u64) * DataDirectory::SIZE; // 224
    pub const MAGIC: u16 = 0x010b;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = r.read_u16::<LittleEndian>()?;
        let major_linker_version = r.read_u8()?;
        let minor_linker_version = r.read_u8()?;
        let size_of_code = r.read_u32::<LittleEndian>()?;
        let size_of_initialized_data = r.read_u32::<LittleEndian>()?;
        let size_of_uninitialized_data = r.read_u32::<LittleEndian>()?;
        let address_of_entry_point = r.read_u32::<LittleEndian>()?;
        let base_of_code = r.read_u32::<LittleEndian>()?;
        let base_of_data = r.read_u32::<LittleEndian>()?;

        let image_base = r.read_u32::<LittleEndian>()?;
        let section_alignment = r.read_u32::<LittleEndian>()?;
        let file_alignment = r.read_u32::<LittleEndian>()?;
        let major_os_version = r.read_u16::<LittleEndian>()?;
        let minor_os_version = r.read_u16::<LittleEndian>()?;
        let major_image_version = r.read_u16::<LittleEndian>()?;
        let minor_image_version = r.read_u16::<LittleEndian>()?;
        let major_subsystem_version = r.read_u16::<LittleEndian>()?;
        let minor_subsystem_version = r.read_u16::<LittleEndian>()?;
        let win32_version_value = r.read_u32::<LittleEndian>()?;
        let size_of_image = r.read_u32::<LittleEndian>()?;
        let size_of_headers = r.read_u32::<LittleEndian>()?;
        let check_sum = r.read_u32::<LittleEndian>()?;
        let subsystem = r.read_u16::<LittleEndian>()?;
        let dll_characteristics = r.read_u16::<LittleEndian>()?;
        let size_of_stack_reserve = r.read_u32::<LittleEndian>()?;
        let size_of_stack_commit = r.read_u32::<LittleEndian>()?;
        let size_of_heap_reserve = r.read_u32::<LittleEndian>()?;
        let size_of_heap_commit = r.read_u32::<LittleEndian>()?;
        let loader_flags = r.read_u32::<LittleEndian>()?;
        let number_of_rva_and_sizes = r.read_u32::<LittleEndian>()?;

        let mut data_directories = [DataDirectory::default(); NUMBER_OF_DATA_DIRECTORIES];
        for slot in data_directories.iter_mut() {
            *slot = DataDirectory::read(r)?;
        }

        Ok(OptionalHeader32 {
            magic,
            major_linker_version,
            minor_linker_version,
            size_of_code,
            size_of_initialized_data,
            size_of_uninitialized_data,
            address_of_entry_point,
            base_of_code,
            base_of_data,
            image_base,
            section_alignment,
            file_alignment,
            major_os_version,
            minor_os_version,
            major_image_version,
            minor_image_version,
            major_subsystem_version,
            minor_subsystem_version,
            win32_version_value,
            size_of_image,
            size_of_headers,
            check_sum,
            subsystem,
            dll_characteristics,
            size_of_stack_reserve,
            size_of_stack_commit,
            size_of_heap_reserve,
            size_of_heap_commit,
            loader_flags,
            number_of_rva_and_sizes,
            data_directories,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.magic)?;
        w.write_u8(self.major_linker_version)?;
        w.write_u8(self.minor_linker_version)?;
        w.write_u32::<LittleEndian>(self.size_of_code)?;
        w.write_u32::<LittleEndian>(self.size_of_initialized_data)?;
        w.write_u32::<LittleEndian>(self.size_of_uninitialized_data)?;
        w.write_u32::<LittleEndian>(self.address_of_entry_point)?;
        w.write_u32::<LittleEndian>(self.base_of_code)?;
        w.write_u32::<LittleEndian>(self.base_of_data)?;

        w.write_u32::<LittleEndian>(self.image_base)?;
        w.write_u32::<LittleEndian>(self.section_alignment)?;
        w.write_u32::<LittleEndian>(self.file_alignment)?;
        w.write_u16::<LittleEndian>(self.major_os_version)?;
        w.write_u16::<LittleEndian>(self.minor_os_version)?;
        w.write_u16::<LittleEndian>(self.major_image_version)?;
        w.write_u16::<LittleEndian>(self.minor_image_version)?;
        w.write_u16::<LittleEndian>(self.major_subsystem_version)?;
        w.write_u16::<LittleEndian>(self.minor_subsystem_version)?;
        w.write_u32::<LittleEndian>(self.win32_version_value)?;
        w.write_u32::<LittleEndian>(self.size_of_image)?;
        w.write_u32::<LittleEndian>(self.size_of_headers)?;
        w.write_u32::<LittleEndian>(self.check_sum)?;
        w.write_u16::<LittleEndian>(self.subsystem)?;
        w.write_u16::<LittleEndian>(self.dll_characteristics)?;
        w.write_u32::<LittleEndian>(self.size_of_stack_reserve)?;
        w.write_u32::<LittleEndian>(self.size_of_stack_commit)?;
        w.write_u32::<LittleEndian>(self.size_of_heap_reserve)?;
        w.write_u32::<LittleEndian>(self.size_of_heap_commit)?;
        w.write_u32::<LittleEndian>(self.loader_flags)?;
        w.write_u32::<LittleEndian>(self.number_of_rva_and_sizes)?;

        for directory in &self.data_directories {
            directory.write(w)?;
        }
        Ok(())
    }
}

/// PE32+ optional header. The layout engine only ever targets PE32/i386;
/// this type exists for codec symmetry and is otherwise dead weight in
/// this linker, no code path ever constructs or writes one.
#[derive(Debug, Clone)]
pub struct OptionalHeader64 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,

    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_os_version: u16,
    pub minor_os_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,

    pub data_directories: [DataDirectory; NUMBER_OF_DATA_DIRECTORIES],
}

impl OptionalHeader64 {
    pub const SIZE: u64 = 112 + (NUMBER_OF_DATA_DIRECTORIES as u64) * DataDirectory::SIZE; // 240
    pub const MAGIC: u16 = 0x020b;

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = r.read_u16::<LittleEndian>()?;
        let major_linker_version = r.read_u8()?;
        let minor_linker_version = r.read_u8()?;
        let size_of_code = r.read_u32::<LittleEndian>()?;
        let size_of_initialized_data = r.read_u32::<LittleEndian>()?;
        let size_of_uninitialized_data = r.read_u32::<LittleEndian>()?;
        let address_of_entry_point = r.read_u32::<LittleEndian>()?;
        let base_of_code = r.read_u32::<LittleEndian>()?;

        let image_base = r.read_u64::<LittleEndian>()?;
        let section_alignment = r.read_u32::<LittleEndian>()?;
        let file_alignment = r.read_u32::<LittleEndian>()?;
        let major_os_version = r.read_u16::<LittleEndian>()?;
        let minor_os_version = r.read_u16::<LittleEndian>()?;
        let major_image_version = r.read_u16::<LittleEndian>()?;
        let minor_image_version = r.read_u16::<LittleEndian>()?;
        let major_subsystem_version = r.read_u16::<LittleEndian>()?;
        let minor_subsystem_version = r.read_u16::<LittleEndian>()?;
        let win32_version_value = r.read_u32::<LittleEndian>()?;
        let size_of_image = r.read_u32::<LittleEndian>()?;
        let size_of_headers = r.read_u32::<LittleEndian>()?;
        let check_sum = r.read_u32::<LittleEndian>()?;
        let subsystem = r.read_u16::<LittleEndian>()?;
        let dll_characteristics = r.read_u16::<LittleEndian>()?;
        let size_of_stack_reserve = r.read_u64::<LittleEndian>()?;
        let size_of_stack_commit = r.read_u64::<LittleEndian>()?;
        let size_of_heap_reserve = r.read_u64::<LittleEndian>()?;
        let size_of_heap_commit = r.read_u64::<LittleEndian>()?;
        let loader_flags = r.read_u32::<LittleEndian>()?;
        let number_of_rva_and_sizes = r.read_u32::<LittleEndian>()?;

        let mut data_directories = [DataDirectory::default(); NUMBER_OF_DATA_DIRECTORIES];
        for slot in data_directories.iter_mut() {
            *slot = DataDirectory::read(r)?;
        }

        Ok(OptionalHeader64 {
            magic,
            major_linker_version,
            minor_linker_version,
            size_of_code,
            size_of_initialized_data,
            size_of_uninitialized_data,
            address_of_entry_point,
            base_of_code,
            image_base,
            section_alignment,
            file_alignment,
            major_os_version,
            minor_os_version,
            major_image_version,
            minor_image_version,
            major_subsystem_version,
            minor_subsystem_version,
            win32_version_value,
            size_of_image,
            size_of_headers,
            check_sum,
            subsystem,
            dll_characteristics,
            size_of_stack_reserve,
            size_of_stack_commit,
            size_of_heap_reserve,
            size_of_heap_commit,
            loader_flags,
            number_of_rva_and_sizes,
            data_directories,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.magic)?;
        w.write_u8(self.major_linker_version)?;
        w.write_u8(self.minor_linker_version)?;
        w.write_u32::<LittleEndian>(self.size_of_code)?;
        w.write_u32::<LittleEndian>(self.size_of_initialized_data)?;
        w.write_u32::<LittleEndian>(self.size_of_uninitialized_data)?;
        w.write_u32::<LittleEndian>(self.address_of_entry_point)?;
        w.write_u32::<LittleEndian>(self.base_of_code)?;

        w.write_u64::<LittleEndian>(self.image_base)?;
        w.write_u32::<LittleEndian>(self.section_alignment)?;
        w.write_u32::<LittleEndian>(self.file_alignment)?;
        w.write_u16::<LittleEndian>(self.major_os_version)?;
        w.write_u16::<LittleEndian>(self.minor_os_version)?;
        w.write_u16::<LittleEndian>(self.major_image_version)?;
        w.write_u16::<LittleEndian>(self.minor_image_version)?;
        w.write_u16::<LittleEndian>(self.major_subsystem_version)?;
        w.write_u16::<LittleEndian>(self.minor_subsystem_version)?;
        w.write_u32::<LittleEndian>(self.win32_version_value)?;
        w.write_u32::<LittleEndian>(self.size_of_image)?;
        w.write_u32::<LittleEndian>(self.size_of_headers)?;
        w.write_u32::<LittleEndian>(self.check_sum)?;
        w.write_u16::<LittleEndian>(self.subsystem)?;
        w.write_u16::<LittleEndian>(self.dll_characteristics)?;
        w.write_u64::<LittleEndian>(self.size_of_stack_reserve)?;
        w.write_u64::<LittleEndian>(self.size_of_stack_commit)?;
        w.write_u64::<LittleEndian>(self.size_of_heap_reserve)?;
        w.write_u64::<LittleEndian>(self.size_of_heap_commit)?;
        w.write_u32::<LittleEndian>(self.loader_flags)?;
        w.write_u32::<LittleEndian>(self.number_of_rva_and_sizes)?;

        for directory in &self.data_directories {
            directory.write(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn optional_header_32_size_is_224() {
        assert_eq!(OptionalHeader32::SIZE, 224);
    }

    #[test]
    fn optional_header_64_size_is_240() {
        assert_eq!(OptionalHeader64::SIZE, 240);
    }

    #[test]
    fn optional_header_32_round_trips() {
        let mut header = OptionalHeader32 {
            magic: OptionalHeader32::MAGIC,
            major_linker_version: 2,
            minor_linker_version: 24,
            size_of_code: 0x200,
            size_of_initialized_data: 0,
            size_of_uninitialized_data: 0,
            address_of_entry_point: 0x1000,
            base_of_code: 0x1000,
            base_of_data: 0,
            image_base: 0x400000,
            section_alignment: 0x1000,
            file_alignment: 0x200,
            major_os_version: 4,
            minor_os_version: 0,
            major_image_version: 1,
            minor_image_version: 0,
            major_subsystem_version: 4,
            minor_subsystem_version: 0,
            win32_version_value: 0,
            size_of_image: 0x3000,
            size_of_headers: 0x200,
            check_sum: 0,
            subsystem: 3,
            dll_characteristics: 0,
            size_of_stack_reserve: 0x200000,
            size_of_stack_commit: 0x1000,
            size_of_heap_reserve: 0x100000,
            size_of_heap_commit: 0x1000,
            loader_flags: 0,
            number_of_rva_and_sizes: 16,
            data_directories: [DataDirectory::default(); NUMBER_OF_DATA_DIRECTORIES],
        };
        header.data_directories[1] = DataDirectory::new(0x2000, 0x100);

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), OptionalHeader32::SIZE as usize);

        let decoded = OptionalHeader32::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded.image_base, header.image_base);
        assert_eq!(decoded.data_directories[1], header.data_directories[1]);
    }
}
