use crate::binary_stream::BinaryStream;
use crate::coff::{
    DataDirectory, DataDirectoryIndex, DosHeader, FileCharacteristics, FileHeader,
    NUMBER_OF_DATA_DIRECTORIES, OptionalHeader32,
};
use crate::error::Result;
use crate::layout::LayoutResult;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// The handful of values C10 needs that the layout engine doesn't itself
/// know: the caller-chosen alignments/base/subsystem and the entry point
/// and import data directories the rest of the pipeline computed.
pub struct PeWriteParams {
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub entry_point_rva: u32,
    pub stack_reserve: u32,
    pub stack_commit: u32,
    pub heap_reserve: u32,
    pub heap_commit: u32,
    pub subsystem: u16,
    pub import_directory: DataDirectory,
    pub iat_directory: DataDirectory,
}

/// C10: resizes the output file to its final length up front, then writes
/// the DOS header, PE signature, file header, optional header, section
/// table, and each section's raw data at its assigned file offset.
pub fn write_pe(path: &Path, layout: &LayoutResult, params: &PeWriteParams) -> Result<()> {
    let mut stream = BinaryStream::create(path)?;

    let final_len = layout
        .sections
        .iter()
        .map(|s| s.header.pointer_to_raw_data as u64 + s.header.size_of_raw_data as u64)
        .max()
        .unwrap_or(layout.size_of_headers as u64)
        .max(layout.size_of_headers as u64);
    stream.set_len(final_len)?;

    let base_of_code = layout
        .sections
        .iter()
        .find(|s| s.header.characteristics.is_code())
        .map(|s| s.header.virtual_address)
        .unwrap_or(0);

    let mut data_directories = [DataDirectory::default(); NUMBER_OF_DATA_DIRECTORIES];
    data_directories[DataDirectoryIndex::Import as usize] = params.import_directory;
    data_directories[DataDirectoryIndex::Iat as usize] = params.iat_directory;

    let optional_header = OptionalHeader32 {
        magic: OptionalHeader32::MAGIC,
        major_linker_version: 2,
        minor_linker_version: 24,
        size_of_code: layout.size_of_code,
        size_of_initialized_data: layout.size_of_initialized_data,
        size_of_uninitialized_data: layout.size_of_uninitialized_data,
        address_of_entry_point: params.entry_point_rva,
        base_of_code,
        base_of_data: layout.base_of_data,
        image_base: params.image_base,
        section_alignment: params.section_alignment,
        file_alignment: params.file_alignment,
        major_os_version: 4,
        minor_os_version: 0,
        major_image_version: 1,
        minor_image_version: 0,
        major_subsystem_version: 4,
        minor_subsystem_version: 0,
        win32_version_value: 0,
        size_of_image: layout.size_of_image,
        size_of_headers: layout.size_of_headers,
        check_sum: 0,
        subsystem: params.subsystem,
        dll_characteristics: 0,
        size_of_stack_reserve: params.stack_reserve,
        size_of_stack_commit: params.stack_commit,
        size_of_heap_reserve: params.heap_reserve,
        size_of_heap_commit: params.heap_commit,
        loader_flags: 0,
        number_of_rva_and_sizes: NUMBER_OF_DATA_DIRECTORIES as u32,
        data_directories,
    };

    let file_header = FileHeader {
        machine: FileHeader::MACHINE_I386,
        number_of_sections: layout.sections.len() as u16,
        time_date_stamp: 0,
        pointer_to_symbol_table: 0,
        number_of_symbols: 0,
        optional_header_size: OptionalHeader32::SIZE as u16,
        characteristics: FileCharacteristics::output_image(),
    };

    stream.seek_to(0)?;
    DosHeader::default_header().write(&mut stream)?;
    stream.write_u32::<LittleEndian>(PE_SIGNATURE)?;
    file_header.write(&mut stream)?;
    optional_header.write(&mut stream)?;
    for section in &layout.sections {
        section.header.write(&mut stream)?;
    }

    for section in &layout.sections {
        if section.header.size_of_raw_data == 0 {
            continue;
        }
        stream.seek_to(section.header.pointer_to_raw_data as u64)?;
        stream.write_all(&section.data)?;
        if (section.data.len() as u32) < section.header.size_of_raw_data {
            let padding = section.header.size_of_raw_data as usize - section.data.len();
            stream.write_all(&vec![0u8; padding])?;
        }
    }

    stream.finalize()?;
    Ok(())
}
