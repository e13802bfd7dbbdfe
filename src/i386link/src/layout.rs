use crate::coff::{DosHeader, FileHeader, OptionalHeader32, SectionHeader};
use crate::section_aggregator::{MergedSection, ObjSectionKey};
use std::collections::HashMap;

/// `PE\0\0` signature + COFF file header + PE32 optional header, the part
/// of the header region between the DOS stub and the section table.
const PE_HEADER_SIZE_32: u32 = 4 + FileHeader::SIZE as u32 + OptionalHeader32::SIZE as u32;

/// Reproduces the source's `align × (x / align + 1)` rounding exactly
/// rather than a textbook `align_up`: it always advances to the *next*
/// multiple, even when `x` already sits on one. See SPEC_FULL.md §9.
pub fn scaled_align(x: u32, align: u32) -> u32 {
    align * (x / align + 1)
}

/// One laid-out output section: header with assigned RVA/file offset, plus
/// the bytes that go at `pointer_to_raw_data` (empty for uninitialized
/// data, which has no raw data at all).
pub struct PeSection {
    pub header: SectionHeader,
    pub data: Vec<u8>,
}

/// Everything C6 computes: the final section table plus the header-level
/// totals the optional header needs, and the translation table C7/C9 use
/// to turn an object-local `(object, section)` pair into an output
/// section index and merged-section-relative offset.
pub struct LayoutResult {
    pub sections: Vec<PeSection>,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub base_of_data: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub translation: HashMap<ObjSectionKey, (usize, u32)>,
    /// Raw-data and virtual-address cursors as they stood right after the
    /// last merged section, i.e. where C8 appends `.idata` if it needs to.
    pub final_raw_cursor: u32,
    pub final_virtual_cursor: u32,
}

/// Assigns `pointerToRawData`/`virtualAddress` to every merged section
/// under the alignment constraints of §4.4, reserving two extra section-
/// header slots in `sizeOfHeaders` for the `.dlljmp`/`.idata` sections C8
/// may still prepend/append.
pub fn layout(merged: Vec<MergedSection>, section_alignment: u32, file_alignment: u32) -> LayoutResult {
    let mut merged = merged;
    merged.sort_by_key(|section| section.characteristics.rank());

    let reserved_header_slots = merged.len() + 2;
    let header_size_in_file = DosHeader::SIZE as u32
        + PE_HEADER_SIZE_32
        + SectionHeader::SIZE as u32 * reserved_header_slots as u32;
    let size_of_headers = scaled_align(header_size_in_file, file_alignment);

    let mut raw_cursor = size_of_headers;
    let mut virtual_cursor = scaled_align(size_of_headers, section_alignment);

    let mut sections = Vec::with_capacity(merged.len());
    let mut translation = HashMap::new();
    let mut size_of_code = 0u32;
    let mut size_of_initialized_data = 0u32;
    let mut size_of_uninitialized_data = 0u32;
    let mut base_of_data = 0u32;
    let mut seen_code = false;
    let mut base_of_data_set = false;

    for (out_index, section) in merged.into_iter().enumerate() {
        let data_len = section.total_size;
        let is_uninit = section.characteristics.is_uninitialized_data();
        let is_code = section.characteristics.is_code();

        let (size_of_raw_data, pointer_to_raw_data) = if is_uninit {
            (0, 0)
        } else {
            let size = scaled_align(data_len, file_alignment);
            let ptr = raw_cursor;
            raw_cursor += size;
            (size, ptr)
        };

        let virtual_address = virtual_cursor;
        virtual_cursor += scaled_align(data_len, section_alignment);

        if is_code {
            size_of_code += size_of_raw_data;
            seen_code = true;
        } else {
            if !base_of_data_set {
                base_of_data = virtual_address;
                base_of_data_set = true;
            }
            if is_uninit {
                size_of_uninitialized_data += scaled_align(data_len.max(4), file_alignment);
            } else {
                size_of_initialized_data += size_of_raw_data;
            }
        }

        for (&key, &offset) in &section.piece_offsets {
            translation.insert(key, (out_index, offset));
        }

        sections.push(PeSection {
            header: SectionHeader {
                name: section.name,
                virtual_size: data_len.max(4),
                virtual_address,
                size_of_raw_data,
                pointer_to_raw_data,
                pointer_to_relocations: 0,
                pointer_to_linenumbers: 0,
                number_of_relocations: 0,
                number_of_linenumbers: 0,
                characteristics: section.characteristics,
            },
            data: section.data,
        });
    }

    if !base_of_data_set && seen_code {
        // every section was code; "past the last code section" is just
        // wherever the cursor ended up.
        base_of_data = virtual_cursor;
    }

    let size_of_image = scaled_align(size_of_headers, section_alignment)
        + sections
            .iter()
            .map(|s| scaled_align(s.header.size_of_raw_data, section_alignment))
            .sum::<u32>();

    LayoutResult {
        sections,
        size_of_code,
        size_of_initialized_data,
        size_of_uninitialized_data,
        base_of_data,
        size_of_image,
        size_of_headers,
        section_alignment,
        file_alignment,
        translation,
        final_raw_cursor: raw_cursor,
        final_virtual_cursor: virtual_cursor,
    }
}
