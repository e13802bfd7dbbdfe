use crate::coff::{
    DataDirectory, DataDirectoryIndex, HintNameEntry, ImportDirectoryEntry, SectionCharacteristics,
    SectionHeader, StorageClass,
};
use crate::dll_oracle::DllOracle;
use crate::error::{emit_warning, LinkError, Result};
use crate::layout::{scaled_align, LayoutResult, PeSection};
use crate::object_file::ObjectFile;
use crate::resolver::ResolvedSymbol;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashMap;

/// One distinct imported function: the name actually exported by its DLL
/// (after any fallback stripping), which DLL it came from, and the three
/// RVAs C8 hands out for it.
pub struct ImportedFunction {
    pub resolved_name: String,
    pub dll_index: usize,
    pub hint_name_rva: u32,
    pub iat_entry_rva: u32,
    pub thunk_rva: u32,
}

/// One imported DLL and the RVAs of its lookup/address tables and name
/// string.
pub struct ImportedDll {
    pub name: String,
    pub function_indices: Vec<usize>,
    pub import_lookup_table_rva: u32,
    pub import_address_table_rva: u32,
    pub name_rva: u32,
}

/// Everything C9 (and the optional-header data directories) need once
/// imports have been synthesized.
pub struct ImportLayout {
    pub dlls: Vec<ImportedDll>,
    pub functions: Vec<ImportedFunction>,
    /// Original (possibly un-fallback-stripped) symbol name -> function
    /// index, so the relocation applier can resolve a relocation's target
    /// symbol straight to its thunk without redoing fallback lookup.
    pub by_original_name: HashMap<String, usize>,
    pub dlljmp_section_index: usize,
    pub idata_section_index: usize,
    pub import_directory_rva: u32,
    pub import_directory_size: u32,
    pub iat_rva: u32,
    pub iat_size: u32,
}

impl ImportLayout {
    pub fn thunk_rva_for(&self, original_name: &str) -> Option<u32> {
        self.by_original_name
            .get(original_name)
            .map(|&index| self.functions[index].thunk_rva)
    }
}

/// C8: discovers every relocation target that is an unresolved External
/// symbol, resolves it through `oracle`, and if any exist, prepends a
/// `.dlljmp` thunk section and appends an `.idata` section to `layout`,
/// shifting every other section's offsets and the resolver map to make
/// room. Returns `None` (and `layout` untouched) when nothing needs
/// importing.
pub fn synthesize_imports(
    objects: &[ObjectFile],
    mut layout: LayoutResult,
    resolver_map: &mut HashMap<String, ResolvedSymbol>,
    oracle: &mut dyn DllOracle,
    dllwarn: bool,
    image_base: u32,
) -> Result<(LayoutResult, Option<ImportLayout>)> {
    let mut dlls: Vec<ImportedDll> = Vec::new();
    let mut dll_index_by_name: HashMap<String, usize> = HashMap::new();
    let mut functions: Vec<ImportedFunction> = Vec::new();
    let mut function_index_by_resolved_name: HashMap<String, usize> = HashMap::new();
    let mut by_original_name: HashMap<String, usize> = HashMap::new();
    let mut reported: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (object_index, object) in objects.iter().enumerate() {
        let _ = object_index;
        for section in object.sections.iter() {
            for reloc in section.relocations.iter() {
                let symbol = object.standard_symbol_at(reloc.symbol_table_index as usize)?;
                if !symbol.storage_class.is(StorageClass::EXTERNAL) || symbol.section_number > 0 {
                    continue;
                }
                let name = object.symbol_name(symbol)?;
                if resolver_map.contains_key(&name) || by_original_name.contains_key(&name) {
                    continue;
                }

                match oracle.resolve(&name) {
                    Some(resolved) => {
                        if dllwarn && resolved.resolved_name != name && reported.insert(name.clone()) {
                            emit_warning(&format!(
                                "symbol '{name}' resolved via fallback name '{}' in {}",
                                resolved.resolved_name, resolved.dll_name
                            ));
                        }

                        let function_index = if let Some(&index) =
                            function_index_by_resolved_name.get(&resolved.resolved_name)
                        {
                            index
                        } else {
                            let dll_index = *dll_index_by_name
                                .entry(resolved.dll_name.clone())
                                .or_insert_with(|| {
                                    dlls.push(ImportedDll {
                                        name: resolved.dll_name.clone(),
                                        function_indices: Vec::new(),
                                        import_lookup_table_rva: 0,
                                        import_address_table_rva: 0,
                                        name_rva: 0,
                                    });
                                    dlls.len() - 1
                                });

                            let index = functions.len();
                            functions.push(ImportedFunction {
                                resolved_name: resolved.resolved_name.clone(),
                                dll_index,
                                hint_name_rva: 0,
                                iat_entry_rva: 0,
                                thunk_rva: 0,
                            });
                            dlls[dll_index].function_indices.push(index);
                            function_index_by_resolved_name.insert(resolved.resolved_name.clone(), index);
                            index
                        };

                        by_original_name.insert(name, function_index);
                    }
                    None => {
                        return Err(LinkError::Resolution(format!(
                            "unresolved external symbol '{name}'"
                        )))
                    }
                }
            }
        }
    }

    if functions.is_empty() {
        return Ok((layout, None));
    }

    let thunk_data_len = 6 * functions.len() as u32;
    let dlljmp_file_size = scaled_align(thunk_data_len, layout.file_alignment);
    let dlljmp_virtual_size = scaled_align(thunk_data_len, layout.section_alignment);
    let dlljmp_rva = scaled_align(layout.size_of_headers, layout.section_alignment);
    let dlljmp_raw_offset = layout.size_of_headers;

    // Shift every already-laid-out section to make room for the
    // prepended thunk section.
    for section in layout.sections.iter_mut() {
        if section.header.pointer_to_raw_data != 0 {
            section.header.pointer_to_raw_data += dlljmp_file_size;
        }
        section.header.virtual_address += dlljmp_virtual_size;
    }
    let shifted_translation: HashMap<_, _> = layout
        .translation
        .drain()
        .map(|(key, (index, offset))| (key, (index + 1, offset)))
        .collect();
    for resolved in resolver_map.values_mut() {
        resolved.section_index += 1;
    }
    layout.size_of_code += dlljmp_file_size;
    layout.base_of_data += dlljmp_virtual_size;

    let idata_rva = layout.final_virtual_cursor + dlljmp_virtual_size;
    let idata_raw_offset = layout.final_raw_cursor + dlljmp_file_size;

    let dll_count = dlls.len() as u32;
    let dir_entries_size = (dll_count + 1) * 20;
    let per_dll_table_words: Vec<u32> = dlls
        .iter()
        .map(|dll| (dll.function_indices.len() as u32 + 1) * 4)
        .collect();
    let total_table_bytes: u32 = per_dll_table_words.iter().sum();

    let ilt_start = dir_entries_size;
    let iat_start = ilt_start + total_table_bytes;
    let hint_start = iat_start + total_table_bytes;

    let mut hint_name_total = 0u32;
    for function in &functions {
        hint_name_total += function.resolved_name.len() as u32 + 3;
    }
    let names_start = hint_start + hint_name_total;

    let mut running_table_offset = 0u32;
    let mut running_name_offset = 0u32;
    for (dll_index, dll) in dlls.iter_mut().enumerate() {
        dll.import_lookup_table_rva = idata_rva + ilt_start + running_table_offset;
        dll.import_address_table_rva = idata_rva + iat_start + running_table_offset;
        dll.name_rva = idata_rva + names_start + running_name_offset;
        running_table_offset += per_dll_table_words[dll_index];
        running_name_offset += dll.name.len() as u32 + 1;
    }

    let mut running_hint_offset = 0u32;
    for function in functions.iter_mut() {
        function.hint_name_rva = idata_rva + hint_start + running_hint_offset;
        running_hint_offset += function.resolved_name.len() as u32 + 3;
    }
    for dll in dlls.iter() {
        for (slot, &function_index) in dll.function_indices.iter().enumerate() {
            functions[function_index].iat_entry_rva = dll.import_address_table_rva + (slot as u32) * 4;
        }
    }

    for (thunk_index, function) in functions.iter_mut().enumerate() {
        function.thunk_rva = dlljmp_rva + (thunk_index as u32) * 6;
    }

    let idata_total_size = names_start
        + dlls.iter().map(|d| d.name.len() as u32 + 1).sum::<u32>();

    let mut idata_data = vec![0u8; idata_total_size as usize];

    // Import directory entries, one per DLL plus a zero terminator.
    for (index, dll) in dlls.iter().enumerate() {
        let offset = index * ImportDirectoryEntry::SIZE as usize;
        let entry = ImportDirectoryEntry {
            import_lookup_table_rva: dll.import_lookup_table_rva,
            time_date_stamp: 0,
            forwarder_chain: 0,
            name_rva: dll.name_rva,
            import_address_table_rva: dll.import_address_table_rva,
        };
        let mut dest = &mut idata_data[offset..offset + ImportDirectoryEntry::SIZE as usize];
        entry.write(&mut dest).expect("slice of exactly ImportDirectoryEntry::SIZE bytes");
    }
    // terminator entry at dlls.len()*20 is already all-zero.

    // ILT and IAT: structurally identical, both holding the hint-name RVA
    // pre-bind.
    for dll in &dlls {
        let ilt_base = (dll.import_lookup_table_rva - idata_rva) as usize;
        let iat_base = (dll.import_address_table_rva - idata_rva) as usize;
        for (slot, &function_index) in dll.function_indices.iter().enumerate() {
            let hint_rva = functions[function_index].hint_name_rva;
            write_u32_at(&mut idata_data, ilt_base + slot * 4, hint_rva);
            write_u32_at(&mut idata_data, iat_base + slot * 4, hint_rva);
        }
        // trailing zero dword terminator for both tables already zero.
    }

    // Hint/name entries.
    for function in &functions {
        let offset = (function.hint_name_rva - idata_rva) as usize;
        let entry = HintNameEntry { hint: 0, name: function.resolved_name.clone() };
        let mut dest = &mut idata_data[offset..offset + entry.encoded_len()];
        entry.write(&mut dest).expect("slice of exactly encoded_len bytes");
    }

    // DLL names.
    for dll in &dlls {
        let offset = (dll.name_rva - idata_rva) as usize;
        let name_bytes = dll.name.as_bytes();
        idata_data[offset..offset + name_bytes.len()].copy_from_slice(name_bytes);
        idata_data[offset + name_bytes.len()] = 0;
    }

    let idata_file_size = scaled_align(idata_total_size, layout.file_alignment);
    let idata_section = PeSection {
        header: SectionHeader {
            name: SectionHeader::name_bytes(".idata"),
            virtual_size: idata_total_size.max(4),
            virtual_address: idata_rva,
            size_of_raw_data: idata_file_size,
            pointer_to_raw_data: idata_raw_offset,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: SectionCharacteristics::idata_section(),
        },
        data: idata_data,
    };

    let mut dlljmp_data = vec![0u8; thunk_data_len as usize];
    for (index, function) in functions.iter().enumerate() {
        let offset = index * 6;
        dlljmp_data[offset] = 0xFF;
        dlljmp_data[offset + 1] = 0x25;
        let absolute = image_base.wrapping_add(function.iat_entry_rva);
        (&mut dlljmp_data[offset + 2..offset + 6])
            .write_u32::<LittleEndian>(absolute)
            .expect("slice of exactly 4 bytes");
    }
    let dlljmp_section = PeSection {
        header: SectionHeader {
            name: SectionHeader::name_bytes(".dlljmp"),
            virtual_size: thunk_data_len.max(4),
            virtual_address: dlljmp_rva,
            size_of_raw_data: dlljmp_file_size,
            pointer_to_raw_data: dlljmp_raw_offset,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: SectionCharacteristics::dlljmp_section(),
        },
        data: dlljmp_data,
    };

    layout.size_of_initialized_data += idata_file_size;

    let mut sections = Vec::with_capacity(layout.sections.len() + 2);
    sections.push(dlljmp_section);
    sections.append(&mut layout.sections);
    sections.push(idata_section);

    let size_of_image = scaled_align(layout.size_of_headers, layout.section_alignment)
        + sections
            .iter()
            .map(|s| scaled_align(s.header.size_of_raw_data, layout.section_alignment))
            .sum::<u32>();

    let idata_section_index = sections.len() - 1;
    let import_directory_rva = idata_rva;
    // The Import data directory covers the whole synthesized `.idata`
    // section, not just the directory-entry array at its front.
    let import_directory_size = idata_total_size;
    let iat_rva = idata_rva + iat_start;
    let iat_size = total_table_bytes;

    let import_layout = ImportLayout {
        dlls,
        functions,
        by_original_name,
        dlljmp_section_index: 0,
        idata_section_index,
        import_directory_rva,
        import_directory_size,
        iat_rva,
        iat_size,
    };

    layout.sections = sections;
    layout.size_of_image = size_of_image;
    layout.translation = shifted_translation;

    Ok((layout, Some(import_layout)))
}

fn write_u32_at(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Installs the `Import`/`IAT` data-directory entries an `ImportLayout`
/// describes; a no-op when no imports were synthesized.
pub fn data_directories_for(import_layout: &Option<ImportLayout>) -> [DataDirectory; 2] {
    match import_layout {
        Some(layout) => [
            DataDirectory::new(layout.import_directory_rva, layout.import_directory_size),
            DataDirectory::new(layout.iat_rva, layout.iat_size),
        ],
        None => [DataDirectory::default(), DataDirectory::default()],
    }
}

pub const IMPORT_DIRECTORY_INDEX: usize = DataDirectoryIndex::Import as usize;
pub const IAT_DIRECTORY_INDEX: usize = DataDirectoryIndex::Iat as usize;
