use crate::coff::{RelocationType, StorageClass};
use crate::error::{LinkError, Result};
use crate::import_synth::ImportLayout;
use crate::layout::LayoutResult;
use crate::object_file::ObjectFile;
use crate::resolver::ResolvedSymbol;
use crate::section_aggregator::ObjSectionKey;
use std::collections::HashMap;

/// C9: patches every object-file relocation into the already-laid-out
/// merged section data, resolving each target through the symbol
/// resolver map, the import thunks, or (for section/static symbols) the
/// layout's own object-section translation table.
pub fn apply_relocations(
    objects: &[ObjectFile],
    layout: &mut LayoutResult,
    resolver_map: &HashMap<String, ResolvedSymbol>,
    import_layout: &Option<ImportLayout>,
    image_base: u32,
) -> Result<()> {
    for (object_index, object) in objects.iter().enumerate() {
        for (section_index, section) in object.sections.iter().enumerate() {
            let key = ObjSectionKey { object_index, section_index };
            let &(out_index, offset_in_merged) = layout.translation.get(&key).ok_or_else(|| {
                LinkError::Malformed(format!(
                    "{}: section with relocations has no output placement",
                    object.path
                ))
            })?;

            for reloc in section.relocations.iter() {
                if matches!(reloc.kind, RelocationType::Absolute) {
                    continue;
                }

                let section_va = layout.sections[out_index].header.virtual_address;
                let changed_rva = section_va + offset_in_merged;
                let patch_offset = (offset_in_merged + reloc.virtual_address) as usize;

                let symbol = object.standard_symbol_at(reloc.symbol_table_index as usize)?;
                let (addressed_rva, is_import) = if symbol.storage_class.is(StorageClass::EXTERNAL) {
                    let name = object.symbol_name(symbol)?;
                    if let Some(resolved) = resolver_map.get(&name) {
                        let rva = layout.sections[resolved.section_index].header.virtual_address
                            + resolved.offset;
                        (rva, false)
                    } else if let Some(thunk_rva) =
                        import_layout.as_ref().and_then(|imports| imports.thunk_rva_for(&name))
                    {
                        (thunk_rva, true)
                    } else {
                        return Err(LinkError::Resolution(format!(
                            "{}: unresolved external symbol '{name}' referenced by relocation",
                            object.path
                        )));
                    }
                } else {
                    if symbol.section_number <= 0 {
                        return Err(LinkError::Malformed(format!(
                            "{}: relocation targets a non-external symbol with no section",
                            object.path
                        )));
                    }
                    let target_key = ObjSectionKey {
                        object_index,
                        section_index: (symbol.section_number - 1) as usize,
                    };
                    let &(target_out_index, target_offset) =
                        layout.translation.get(&target_key).ok_or_else(|| {
                            LinkError::Malformed(format!(
                                "{}: relocation targets an unknown section",
                                object.path
                            ))
                        })?;
                    let rva = layout.sections[target_out_index].header.virtual_address
                        + target_offset
                        + symbol.value;
                    (rva, false)
                };

                let delta: i64 = match reloc.kind {
                    RelocationType::Absolute => unreachable!("handled above"),
                    RelocationType::Dir32Va => addressed_rva as i64 + image_base as i64,
                    RelocationType::Dir32Rva => addressed_rva as i64,
                    RelocationType::Rel32 => {
                        addressed_rva as i64
                            - changed_rva as i64
                            - 5
                            - (reloc.virtual_address as i64 - 1)
                    }
                    RelocationType::Other(code) => {
                        return Err(LinkError::UnsupportedRelocation(code as u8))
                    }
                };

                let data = &mut layout.sections[out_index].data;
                let value = if is_import {
                    delta as u32
                } else {
                    let existing = u32::from_le_bytes(
                        data[patch_offset..patch_offset + 4].try_into().unwrap(),
                    );
                    existing.wrapping_add(delta as u32)
                };
                data[patch_offset..patch_offset + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coff::{
        FileCharacteristics, FileHeader, RelocationEntry, SectionCharacteristics, SectionHeader,
        StandardSymbol, StringTable, SymbolName, SymbolType,
    };
    use crate::layout::layout as do_layout;
    use crate::object_file::{ObjectFile, ObjectSection, SymbolSlot};
    use crate::section_aggregator::aggregate;

    fn external_symbol(name: &str, section_number: i16) -> StandardSymbol {
        let mut bytes = [0u8; 8];
        let n = name.as_bytes();
        bytes[..n.len().min(8)].copy_from_slice(&n[..n.len().min(8)]);
        StandardSymbol {
            name: SymbolName::Inline(bytes),
            value: 0,
            section_number,
            symbol_type: SymbolType::new(0),
            storage_class: StorageClass::new(StorageClass::EXTERNAL),
            number_of_aux_symbols: 0,
        }
    }

    fn object_with_text(path: &str, data: Vec<u8>, relocations: Vec<RelocationEntry>, symbols: Vec<SymbolSlot>) -> ObjectFile {
        ObjectFile {
            path: path.to_string(),
            header: FileHeader {
                machine: FileHeader::MACHINE_I386,
                number_of_sections: 1,
                time_date_stamp: 0,
                pointer_to_symbol_table: 0,
                number_of_symbols: symbols.len() as u32,
                optional_header_size: 0,
                characteristics: FileCharacteristics::new(0),
            },
            sections: vec![ObjectSection {
                header: SectionHeader {
                    name: SectionHeader::name_bytes(".text"),
                    virtual_size: 0,
                    virtual_address: 0,
                    size_of_raw_data: data.len() as u32,
                    pointer_to_raw_data: 0,
                    pointer_to_relocations: 0,
                    pointer_to_linenumbers: 0,
                    number_of_relocations: relocations.len() as u16,
                    number_of_linenumbers: 0,
                    characteristics: SectionCharacteristics::new(SectionCharacteristics::CNT_CODE),
                },
                data,
                relocations,
            }],
            symbols,
            strings: StringTable::default(),
        }
    }

    #[test]
    fn rel32_patches_call_distance_between_two_objects() {
        use crate::coff::RelocationType;

        // a.obj: call _f at .text offset 1 (E8 + rel32), referencing
        // symbol slot 0, which is `_f`, external/undefined here.
        let a = object_with_text(
            "a.obj",
            vec![0xE8, 0, 0, 0, 0, 0x90, 0x90, 0x90],
            vec![RelocationEntry { virtual_address: 1, symbol_table_index: 0, kind: RelocationType::Rel32 }],
            vec![SymbolSlot::Standard(external_symbol("_f", 0))],
        );
        // b.obj: defines `_f` at offset 0 of its own .text, exported
        // externally with section_number 1.
        let b = object_with_text(
            "b.obj",
            vec![0xC3],
            vec![],
            vec![SymbolSlot::Standard(external_symbol("_f", 1))],
        );

        let objects = vec![a, b];
        let merged = aggregate(&objects);
        let laid_out = do_layout(merged, 0x1000, 0x200);
        let resolver_map = crate::resolver::resolve(&objects, &laid_out.translation).unwrap();

        let mut layout = laid_out;
        apply_relocations(&objects, &mut layout, &resolver_map, &None, 0x400000).unwrap();

        let text = &layout.sections[0].data;
        let patched = i32::from_le_bytes(text[1..5].try_into().unwrap());

        let f_rva = resolver_map.get("_f").unwrap();
        let f_absolute = layout.sections[f_rva.section_index].header.virtual_address + f_rva.offset;
        let main_rva = layout.sections[0].header.virtual_address;
        let expected = f_absolute as i64 - (main_rva as i64) - 5 - (1 - 1);
        assert_eq!(patched as i64, expected);
    }
}
