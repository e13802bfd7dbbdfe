use crate::coff::SectionCharacteristics;
use crate::object_file::{ObjectFile, ObjectSection};
use std::collections::HashMap;

/// Identifies a section inside a particular object file by the object's
/// position in the input list rather than a pointer, so the key stays
/// valid independent of how the objects are stored or moved around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjSectionKey {
    pub object_index: usize,
    pub section_index: usize,
}

/// One output section assembled from every same-named input section
/// across all objects, in the order their object files were given on the
/// command line.
pub struct MergedSection {
    pub name: [u8; 8],
    pub characteristics: SectionCharacteristics,
    /// Byte offset of each contributing input section within the merged
    /// section's data, keyed by object/section index so relocations and
    /// symbol values can be translated into merged-section-relative ones.
    pub piece_offsets: HashMap<ObjSectionKey, u32>,
    pub data: Vec<u8>,
    pub total_size: u32,
}

impl MergedSection {
    fn new(name: [u8; 8], characteristics: SectionCharacteristics) -> Self {
        MergedSection {
            name,
            characteristics,
            piece_offsets: HashMap::new(),
            data: Vec::new(),
            total_size: 0,
        }
    }

    fn append(&mut self, key: ObjSectionKey, section: &ObjectSection) {
        let offset = self.total_size;
        self.piece_offsets.insert(key, offset);

        if section.header.characteristics.is_uninitialized_data() {
            self.total_size += section.header.size_of_raw_data;
        } else {
            self.data.extend_from_slice(&section.data);
            self.total_size = self.data.len() as u32;
        }
    }
}

/// Walks every object's sections in input order and merges same-named
/// sections into one contiguous blob per name, preserving first-seen
/// name order for the final section table.
pub fn aggregate(objects: &[ObjectFile]) -> Vec<MergedSection> {
    let mut order: Vec<[u8; 8]> = Vec::new();
    let mut by_name: HashMap<[u8; 8], MergedSection> = HashMap::new();

    for (object_index, object) in objects.iter().enumerate() {
        for (section_index, section) in object.sections.iter().enumerate() {
            let name = section.name();
            let merged = by_name.entry(name).or_insert_with(|| {
                order.push(name);
                MergedSection::new(name, section.header.characteristics)
            });
            merged.append(ObjSectionKey { object_index, section_index }, section);
        }
    }

    order
        .into_iter()
        .map(|name| by_name.remove(&name).expect("every ordered name was inserted"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coff::{FileHeader, SectionHeader, StringTable};
    use crate::object_file::SymbolSlot;

    fn section(name: &str, characteristics: SectionCharacteristics, data: &[u8]) -> ObjectSection {
        ObjectSection {
            header: SectionHeader {
                name: SectionHeader::name_bytes(name),
                virtual_size: 0,
                virtual_address: 0,
                size_of_raw_data: data.len() as u32,
                pointer_to_raw_data: 0,
                pointer_to_relocations: 0,
                pointer_to_linenumbers: 0,
                number_of_relocations: 0,
                number_of_linenumbers: 0,
                characteristics,
            },
            data: data.to_vec(),
            relocations: Vec::new(),
        }
    }

    fn object(path: &str, sections: Vec<ObjectSection>) -> ObjectFile {
        ObjectFile {
            path: path.to_string(),
            header: FileHeader {
                machine: FileHeader::MACHINE_I386,
                number_of_sections: sections.len() as u16,
                time_date_stamp: 0,
                pointer_to_symbol_table: 0,
                number_of_symbols: 0,
                optional_header_size: 0,
                characteristics: crate::coff::FileCharacteristics::new(0),
            },
            sections,
            symbols: Vec::<SymbolSlot>::new(),
            strings: StringTable::default(),
        }
    }

    #[test]
    fn concatenates_same_named_sections_across_objects_in_order() {
        let objects = vec![
            object("a.obj", vec![section(".text", SectionCharacteristics::new(SectionCharacteristics::CNT_CODE), b"AAAA")]),
            object("b.obj", vec![section(".text", SectionCharacteristics::new(SectionCharacteristics::CNT_CODE), b"BB")]),
        ];

        let merged = aggregate(&objects);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].data, b"AAAABB");
        assert_eq!(*merged[0].piece_offsets.get(&ObjSectionKey { object_index: 0, section_index: 0 }).unwrap(), 0);
        assert_eq!(*merged[0].piece_offsets.get(&ObjSectionKey { object_index: 1, section_index: 0 }).unwrap(), 4);
    }

    #[test]
    fn preserves_first_seen_section_name_order() {
        let objects = vec![
            object(
                "a.obj",
                vec![
                    section(".data", SectionCharacteristics::new(SectionCharacteristics::CNT_INITIALIZED_DATA), b"x"),
                    section(".text", SectionCharacteristics::new(SectionCharacteristics::CNT_CODE), b"y"),
                ],
            ),
            object("b.obj", vec![section(".text", SectionCharacteristics::new(SectionCharacteristics::CNT_CODE), b"z")]),
        ];

        let merged = aggregate(&objects);
        let names: Vec<String> = merged.iter().map(|m| SectionHeader { name: m.name, ..SectionHeader::default() }.name_str()).collect();
        assert_eq!(names, vec![".data".to_string(), ".text".to_string()]);
    }

    #[test]
    fn uninitialized_sections_contribute_size_without_bytes() {
        let bss = SectionCharacteristics::new(SectionCharacteristics::CNT_UNINITIALIZED_DATA);
        let objects = vec![object(
            "a.obj",
            vec![ObjectSection {
                header: SectionHeader {
                    name: SectionHeader::name_bytes(".bss"),
                    virtual_size: 0,
                    virtual_address: 0,
                    size_of_raw_data: 16,
                    pointer_to_raw_data: 0,
                    pointer_to_relocations: 0,
                    pointer_to_linenumbers: 0,
                    number_of_relocations: 0,
                    number_of_linenumbers: 0,
                    characteristics: bss,
                },
                data: Vec::new(),
                relocations: Vec::new(),
            }],
        )];

        let merged = aggregate(&objects);
        assert_eq!(merged[0].total_size, 16);
        assert!(merged[0].data.is_empty());
    }
}
