use crate::coff::StorageClass;
use crate::error::{LinkError, Result};
use crate::object_file::{ObjectFile, SymbolSlot};
use crate::section_aggregator::ObjSectionKey;
use std::collections::HashMap;

/// Where a defined symbol lives in the output image: an output section
/// index (into `LayoutResult::sections`) and a byte offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub section_index: usize,
    pub offset: u32,
}

/// Builds the global `name -> (output-section, offset)` map from every
/// External standard symbol with a nonzero section number, across every
/// object. Two objects defining the same external name is a link error,
/// not a last-one-wins overwrite.
pub fn resolve(
    objects: &[ObjectFile],
    translation: &HashMap<ObjSectionKey, (usize, u32)>,
) -> Result<HashMap<String, ResolvedSymbol>> {
    let mut map = HashMap::new();

    for (object_index, object) in objects.iter().enumerate() {
        for symbol in object.symbols.iter() {
            let SymbolSlot::Standard(standard) = symbol else {
                continue;
            };
            if !standard.storage_class.is(StorageClass::EXTERNAL) || standard.section_number <= 0 {
                continue;
            }

            let object_section_index = (standard.section_number - 1) as usize;
            let key = ObjSectionKey {
                object_index,
                section_index: object_section_index,
            };
            let &(out_section_index, offset_in_merged) = translation.get(&key).ok_or_else(|| {
                LinkError::Malformed(format!(
                    "{}: symbol references section number {} with no matching section",
                    object.path, standard.section_number
                ))
            })?;

            let name = object.symbol_name(standard)?;
            let resolved = ResolvedSymbol {
                section_index: out_section_index,
                offset: offset_in_merged + standard.value,
            };

            if let Some(existing) = map.insert(name.clone(), resolved) {
                let _ = existing;
                return Err(LinkError::Resolution(format!(
                    "duplicate definition of symbol '{name}'"
                )));
            }
        }
    }

    Ok(map)
}
