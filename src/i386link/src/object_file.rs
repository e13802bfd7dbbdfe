use crate::coff::{
    AuxRecord, FileHeader, RelocationEntry, SectionHeader, StandardSymbol, StringTable,
};
use crate::error::{LinkError, Result};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// One section as read out of an object file: its header (characteristics,
/// declared sizes) plus the raw bytes actually present on disk and the
/// relocations against it.
pub struct ObjectSection {
    pub header: SectionHeader,
    pub data: Vec<u8>,
    pub relocations: Vec<RelocationEntry>,
}

impl ObjectSection {
    pub fn name(&self) -> [u8; 8] {
        self.header.name
    }
}

/// A symbol-table slot expanded to either a standard entry or one of its
/// auxiliaries; kept positional so relocation symbol-table indices, which
/// are slot-based, still address the right entry.
pub enum SymbolSlot {
    Standard(StandardSymbol),
    Auxiliary(AuxRecord),
}

/// A single parsed COFF object file, kept alive for the duration of
/// linking.
pub struct ObjectFile {
    pub path: String,
    pub header: FileHeader,
    pub sections: Vec<ObjectSection>,
    pub symbols: Vec<SymbolSlot>,
    pub strings: StringTable,
}

impl ObjectFile {
    /// Resolves a `StandardSymbol`'s name, following the string table when
    /// the name is an indirection. Fails as malformed input if the
    /// indirection has no matching entry.
    pub fn symbol_name(&self, symbol: &StandardSymbol) -> Result<String> {
        if let Some(name) = symbol.name.inline_str() {
            return Ok(name);
        }
        match symbol.name {
            crate::coff::SymbolName::StringTableOffset(offset) => {
                self.strings.get(offset).ok_or_else(|| {
                    LinkError::Malformed(format!(
                        "{}: string table has no entry at offset {offset}",
                        self.path
                    ))
                })
            }
            _ => unreachable!(),
        }
    }

    pub fn standard_symbol_at(&self, slot_index: usize) -> Result<&StandardSymbol> {
        match self.symbols.get(slot_index) {
            Some(SymbolSlot::Standard(symbol)) => Ok(symbol),
            _ => Err(LinkError::Malformed(format!(
                "{}: relocation references non-standard symbol slot {}",
                self.path, slot_index
            ))),
        }
    }

    pub fn read_from_path(path: &Path) -> Result<ObjectFile> {
        let mut file = std::fs::File::open(path)
            .map_err(|e| LinkError::Io(format!("{}: {}", path.display(), e)))?;
        Self::read(&mut file, path.display().to_string())
    }

    pub fn read<R: Read + Seek>(r: &mut R, path: String) -> Result<ObjectFile> {
        let malformed = |msg: String| LinkError::Malformed(format!("{}: {}", path, msg));

        let header = FileHeader::read(r).map_err(|e| malformed(format!("bad file header: {e}")))?;

        let mut section_headers = Vec::with_capacity(header.number_of_sections as usize);
        for _ in 0..header.number_of_sections {
            section_headers
                .push(SectionHeader::read(r).map_err(|e| malformed(format!("bad section header: {e}")))?);
        }

        let mut sections = Vec::with_capacity(section_headers.len());
        for section_header in section_headers {
            r.seek(SeekFrom::Start(section_header.pointer_to_raw_data as u64))
                .map_err(|e| malformed(format!("bad section data pointer: {e}")))?;
            let mut data = vec![0u8; section_header.size_of_raw_data as usize];
            r.read_exact(&mut data)
                .map_err(|e| malformed(format!("short read of section data: {e}")))?;

            let mut relocations = Vec::new();
            if section_header.number_of_relocations > 0 {
                r.seek(SeekFrom::Start(section_header.pointer_to_relocations as u64))
                    .map_err(|e| malformed(format!("bad relocation pointer: {e}")))?;
                for _ in 0..section_header.number_of_relocations {
                    relocations.push(
                        RelocationEntry::read(r)
                            .map_err(|e| malformed(format!("bad relocation entry: {e}")))?,
                    );
                }
            }

            sections.push(ObjectSection {
                header: section_header,
                data,
                relocations,
            });
        }

        r.seek(SeekFrom::Start(header.pointer_to_symbol_table as u64))
            .map_err(|e| malformed(format!("bad symbol table pointer: {e}")))?;

        let mut symbols = Vec::new();
        let mut remaining = header.number_of_symbols;
        while remaining > 0 {
            let standard = StandardSymbol::read(r)
                .map_err(|e| malformed(format!("bad symbol table entry: {e}")))?;
            remaining -= 1;
            let aux_count = standard.number_of_aux_symbols;
            let aux_template = standard.clone();
            symbols.push(SymbolSlot::Standard(standard));

            // Aux slots are consumed and the counter advanced by their
            // count exactly once; double-advancing here would silently
            // skip real symbol slots.
            for _ in 0..aux_count {
                if remaining == 0 {
                    return Err(malformed(
                        "numberOfAuxSymbols overruns number_of_symbols".to_string(),
                    ));
                }
                let aux = AuxRecord::read(r, &aux_template)
                    .map_err(|e| malformed(format!("bad auxiliary symbol entry: {e}")))?;
                symbols.push(SymbolSlot::Auxiliary(aux));
                remaining -= 1;
            }
        }

        let strings = StringTable::read(r).map_err(|e| malformed(format!("bad string table: {e}")))?;

        Ok(ObjectFile {
            path,
            header,
            sections,
            symbols,
            strings,
        })
    }
}
