/// File-header characteristics flags (PE/COFF `IMAGE_FILE_*`).
///
/// Modeled as a newtype over the raw word, mirroring how the rest of this
/// codebase wraps bitsets: construct from the raw value, test individual
/// bits with `is_set`, OR named constants together to build a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCharacteristics(pub u16);

impl FileCharacteristics {
    pub const RELOCS_STRIPPED: u16 = 0x0001;
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    pub const LINE_NUMS_STRIPPED: u16 = 0x0004;
    pub const LOCAL_SYMS_STRIPPED: u16 = 0x0008;
    pub const BYTES_REVERSED_LO: u16 = 0x0080;
    pub const MACHINE_32BIT: u16 = 0x0100;
    pub const DEBUG_STRIPPED: u16 = 0x0200;
    pub const BYTES_REVERSED_HI: u16 = 0x8000;

    pub fn new(value: u16) -> Self {
        FileCharacteristics(value)
    }

    pub fn is_set(&self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    /// The characteristics value this linker always writes on its output
    /// image: relocations are never regenerated, so they are marked
    /// stripped; debug info is never emitted either.
    pub fn output_image() -> Self {
        FileCharacteristics(
            Self::RELOCS_STRIPPED | Self::EXECUTABLE_IMAGE | Self::MACHINE_32BIT | Self::DEBUG_STRIPPED,
        )
    }
}

/// Section-header characteristics flags (`IMAGE_SCN_*`), the subset this
/// linker reads from objects and writes to the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionCharacteristics(pub u32);

impl SectionCharacteristics {
    pub const CNT_CODE: u32 = 0x0000_0020;
    pub const CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
    pub const CNT_UNINITIALIZED_DATA: u32 = 0x0000_0080;
    pub const MEM_EXECUTE: u32 = 0x2000_0000;
    pub const MEM_READ: u32 = 0x4000_0000;
    pub const MEM_WRITE: u32 = 0x8000_0000;

    pub fn new(value: u32) -> Self {
        SectionCharacteristics(value)
    }

    pub fn is_set(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn is_code(&self) -> bool {
        self.is_set(Self::CNT_CODE)
    }

    pub fn is_initialized_data(&self) -> bool {
        self.is_set(Self::CNT_INITIALIZED_DATA)
    }

    pub fn is_uninitialized_data(&self) -> bool {
        self.is_set(Self::CNT_UNINITIALIZED_DATA)
    }

    /// Rank used to order output sections: code, then initialized data,
    /// then uninitialized data, then anything else.
    pub fn rank(&self) -> u8 {
        if self.is_code() {
            0
        } else if self.is_initialized_data() {
            1
        } else if self.is_uninitialized_data() {
            2
        } else {
            3
        }
    }

    pub fn dlljmp_section() -> Self {
        SectionCharacteristics(Self::CNT_CODE | Self::MEM_EXECUTE | Self::MEM_READ)
    }

    pub fn idata_section() -> Self {
        SectionCharacteristics(Self::CNT_INITIALIZED_DATA | Self::MEM_READ | Self::MEM_WRITE)
    }
}

/// Symbol-table storage classes this linker distinguishes. Kept as a
/// newtype rather than a closed enum because unrecognised storage classes
/// still need to round-trip through the symbol table unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageClass(pub u8);

impl StorageClass {
    pub const EXTERNAL: u8 = 2;
    pub const STATIC: u8 = 3;
    pub const LABEL: u8 = 6;
    pub const FUNCTION: u8 = 101;
    pub const FILE: u8 = 103;
    pub const SECTION: u8 = 104;
    pub const WEAK_EXTERNAL: u8 = 105;

    pub fn new(value: u8) -> Self {
        StorageClass(value)
    }

    pub fn is(&self, class: u8) -> bool {
        self.0 == class
    }
}

/// Symbol `type` field; only the low byte's function bit matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolType(pub u16);

impl SymbolType {
    pub const IS_FUNCTION: u16 = 0x20;

    pub fn new(value: u16) -> Self {
        SymbolType(value)
    }

    pub fn is_function(&self) -> bool {
        self.0 & Self::IS_FUNCTION == Self::IS_FUNCTION
    }
}
