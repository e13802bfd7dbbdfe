use crate::dll_oracle::{LibraryOracle, DEFAULT_DLLS};
use crate::error::{emit_warning, LinkError, Result};

/// Subsystem values accepted by `-subsystem`; the numeric values are the
/// raw `IMAGE_SUBSYSTEM_*` constants written into the optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Native,
    WinBoot,
    WinGui,
    WinCui,
    WinCe,
    Posix,
    Os2,
    EfiApp,
    EfiBootDriver,
    EfiRuntimeDriver,
    EfiRom,
}

impl Subsystem {
    pub fn raw(self) -> u16 {
        match self {
            Subsystem::Native => 1,
            Subsystem::WinGui => 2,
            Subsystem::WinCui => 3,
            Subsystem::Os2 => 5,
            Subsystem::Posix => 7,
            Subsystem::WinCe => 9,
            Subsystem::EfiApp => 10,
            Subsystem::EfiBootDriver => 11,
            Subsystem::EfiRuntimeDriver => 12,
            Subsystem::EfiRom => 13,
            Subsystem::WinBoot => 0,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "native" => Some(Subsystem::Native),
            "winBoot" => Some(Subsystem::WinBoot),
            "winGUI" => Some(Subsystem::WinGui),
            "winCUI" => Some(Subsystem::WinCui),
            "winCE" => Some(Subsystem::WinCe),
            "posix" => Some(Subsystem::Posix),
            "os2" => Some(Subsystem::Os2),
            "efiApp" => Some(Subsystem::EfiApp),
            "efiBootDriver" => Some(Subsystem::EfiBootDriver),
            "efiRuntimeDriver" => Some(Subsystem::EfiRuntimeDriver),
            "efiRom" => Some(Subsystem::EfiRom),
            _ => None,
        }
    }
}

/// The fully-parsed, validated command-line configuration: every field of
/// §6.2/§6.3, plus the already-opened DLL oracle. Threaded from `main`
/// into the pipeline; nothing downstream re-reads `std::env::args`.
pub struct LinkerOptions {
    pub object_paths: Vec<String>,
    pub output_path: String,
    pub entry_symbol: String,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub stack_reserve: u32,
    pub stack_commit: u32,
    pub heap_reserve: u32,
    pub heap_commit: u32,
    pub subsystem: Subsystem,
    pub dllwarn: bool,
    pub oracle: LibraryOracle,
}

const DEFAULT_IMAGE_BASE: u32 = 0x0040_0000;
const DEFAULT_SECTION_ALIGNMENT: u32 = 0x1000;
const DEFAULT_FILE_ALIGNMENT: u32 = 0x200;
const DEFAULT_STACK_RESERVE: u32 = 0x0020_0000;
const DEFAULT_STACK_COMMIT: u32 = 0x1000;
const DEFAULT_HEAP_RESERVE: u32 = 0x0010_0000;
const DEFAULT_HEAP_COMMIT: u32 = 0x1000;

pub const USAGE: &str = "\
usage: i386link [options] object-files...
  -help | -h | ?           print this message and exit
  -stackReserve N          reserve N bytes of stack (default 0x200000)
  -stackCommit N           commit N bytes of stack (default 0x1000)
  -heapReserve N           reserve N bytes of heap (default 0x100000)
  -heapCommit N            commit N bytes of heap (default 0x1000)
  -sectionAllign N         section alignment (default 0x1000)
  -fileAllign N            file alignment (default 0x200)
  -base N                  preferred image base (default 0x400000)
  -entry FUN               entry point symbol (default _main)
  -out PATH                output file (default a.exe)
  -subsystem STR           native|winBoot|winGUI|winCUI|winCE|posix|os2|efiApp|efiBootDriver|efiRuntimeDriver|efiRom
  -dllwarn                 warn on fuzzy DLL symbol resolution
  -dll PATH                load an additional DLL (repeatable)
";

/// `Some(options)` for a normal link; `None` when `-help`/`-h`/`?` was
/// given and the caller should print `USAGE` and exit 0 without touching
/// any object file.
pub fn parse(args: &[String]) -> Result<Option<LinkerOptions>> {
    let mut object_paths = Vec::new();
    let mut output_path = "a.exe".to_string();
    let mut entry_symbol = "_main".to_string();
    let mut image_base = DEFAULT_IMAGE_BASE;
    let mut section_alignment = DEFAULT_SECTION_ALIGNMENT;
    let mut file_alignment = DEFAULT_FILE_ALIGNMENT;
    let mut stack_reserve = DEFAULT_STACK_RESERVE;
    let mut stack_commit = DEFAULT_STACK_COMMIT;
    let mut heap_reserve = DEFAULT_HEAP_RESERVE;
    let mut heap_commit = DEFAULT_HEAP_COMMIT;
    let mut subsystem = Subsystem::WinCui;
    let mut dllwarn = false;
    let mut extra_dlls: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-help" | "-h" | "?" => return Ok(None),
            "-dllwarn" => dllwarn = true,
            "-stackReserve" => stack_reserve = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-stackCommit" => stack_commit = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-heapReserve" => heap_reserve = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-heapCommit" => heap_commit = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-sectionAllign" => section_alignment = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-fileAllign" => file_alignment = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-base" => image_base = parse_int(&next_arg(args, &mut i, arg)?)?,
            "-entry" => entry_symbol = next_arg(args, &mut i, arg)?,
            "-out" => output_path = next_arg(args, &mut i, arg)?,
            "-dll" => extra_dlls.push(next_arg(args, &mut i, arg)?),
            "-subsystem" => {
                let name = next_arg(args, &mut i, arg)?;
                subsystem = Subsystem::from_name(&name)
                    .ok_or_else(|| LinkError::Cli(format!("unknown subsystem '{name}'")))?;
            }
            other if other.starts_with('-') => {
                return Err(LinkError::Cli(format!("unknown flag '{other}'")));
            }
            other => object_paths.push(other.to_string()),
        }
        i += 1;
    }

    if object_paths.is_empty() {
        return Err(LinkError::Cli("no object files given".to_string()));
    }

    if !section_alignment.is_power_of_two() {
        return Err(LinkError::Cli("sectionAllign must be a power of two".to_string()));
    }
    if !file_alignment.is_power_of_two() || !(512..=65536).contains(&file_alignment) {
        return Err(LinkError::Cli(
            "fileAllign must be a power of two between 512 and 65536".to_string(),
        ));
    }
    if image_base == 0 || image_base % 65536 != 0 {
        return Err(LinkError::Cli("base must be a positive multiple of 65536".to_string()));
    }
    if file_alignment > section_alignment {
        emit_warning(&format!(
            "fileAllign (0x{file_alignment:x}) > sectionAllign (0x{section_alignment:x}); raising sectionAllign to match"
        ));
        section_alignment = file_alignment;
    }

    let mut oracle = LibraryOracle::new();
    for name in DEFAULT_DLLS {
        oracle.open(name, name);
    }
    for path in &extra_dlls {
        let dll_name = dll_name_from_path(path);
        if !oracle.open(&dll_name, path) {
            emit_warning(&format!("could not open DLL '{path}'"));
        }
    }

    Ok(Some(LinkerOptions {
        object_paths,
        output_path,
        entry_symbol,
        image_base,
        section_alignment,
        file_alignment,
        stack_reserve,
        stack_commit,
        heap_reserve,
        heap_commit,
        subsystem,
        dllwarn,
        oracle,
    }))
}

fn next_arg(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| LinkError::Cli(format!("'{flag}' requires an argument")))
}

fn dll_name_from_path(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// Parses an integer the way the original linker's `std::stoi(..., 0)`
/// call does: `0x`/`0X` hex, `0o` octal (a leading bare `0` is accepted as
/// the conventional octal prefix too), else decimal.
fn parse_int(text: &str) -> Result<u32> {
    let lower = text.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u32::from_str_radix(oct, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        u32::from_str_radix(&lower[1..], 8)
    } else {
        lower.parse::<u32>()
    };
    parsed.map_err(|_| LinkError::Cli(format!("not a valid integer: '{text}'")))
}
