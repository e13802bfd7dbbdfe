use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// MS-DOS header (`IMAGE_DOS_HEADER`), 0x40 bytes: 19 named fields, the
/// last of which (`e_lfanew`) gives the byte offset of the PE signature.
/// This linker never emits a real real-mode stub program; it writes a
/// zero-filled header with `e_lfanew` pointing immediately past these 64
/// bytes, so the PE signature follows with no stub code in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_cblp: u16,
    pub e_cp: u16,
    pub e_crlc: u16,
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    pub e_ss: u16,
    pub e_sp: u16,
    pub e_csum: u16,
    pub e_ip: u16,
    pub e_cs: u16,
    pub e_lfarlc: u16,
    pub e_ovno: u16,
    pub e_res: [u8; 8],
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_res2: [u8; 20],
    pub e_lfanew: u32,
}

impl DosHeader {
    pub const SIZE: u64 = 0x40;
    pub const MAGIC: u16 = 0x5A4D; // "MZ"

    /// The header this linker always writes. Every optional-looking field
    /// here still carries the value the original MS linker default-filled
    /// a header with no real-mode stub program: `e_cblp`/`e_cp` describe a
    /// 3-page, half-page-remainder image that is never actually mapped,
    /// `e_maxalloc` is the conventional "all available paragraphs" 0xFFFF,
    /// `e_sp` is 0xB8, and `e_lfarlc`/`e_lfanew` both point at 0x40 — the
    /// byte right after this header, since there is no stub code to skip.
    pub fn default_header() -> Self {
        DosHeader {
            e_magic: Self::MAGIC,
            e_cblp: 0x90,
            e_cp: 0x03,
            e_crlc: 0,
            e_cparhdr: 0x4,
            e_minalloc: 0,
            e_maxalloc: 0xFFFF,
            e_ss: 0,
            e_sp: 0xB8,
            e_csum: 0,
            e_ip: 0,
            e_cs: 0,
            e_lfarlc: 0x40,
            e_ovno: 0,
            e_res: [0; 8],
            e_oemid: 0,
            e_oeminfo: 0,
            e_res2: [0; 20],
            e_lfanew: 0x40,
        }
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let e_magic = r.read_u16::<LittleEndian>()?;
        let e_cblp = r.read_u16::<LittleEndian>()?;
        let e_cp = r.read_u16::<LittleEndian>()?;
        let e_crlc = r.read_u16::<LittleEndian>()?;
        let e_cparhdr = r.read_u16::<LittleEndian>()?;
        let e_minalloc = r.read_u16::<LittleEndian>()?;
        let e_maxalloc = r.read_u16::<LittleEndian>()?;
        let e_ss = r.read_u16::<LittleEndian>()?;
        let e_sp = r.read_u16::<LittleEndian>()?;
        let e_csum = r.read_u16::<LittleEndian>()?;
        let e_ip = r.read_u16::<LittleEndian>()?;
        let e_cs = r.read_u16::<LittleEndian>()?;
        let e_lfarlc = r.read_u16::<LittleEndian>()?;
        let e_ovno = r.read_u16::<LittleEndian>()?;
        let mut e_res = [0u8; 8];
        r.read_exact(&mut e_res)?;
        let e_oemid = r.read_u16::<LittleEndian>()?;
        let e_oeminfo = r.read_u16::<LittleEndian>()?;
        let mut e_res2 = [0u8; 20];
        r.read_exact(&mut e_res2)?;
        let e_lfanew = r.read_u32::<LittleEndian>()?;

        Ok(DosHeader {
            e_magic,
            e_cblp,
            e_cp,
            e_crlc,
            e_cparhdr,
            e_minalloc,
            e_maxalloc,
            e_ss,
            e_sp,
            e_csum,
            e_ip,
            e_cs,
            e_lfarlc,
            e_ovno,
            e_res,
            e_oemid,
            e_oeminfo,
            e_res2,
            e_lfanew,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.e_magic)?;
        w.write_u16::<LittleEndian>(self.e_cblp)?;
        w.write_u16::<LittleEndian>(self.e_cp)?;
        w.write_u16::<LittleEndian>(self.e_crlc)?;
        w.write_u16::<LittleEndian>(self.e_cparhdr)?;
        w.write_u16::<LittleEndian>(self.e_minalloc)?;
        w.write_u16::<LittleEndian>(self.e_maxalloc)?;
        w.write_u16::<LittleEndian>(self.e_ss)?;
        w.write_u16::<LittleEndian>(self.e_sp)?;
        w.write_u16::<LittleEndian>(self.e_csum)?;
        w.write_u16::<LittleEndian>(self.e_ip)?;
        w.write_u16::<LittleEndian>(self.e_cs)?;
        w.write_u16::<LittleEndian>(self.e_lfarlc)?;
        w.write_u16::<LittleEndian>(self.e_ovno)?;
        w.write_all(&self.e_res)?;
        w.write_u16::<LittleEndian>(self.e_oemid)?;
        w.write_u16::<LittleEndian>(self.e_oeminfo)?;
        w.write_all(&self.e_res2)?;
        w.write_u32::<LittleEndian>(self.e_lfanew)?;
        Ok(())
    }
}
