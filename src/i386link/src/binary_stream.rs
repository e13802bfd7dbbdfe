use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

const BUFFER_SIZE: usize = 8192;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Reading,
    Writing,
}

/// A positioned byte stream over a single file descriptor that can switch
/// between buffered reading and buffered writing.
///
/// Switching Reading -> Writing seeks the underlying file back by however
/// many buffered-but-unconsumed bytes remain, so the write cursor resumes
/// exactly where the reader left off. Switching Writing -> Reading flushes
/// the write buffer first. Mixing `Read`/`Write` calls without going through
/// a file that supports both is otherwise unsound, so every access goes
/// through `switch_to_reading`/`switch_to_writing`.
pub struct BinaryStream {
    file: File,
    mode: Mode,
    buffer: Vec<u8>,
    buffer_offset: usize,
    buffer_fill: usize,
}

impl BinaryStream {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(BinaryStream {
            file,
            mode: Mode::Writing,
            buffer: vec![0u8; BUFFER_SIZE],
            buffer_offset: 0,
            buffer_fill: 0,
        })
    }

    pub fn open_read(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(BinaryStream {
            file,
            mode: Mode::Reading,
            buffer: vec![0u8; BUFFER_SIZE],
            buffer_offset: 0,
            buffer_fill: 0,
        })
    }

    fn switch_to_reading(&mut self) -> io::Result<()> {
        if self.mode == Mode::Writing {
            self.flush_write_buffer()?;
            self.buffer_offset = 0;
            self.buffer_fill = 0;
            self.mode = Mode::Reading;
        }
        Ok(())
    }

    fn switch_to_writing(&mut self) -> io::Result<()> {
        if self.mode == Mode::Reading {
            let unconsumed = (self.buffer_fill - self.buffer_offset) as i64;
            if unconsumed > 0 {
                self.file.seek(SeekFrom::Current(-unconsumed))?;
            }
            self.buffer_offset = 0;
            self.buffer_fill = 0;
            self.mode = Mode::Writing;
        }
        Ok(())
    }

    fn flush_write_buffer(&mut self) -> io::Result<()> {
        if self.buffer_offset > 0 {
            self.file.write_all(&self.buffer[..self.buffer_offset])?;
            self.buffer_offset = 0;
        }
        Ok(())
    }

    fn fill_read_buffer(&mut self) -> io::Result<()> {
        self.buffer_fill = self.file.read(&mut self.buffer)?;
        self.buffer_offset = 0;
        Ok(())
    }

    /// Current logical position, accounting for buffered-but-unconsumed
    /// (Reading) or buffered-but-unflushed (Writing) bytes.
    pub fn position(&mut self) -> io::Result<u64> {
        let actual = self.file.stream_position()?;
        Ok(match self.mode {
            Mode::Reading => actual - self.buffer_fill as u64 + self.buffer_offset as u64,
            Mode::Writing => actual + self.buffer_offset as u64,
        })
    }

    /// Repositions to an absolute offset, discarding (Reading) or flushing
    /// (Writing) whatever is buffered. Does not itself change mode.
    pub fn seek_to(&mut self, position: u64) -> io::Result<()> {
        match self.mode {
            Mode::Reading => {
                self.buffer_offset = 0;
                self.buffer_fill = 0;
            }
            Mode::Writing => {
                self.flush_write_buffer()?;
            }
        }
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.flush_write_buffer()?;
        self.file.set_len(len)
    }

    pub fn finalize(&mut self) -> io::Result<()> {
        self.flush_write_buffer()?;
        self.file.flush()
    }
}

impl Read for BinaryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.switch_to_reading()?;
        if self.buffer_offset >= self.buffer_fill {
            self.fill_read_buffer()?;
            if self.buffer_fill == 0 {
                return Ok(0);
            }
        }
        let available = self.buffer_fill - self.buffer_offset;
        let take = available.min(buf.len());
        buf[..take].copy_from_slice(&self.buffer[self.buffer_offset..self.buffer_offset + take]);
        self.buffer_offset += take;
        Ok(take)
    }
}

impl Write for BinaryStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.switch_to_writing()?;
        if self.buffer_offset >= self.buffer.len() {
            self.flush_write_buffer()?;
        }
        let space = self.buffer.len() - self.buffer_offset;
        let take = space.min(data.len());
        self.buffer[self.buffer_offset..self.buffer_offset + take].copy_from_slice(&data[..take]);
        self.buffer_offset += take;
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_write_buffer()?;
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
    use std::io::Write as _;

    #[test]
    fn write_then_read_round_trips_across_mode_switch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.bin");

        let mut stream = BinaryStream::create(&path).unwrap();
        stream.write_u32::<LittleEndian>(0xdead_beef).unwrap();
        stream.write_all(b"hello").unwrap();
        stream.finalize().unwrap();
        drop(stream);

        let mut stream = BinaryStream::open_read(&path).unwrap();
        assert_eq!(stream.read_u32::<LittleEndian>().unwrap(), 0xdead_beef);
        let mut rest = [0u8; 5];
        stream.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b"hello");
    }

    #[test]
    fn seek_to_repositions_within_same_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch2.bin");

        let mut stream = BinaryStream::create(&path).unwrap();
        stream.write_all(&[0u8; 16]).unwrap();
        stream.seek_to(4).unwrap();
        stream.write_all(&[1, 2, 3, 4]).unwrap();
        stream.finalize().unwrap();
        drop(stream);

        let mut stream = BinaryStream::open_read(&path).unwrap();
        stream.seek_to(4).unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}
