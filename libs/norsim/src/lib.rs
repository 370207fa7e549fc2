//! Offset-addressed NOR flash abstraction, plus two simulators of it.
//!
//! The [`NorFlash`] trait captures the three operations a NOR-style part
//! gives you: random-offset reads, random-offset programs, and whole-block
//! erases. Programming can only clear bits (`1 -> 0`); the only way to set a
//! bit back to `1` is to erase the block that contains it. Both simulators
//! enforce this by AND-ing incoming data into the array, so code that
//! accidentally re-programs a live region corrupts itself here the same way
//! it would on real hardware.
//!
//! [`MemFlash`] lives on the heap and is what the test suites run against.
//! [`FileFlash`] is backed by an image file so that contents survive process
//! exits; a missing image is created in the erased state on first open.

use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};
use std::path::Path;

/// Value of every byte in an erased region.
pub const ERASED_BYTE: u8 = 0xFF;

/// The flash contract consumed by the EEPROM emulation.
///
/// Offsets are absolute byte offsets from the start of the part. Reads and
/// writes return the number of bytes transferred; short transfers are not
/// produced by the simulators, but callers treat the count as authoritative.
pub trait NorFlash {
    /// Random read of `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize>;

    /// Program `data` starting at `offset`. Bits can only be cleared; the
    /// caller is responsible for targeting a region in the erased state if it
    /// expects the data to land verbatim.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize>;

    /// Reset `block_count` whole blocks, starting at `block_num`, to
    /// [`ERASED_BYTE`].
    fn erase_blocks(&mut self, block_num: u32, block_count: u32) -> Result<()>;

    /// Total capacity in bytes.
    fn size(&self) -> u32;

    /// Size of the erase unit in bytes.
    fn block_size(&self) -> u32;

    /// Number of erase units in the part.
    fn block_count(&self) -> u32 { self.size() / self.block_size() }
}

fn check_range(size: u32, offset: u32, len: usize, what: &str) -> Result<()> {
    if offset as u64 + len as u64 > size as u64 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("{} of {} bytes at {:#x} runs past the end of flash ({:#x})", what, len, offset, size),
        ));
    }
    Ok(())
}

fn check_blocks(total_blocks: u32, block_num: u32, block_count: u32) -> Result<()> {
    if block_num + block_count > total_blocks {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("erase of blocks {}..{} exceeds device ({} blocks)", block_num, block_num + block_count, total_blocks),
        ));
    }
    Ok(())
}

/// RAM-backed simulated flash.
pub struct MemFlash {
    memory: Vec<u8>,
    block_size: u32,
}

impl MemFlash {
    /// A fresh part of `size` bytes, fully erased. `size` must be a multiple
    /// of `block_size`.
    pub fn new(size: u32, block_size: u32) -> Self {
        assert!(block_size > 0 && size % block_size == 0, "flash size must be a whole number of blocks");
        MemFlash { memory: vec![ERASED_BYTE; size as usize], block_size }
    }

    /// Direct view of the array, for tests that want to corrupt or inspect
    /// specific offsets.
    pub fn as_slice(&self) -> &[u8] { &self.memory }

    /// Mutable view of the array.
    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.memory }
}

impl NorFlash for MemFlash {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize> {
        check_range(self.size(), offset, buf.len(), "read")?;
        let start = offset as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(buf.len())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize> {
        check_range(self.size(), offset, data.len(), "write")?;
        for (&src, dst) in data.iter().zip(self.memory[offset as usize..].iter_mut()) {
            *dst &= src;
        }
        Ok(data.len())
    }

    fn erase_blocks(&mut self, block_num: u32, block_count: u32) -> Result<()> {
        check_blocks(self.block_count(), block_num, block_count)?;
        let start = (block_num * self.block_size) as usize;
        let end = start + (block_count * self.block_size) as usize;
        for b in self.memory[start..end].iter_mut() {
            *b = ERASED_BYTE;
        }
        Ok(())
    }

    fn size(&self) -> u32 { self.memory.len() as u32 }

    fn block_size(&self) -> u32 { self.block_size }
}

/// File-backed simulated flash.
///
/// The whole image is mirrored in RAM; programs and erases are applied to the
/// mirror first and then written through to the file, so reads never touch
/// the disk.
pub struct FileFlash {
    file: File,
    memory: Vec<u8>,
    block_size: u32,
}

impl FileFlash {
    /// Open `path` as a flash image of `size` bytes. A missing file is
    /// created in the erased state; an existing file must be exactly `size`
    /// bytes long.
    pub fn open<P: AsRef<Path>>(path: P, size: u32, block_size: u32) -> Result<FileFlash> {
        assert!(block_size > 0 && size % block_size == 0, "flash size must be a whole number of blocks");
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        let file_len = file.metadata()?.len();
        let mut memory = vec![ERASED_BYTE; size as usize];
        if file_len == 0 {
            log::info!("creating {} byte flash image at {}", size, path.display());
            file.write_all(&memory)?;
            file.flush()?;
        } else if file_len == size as u64 {
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut memory)?;
        } else {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("flash image {} is {} bytes, expected {}", path.display(), file_len, size),
            ));
        }
        Ok(FileFlash { file, memory, block_size })
    }

    fn write_through(&mut self, offset: u32, len: usize) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&self.memory[offset as usize..offset as usize + len])?;
        Ok(())
    }
}

impl NorFlash for FileFlash {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize> {
        check_range(self.size(), offset, buf.len(), "read")?;
        let start = offset as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(buf.len())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize> {
        check_range(self.size(), offset, data.len(), "write")?;
        for (&src, dst) in data.iter().zip(self.memory[offset as usize..].iter_mut()) {
            *dst &= src;
        }
        self.write_through(offset, data.len())?;
        Ok(data.len())
    }

    fn erase_blocks(&mut self, block_num: u32, block_count: u32) -> Result<()> {
        check_blocks(self.block_count(), block_num, block_count)?;
        let start = block_num * self.block_size;
        let len = (block_count * self.block_size) as usize;
        for b in self.memory[start as usize..start as usize + len].iter_mut() {
            *b = ERASED_BYTE;
        }
        self.write_through(start, len)
    }

    fn size(&self) -> u32 { self.memory.len() as u32 }

    fn block_size(&self) -> u32 { self.block_size }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u32 = 4096;
    const BLOCK: u32 = 1024;

    #[test]
    fn fresh_part_is_erased() {
        let mut flash = MemFlash::new(SIZE, BLOCK);
        let mut buf = [0u8; 16];
        flash.read(SIZE - 16, &mut buf).unwrap();
        assert_eq!(buf, [ERASED_BYTE; 16]);
    }

    #[test]
    fn writes_clear_bits_only() {
        let mut flash = MemFlash::new(SIZE, BLOCK);
        flash.write(8, &[0xF0]).unwrap();
        // an attempt to set bits back to 1 must not take
        flash.write(8, &[0x0F]).unwrap();
        let mut buf = [0u8; 1];
        flash.read(8, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00, "program set bits without an erase");
    }

    #[test]
    fn erase_restores_erased_state() {
        let mut flash = MemFlash::new(SIZE, BLOCK);
        flash.write(BLOCK, &[0u8; 32]).unwrap();
        flash.erase_blocks(1, 1).unwrap();
        let mut buf = [0u8; 32];
        flash.read(BLOCK, &mut buf).unwrap();
        assert_eq!(buf, [ERASED_BYTE; 32]);
    }

    #[test]
    fn erase_leaves_neighbors_alone() {
        let mut flash = MemFlash::new(SIZE, BLOCK);
        flash.write(0, &[0x42]).unwrap();
        flash.write(2 * BLOCK, &[0x42]).unwrap();
        flash.erase_blocks(1, 1).unwrap();
        let mut buf = [0u8; 1];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0x42);
        flash.read(2 * BLOCK, &mut buf).unwrap();
        assert_eq!(buf[0], 0x42);
    }

    #[test]
    fn out_of_range_access_errors() {
        let mut flash = MemFlash::new(SIZE, BLOCK);
        let mut buf = [0u8; 2];
        assert!(flash.read(SIZE - 1, &mut buf).is_err());
        assert!(flash.write(SIZE, &[0]).is_err());
        assert!(flash.erase_blocks(3, 2).is_err());
    }

    #[test]
    fn file_flash_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.bin");
        {
            let mut flash = FileFlash::open(&path, SIZE, BLOCK).unwrap();
            flash.write(100, &[1, 2, 3, 4]).unwrap();
        }
        let mut flash = FileFlash::open(&path, SIZE, BLOCK).unwrap();
        let mut buf = [0u8; 4];
        flash.read(100, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn file_flash_rejects_wrong_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.bin");
        let _ = FileFlash::open(&path, SIZE, BLOCK).unwrap();
        assert!(FileFlash::open(&path, SIZE * 2, BLOCK).is_err());
    }
}
