// Geometry and on-flash format constants. Everything else in the crate is
// derived from the values here; change these and the whole engine follows.

/// Smallest program unit. A page is always written whole.
pub const PAGE_SIZE: usize = 32;
/// Smallest erase unit.
pub const BLOCK_SIZE: usize = 4096;
/// Total size of the part the emulation lives on.
pub const FLASH_SIZE: usize = 65536;
/// Number of blocks dedicated to the emulation. Blocks must be consecutive,
/// starting at block 0.
pub const BLOCK_COUNT: usize = 2;

pub const PAGES_PER_BLOCK: usize = BLOCK_SIZE / PAGE_SIZE;
pub const DATA_PAGES_PER_BLOCK: usize = PAGES_PER_BLOCK - 1;

/// Trailing bytes of every data page holding its CRC-16.
pub const CRC_SIZE: usize = 2;
/// Where the page CRC lives; also the end of entry storage within a page.
pub const PAGE_CRC_OFFSET: usize = PAGE_SIZE - CRC_SIZE;

/// Packed entry header: u16 virtual address + u16 payload size.
pub const ENTRY_HDR_SIZE: usize = 4;
/// Largest payload a single entry can carry once the header and the page CRC
/// are paid for.
pub const MAX_DATA_PER_PAGE: usize = PAGE_SIZE - ENTRY_HDR_SIZE - CRC_SIZE;
/// Upper bound on entries in one page; a tombstone is header-only.
pub const MAX_PAGE_ENTRIES: usize = PAGE_CRC_OFFSET / ENTRY_HDR_SIZE;

/// One past the largest valid virtual address. Also doubles as the
/// used/erased discriminator when probing pages: a leading u16 above this
/// value can only be erased flash.
pub const MAX_VIRTUAL_ADDR: u16 = (BLOCK_SIZE / 2) as u16;

/// Erased flash reads back as all-ones.
pub const ERASED: u8 = 0xFF;

/// Index of the first data page; page 0 of every block is its header page.
pub const FIRST_DATA_PAGE: usize = 1;

/// Read-only snapshot of the engine's RAM state, for tests and the shell.
#[derive(Clone)]
pub struct EepromInfo {
    pub page_buffer: [u8; PAGE_SIZE],
    pub buffer_pos: usize,
    pub curr_page: usize,
    pub curr_block: usize,
}

impl core::fmt::Debug for EepromInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EepromInfo")
            .field("buffer_pos", &self.buffer_pos)
            .field("curr_page", &self.curr_page)
            .field("curr_block", &self.curr_block)
            .finish()
    }
}
