use std::io::{Error, ErrorKind, Result};

use norsim::NorFlash;

use crate::api::*;
use crate::backend::{
    page_crc, page_crc_valid, scan_entries, transfer_count_newer, AddressMap, BlockHeader, CoverageMap,
    Entry, HEADER_SIZE,
};

/// Byte-addressable EEPROM emulation over a page-append, block-erase flash.
///
/// Writes are encoded as `(v_addr, size, payload)` entries appended into a
/// one-page RAM buffer; a full buffer is flushed as the next data page of the
/// active block. Overwrites never happen in place: a read resolves each byte
/// from the newest entry covering it, searching the RAM buffer first and then
/// the flushed pages newest-first. When the active block runs out of data
/// pages, the latest value of every virtual byte is migrated to the next
/// block and the old block is erased, rotating the bank for wear leveling.
///
/// The engine owns the flash for its whole lifetime: `init` recovers (or
/// formats) the on-flash state and `destroy` erases it, consuming the engine.
/// All operations are synchronous and the engine is not reentrant.
pub struct EmuEeprom<F: NorFlash> {
    flash: F,
    page_buffer: [u8; PAGE_SIZE],
    /// Write offset into `page_buffer`; 0 means empty.
    buffer_pos: usize,
    /// Index of the next page to be flushed, in `1..PAGES_PER_BLOCK`.
    curr_page: usize,
    curr_block: usize,
    /// Set while a block transfer is migrating data. Flushes issued by the
    /// migration must not chain into another transfer: running out of pages
    /// mid-migration is an error, not a reason to rotate again.
    in_transfer: bool,
}

impl<F: NorFlash> EmuEeprom<F> {
    /// Bring up the emulation from whatever is on `flash`.
    ///
    /// Scans the candidate blocks for the one owning the highest transfer
    /// count, then locates its first erased data page. When no owned block
    /// exists (fresh part, foreign contents, or unreadable headers), the bank
    /// is erased and block 0 is formatted from scratch.
    pub fn init(flash: F) -> Result<EmuEeprom<F>> {
        assert!(flash.block_size() as usize == BLOCK_SIZE, "flash erase unit does not match the engine geometry");
        assert!(
            flash.size() as usize >= BLOCK_COUNT * BLOCK_SIZE,
            "flash is smaller than the emulation bank"
        );

        let mut eeprom = EmuEeprom {
            flash,
            page_buffer: [ERASED; PAGE_SIZE],
            buffer_pos: 0,
            curr_page: FIRST_DATA_PAGE,
            curr_block: 0,
            in_transfer: false,
        };

        match eeprom.active_block() {
            Some((block, header)) => {
                eeprom.curr_block = block;
                eeprom.curr_page = eeprom.find_first_erased_page(block)?;
                log::info!(
                    "emulated eeprom found: block {} of {}, transfer count {}, next page {}",
                    block + 1,
                    BLOCK_COUNT,
                    header.transfer_count,
                    eeprom.curr_page
                );
                if eeprom.curr_page >= PAGES_PER_BLOCK {
                    // the block filled up but the previous session never got
                    // to rotate; finish the job before accepting writes
                    eeprom.block_transfer()?;
                }
            }
            None => {
                eeprom.flash.erase_blocks(0, BLOCK_COUNT as u32)?;
                eeprom.format_block(0, &BlockHeader::fresh())?;
                log::info!("emulated eeprom created, using block 1 of {}", BLOCK_COUNT);
            }
        }
        Ok(eeprom)
    }

    /// Erase every block of the bank and hand the flash back.
    pub fn destroy(mut self) -> Result<F> {
        self.flash.erase_blocks(0, BLOCK_COUNT as u32)?;
        log::info!("emulated eeprom destroyed");
        Ok(self.flash)
    }

    /// Hand the flash back without touching it, discarding any unflushed
    /// buffer contents. This is what a power cut looks like.
    pub fn into_flash(self) -> F { self.flash }

    /// Snapshot of the RAM state.
    pub fn info(&self) -> EepromInfo {
        EepromInfo {
            page_buffer: self.page_buffer,
            buffer_pos: self.buffer_pos,
            curr_page: self.curr_page,
            curr_block: self.curr_block,
        }
    }

    /// Store `data` at virtual address `v_addr`. Returns the number of bytes
    /// accepted, which is always `data.len()` on success.
    pub fn write(&mut self, v_addr: u16, data: &[u8]) -> Result<usize> {
        assert!(!data.is_empty(), "write of zero bytes");
        assert!(
            v_addr as usize + data.len() <= MAX_VIRTUAL_ADDR as usize,
            "write of {} bytes at {} runs past the virtual address space",
            data.len(),
            v_addr
        );
        self.buffer_write(v_addr, data)
    }

    /// Resolve `buf.len()` bytes starting at `v_addr`, newest entry first.
    ///
    /// Returns how many positions were settled. Positions claimed by a
    /// tombstone count as settled but leave `buf` untouched, as do positions
    /// no entry has ever covered; a single-byte read that lands on a
    /// tombstone reports 0.
    pub fn read(&mut self, v_addr: u16, buf: &mut [u8]) -> Result<usize> {
        assert!(!buf.is_empty(), "read of zero bytes");
        assert!(
            v_addr as usize + buf.len() <= MAX_VIRTUAL_ADDR as usize,
            "read of {} bytes at {} runs past the virtual address space",
            buf.len(),
            v_addr
        );

        let mut map = CoverageMap::new(buf.len());
        if self.buffer_pos != 0 {
            page_search(&self.page_buffer, v_addr, buf, &mut map);
        }
        if !map.is_full() {
            if let Err(e) = self.block_read(v_addr, buf, &mut map) {
                if map.covered() == 0 {
                    return Err(e);
                }
                log::warn!("read returning {} of {} bytes after flash error: {}", map.covered(), buf.len(), e);
            }
        }
        if buf.len() == 1 && map.tombstones() > 0 {
            return Ok(0);
        }
        Ok(map.covered())
    }

    /// Remove `len` bytes starting at `v_addr` by appending one tombstone
    /// per address. Returns the result of the last append.
    pub fn erase(&mut self, v_addr: u16, len: u16) -> Result<usize> {
        assert!(len > 0, "erase of zero bytes");
        assert!(
            v_addr as usize + len as usize <= MAX_VIRTUAL_ADDR as usize,
            "erase of {} bytes at {} runs past the virtual address space",
            len,
            v_addr
        );
        let mut last = 0;
        for addr in v_addr..v_addr + len {
            last = self.buffer_write(addr, &[])?;
        }
        Ok(last)
    }

    /// Write the page buffer out as the next data page of the active block.
    ///
    /// Returns [`PAGE_SIZE`] when a page went to flash, 0 when the buffer was
    /// empty. Filling the last data page chains into a block transfer; a
    /// flush with no data page left to take it means compaction could not
    /// free space, which is an error rather than another rotation.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer_pos == 0 {
            return Ok(0);
        }
        if self.curr_page >= PAGES_PER_BLOCK {
            return Err(Error::new(
                ErrorKind::Other,
                "no data pages left: the live data is too fragmented to compact into one block",
            ));
        }
        let crc = page_crc(&self.page_buffer[..PAGE_CRC_OFFSET]);
        self.page_buffer[PAGE_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        let offset = self.page_offset(self.curr_block, self.curr_page);
        self.flash.write(offset, &self.page_buffer)?;
        log::trace!("flushed page {} of block {} ({} bytes used)", self.curr_page, self.curr_block, self.buffer_pos);
        self.page_buffer = [ERASED; PAGE_SIZE];
        self.buffer_pos = 0;
        self.curr_page += 1;
        if self.curr_page >= PAGES_PER_BLOCK && !self.in_transfer {
            self.block_transfer()?;
        }
        Ok(PAGE_SIZE)
    }

    /// Append one logical write, splitting it into page-sized entries as
    /// needed. `data` may be empty, which encodes a tombstone for `v_addr`.
    fn buffer_write(&mut self, v_addr: u16, data: &[u8]) -> Result<usize> {
        let remaining = PAGE_CRC_OFFSET - self.buffer_pos;
        // the post-append flush below keeps at least a minimal entry's room
        assert!(remaining > ENTRY_HDR_SIZE, "page buffer has no room for an entry header");

        let accepted = if remaining >= ENTRY_HDR_SIZE + data.len() {
            self.append_entry(v_addr, data);
            data.len()
        } else {
            // Fragment: the first entry takes whatever the current page still
            // holds, later entries take a full page each. The virtual address
            // of each fragment is bumped past the bytes already placed.
            let mut written = 0;
            let mut chunk = remaining - ENTRY_HDR_SIZE;
            while written < data.len() {
                let take = chunk.min(data.len() - written);
                self.append_entry(v_addr + written as u16, &data[written..written + take]);
                written += take;
                if self.buffer_pos + ENTRY_HDR_SIZE >= PAGE_CRC_OFFSET {
                    self.flush()?;
                }
                chunk = MAX_DATA_PER_PAGE;
            }
            written
        };

        if self.buffer_pos + ENTRY_HDR_SIZE >= PAGE_CRC_OFFSET {
            self.flush()?;
        }
        Ok(accepted)
    }

    fn append_entry(&mut self, v_addr: u16, payload: &[u8]) {
        let pos = self.buffer_pos;
        assert!(pos + ENTRY_HDR_SIZE + payload.len() <= PAGE_CRC_OFFSET, "entry overruns the page buffer");
        self.page_buffer[pos..pos + 2].copy_from_slice(&v_addr.to_le_bytes());
        self.page_buffer[pos + 2..pos + 4].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        self.page_buffer[pos + ENTRY_HDR_SIZE..pos + ENTRY_HDR_SIZE + payload.len()].copy_from_slice(payload);
        self.buffer_pos = pos + ENTRY_HDR_SIZE + payload.len();
        log::trace!("entry: v_addr {} len {} -> buffer_pos {}", v_addr, payload.len(), self.buffer_pos);
    }

    /// Search the flushed pages of the active block, newest first, for bytes
    /// the RAM buffer did not settle.
    fn block_read(&mut self, v_addr: u16, out: &mut [u8], map: &mut CoverageMap) -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        for p in (FIRST_DATA_PAGE..self.curr_page).rev() {
            let offset = self.page_offset(self.curr_block, p);
            self.flash.read(offset, &mut page)?;
            page_search(&page, v_addr, out, map);
            if map.is_full() {
                break;
            }
        }
        Ok(())
    }

    /// Migrate the latest value of every live virtual byte into the next
    /// block, then erase the exhausted one.
    ///
    /// The target block is erased up front (an interrupted migration may
    /// have left stray pages there) and its header is only written once the
    /// migration lands, so a half-migrated block can never win the
    /// active-block election. If the migrated data overruns the target's
    /// data pages, the transfer fails and the engine falls back to the old
    /// block, which still holds every flushed byte; it is not erased until
    /// the migration has succeeded.
    fn block_transfer(&mut self) -> Result<()> {
        debug_assert_eq!(self.buffer_pos, 0, "block transfer with a dirty page buffer");
        assert!(!self.in_transfer, "block transfer is not reentrant");
        let old_block = self.curr_block;
        let next_block = (old_block + 1) % BLOCK_COUNT;

        let mut header = self.read_header(old_block)?;
        header.transfer_count = header.next_transfer_count();
        header.block_num = next_block as u16;
        header.crc = header.compute_crc();
        log::info!(
            "block transfer {} -> {}, transfer count {}",
            old_block,
            next_block,
            header.transfer_count
        );
        self.flash.erase_blocks(next_block as u32, 1)?;
        self.curr_block = next_block;
        self.curr_page = FIRST_DATA_PAGE;

        self.in_transfer = true;
        let migration = self.migrate_block(old_block);
        self.in_transfer = false;
        if let Err(e) = migration {
            log::error!("block transfer failed, falling back to block {}: {}", old_block, e);
            self.curr_block = old_block;
            self.curr_page = PAGES_PER_BLOCK;
            self.buffer_pos = 0;
            self.page_buffer = [ERASED; PAGE_SIZE];
            return Err(e);
        }

        self.format_block(next_block, &header)?;
        self.flash.erase_blocks(old_block as u32, 1)?;
        Ok(())
    }

    /// Walk the old block newest-first and re-append every live byte into
    /// the new one.
    ///
    /// Pages are visited newest-first and entries newest-first within each
    /// page; an address bitmap records which addresses are already settled in
    /// the new block, so older values can never clobber newer ones. Source
    /// pages failing their CRC are skipped.
    fn migrate_block(&mut self, old_block: usize) -> Result<()> {
        let mut migrated = AddressMap::new();
        let mut page = [0u8; PAGE_SIZE];
        for p in (FIRST_DATA_PAGE..PAGES_PER_BLOCK).rev() {
            self.flash.read(self.page_offset(old_block, p), &mut page)?;
            if !page_crc_valid(&page) {
                log::debug!("transfer skipping page {} of block {}: bad crc", p, old_block);
                continue;
            }
            let (entries, count) = scan_entries(&page);
            for entry in entries[..count].iter().rev() {
                if entry.is_tombstone() {
                    // erased is the default state of the new block; claiming
                    // the address keeps older values from resurfacing
                    migrated.set(entry.v_addr);
                } else {
                    self.migrate_entry(&page, entry, &mut migrated)?;
                }
            }
        }
        Ok(())
    }

    /// Re-append the still-live runs of one entry's payload. Consecutive
    /// unmigrated bytes are coalesced into a single entry per streak.
    fn migrate_entry(&mut self, page: &[u8; PAGE_SIZE], entry: &Entry, migrated: &mut AddressMap) -> Result<()> {
        let mut streak_start = 0;
        let mut streak_len = 0;
        for i in 0..=entry.size {
            let live = i < entry.size && !migrated.is_set(entry.v_addr + i as u16);
            if live {
                if streak_len == 0 {
                    streak_start = i;
                }
                streak_len += 1;
            } else if streak_len > 0 {
                let addr = entry.v_addr + streak_start as u16;
                let payload = &page[entry.payload_off + streak_start..entry.payload_off + streak_start + streak_len];
                self.buffer_write(addr, payload)?;
                for a in addr..addr + streak_len as u16 {
                    migrated.set(a);
                }
                streak_len = 0;
            }
        }
        Ok(())
    }

    fn active_block(&mut self) -> Option<(usize, BlockHeader)> {
        let mut found: Option<(usize, BlockHeader)> = None;
        for block in 0..BLOCK_COUNT {
            let header = match self.read_header(block) {
                Ok(header) => header,
                Err(e) => {
                    log::warn!("skipping block {}: header unreadable ({})", block, e);
                    continue;
                }
            };
            if !header.is_owned() {
                continue;
            }
            match found {
                None => found = Some((block, header)),
                Some((_, best)) => {
                    if transfer_count_newer(best.transfer_count, header.transfer_count) {
                        found = Some((block, header));
                    }
                }
            }
        }
        found
    }

    /// Locate the first erased data page of `block`.
    ///
    /// Data pages are flushed strictly in order, so the used pages form a
    /// prefix: probing the midpoint of the remaining span and halving it
    /// pins down the used/erased boundary in log2(pages) flash reads. A page
    /// is used iff its leading u16 parses as a plausible entry address;
    /// erased flash reads back 0xFFFF, which is past the virtual range.
    fn find_first_erased_page(&mut self, block: usize) -> Result<usize> {
        let mut lo = FIRST_DATA_PAGE;
        let mut hi = PAGES_PER_BLOCK;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.page_used(block, mid)? {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        log::debug!("first erased page of block {}: {}", block, lo);
        Ok(lo)
    }

    fn page_used(&mut self, block: usize, page: usize) -> Result<bool> {
        let mut word = [0u8; 2];
        self.flash.read(self.page_offset(block, page), &mut word)?;
        Ok(u16::from_le_bytes(word) <= MAX_VIRTUAL_ADDR)
    }

    fn read_header(&mut self, block: usize) -> Result<BlockHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.flash.read(self.page_offset(block, 0), &mut buf)?;
        Ok(BlockHeader::unpack(&buf))
    }

    /// Write a block header; the target page must be in the erased state.
    fn format_block(&mut self, block: usize, header: &BlockHeader) -> Result<()> {
        self.flash.write(self.page_offset(block, 0), &header.pack())?;
        Ok(())
    }

    fn page_offset(&self, block: usize, page: usize) -> u32 { (block * BLOCK_SIZE + page * PAGE_SIZE) as u32 }
}

/// Resolve what one page image contributes to a read in progress.
///
/// Entries are enumerated in write order, then visited newest-first; a byte
/// already settled in `map` is never overwritten. Tombstones settle their
/// address without touching `out`.
fn page_search(page: &[u8], v_addr: u16, out: &mut [u8], map: &mut CoverageMap) {
    let (entries, count) = scan_entries(page);
    let r_start = v_addr as usize;
    let r_end = r_start + out.len();
    for entry in entries[..count].iter().rev() {
        if entry.is_tombstone() {
            let addr = entry.v_addr as usize;
            if addr >= r_start && addr < r_end {
                map.set_tombstone(addr - r_start);
            }
        } else {
            let e_start = entry.v_addr as usize;
            let lo = e_start.max(r_start);
            let hi = entry.end_addr().min(r_end);
            for addr in lo..hi {
                let i = addr - r_start;
                if !map.is_set(i) {
                    out[i] = page[entry.payload_off + (addr - e_start)];
                    map.set_data(i);
                }
            }
        }
        if map.is_full() {
            break;
        }
    }
}
