//! # Emulated EEPROM over NOR flash
//!
//! Small NOR flash parts only let you program whole pages onto erased ground
//! and only let you erase in block-sized units. This crate puts a
//! byte-addressable, overwritable storage surface on top of that: clients
//! address data by a 16-bit virtual address and issue reads, writes, and
//! erasures of arbitrary byte ranges, while the engine appends log entries
//! into pages and rotates between blocks for wear leveling.
//!
//! ## Glossary:
//! * Block - largest erase unit of the flash; the emulation owns two of them
//!   and writes to exactly one (the *active* block) at a time.
//! * Page - smallest program unit; page 0 of a block holds its header, the
//!   rest hold data and are written strictly in order.
//! * Entry - a `(v_addr, size, payload)` record appended into a page. A size
//!   of zero is a *tombstone*: it marks the single address `v_addr` erased.
//! * Virtual address - the 16-bit logical address clients use; the physical
//!   location of a byte changes with every overwrite and every rotation.
//! * Block transfer - when the active block runs out of data pages, the
//!   latest value of every live byte is migrated to the next block and the
//!   old block is erased.
//!
//! ## Code organization:
//! * `api.rs` - geometry constants and the [`EepromInfo`] snapshot.
//! * `backend/layout.rs` - the packed little-endian codecs: block headers,
//!   entry enumeration, page CRC.
//! * `backend/bitmap.rs` - the coverage bitmap a read uses to let the newest
//!   entry win byte-by-byte, and the address bitmap a transfer uses to
//!   migrate each address at most once.
//! * `backend/engine.rs` - [`EmuEeprom`] itself: the page buffer and append
//!   path, the newest-first resolver, and the block transfer.
//!
//! The flash itself is abstracted behind the [`norsim::NorFlash`] trait; the
//! engine works the same against the RAM-backed simulator the tests use and
//! the file-backed image the interactive shell uses.

pub mod api;
pub use api::*;
mod backend;
pub use backend::EmuEeprom;
