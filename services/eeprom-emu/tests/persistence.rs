//! Recovery tests: the engine must come back to the same logical position
//! after a clean exit or a power cut, with all flushed data intact.

use eeprom_emu::{EmuEeprom, BLOCK_SIZE, FLASH_SIZE, FIRST_DATA_PAGE};
use norsim::{FileFlash, MemFlash};

fn mem_flash() -> MemFlash { MemFlash::new(FLASH_SIZE as u32, BLOCK_SIZE as u32) }

#[test]
fn reinit_recovers_position_and_data() {
    let mut eeprom = EmuEeprom::init(mem_flash()).unwrap();
    let data: Vec<u8> = (0..40u8).collect();
    eeprom.write(500, &data).unwrap();
    eeprom.flush().unwrap();
    let before = eeprom.info();
    assert_eq!(before.buffer_pos, 0);

    // simulated power cut and restart
    let mut eeprom = EmuEeprom::init(eeprom.into_flash()).unwrap();
    let after = eeprom.info();
    assert_eq!(after.curr_block, before.curr_block);
    assert_eq!(after.curr_page, before.curr_page, "probe found the wrong resume page");

    let mut out = vec![0u8; data.len()];
    assert_eq!(eeprom.read(500, &mut out).unwrap(), data.len());
    assert_eq!(out, data);
}

#[test]
fn unflushed_writes_do_not_survive_a_power_cut() {
    let mut eeprom = EmuEeprom::init(mem_flash()).unwrap();
    eeprom.write(10, &[0x55; 4]).unwrap();
    // no flush: the bytes only exist in the RAM page buffer
    let mut eeprom = EmuEeprom::init(eeprom.into_flash()).unwrap();
    let mut out = [0u8; 4];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), 0);
}

#[test]
fn flush_then_power_cut_preserves_the_page() {
    let mut eeprom = EmuEeprom::init(mem_flash()).unwrap();
    eeprom.write(10, &[0x55; 4]).unwrap();
    eeprom.write(20, &[0x66; 4]).unwrap();
    eeprom.flush().unwrap();
    eeprom.write(30, &[0x77; 4]).unwrap(); // lost with the power

    let mut eeprom = EmuEeprom::init(eeprom.into_flash()).unwrap();
    let mut out = [0u8; 4];
    assert_eq!(eeprom.read(10, &mut out).unwrap(), 4);
    assert_eq!(out, [0x55; 4]);
    assert_eq!(eeprom.read(20, &mut out).unwrap(), 4);
    assert_eq!(out, [0x66; 4]);
    assert_eq!(eeprom.read(30, &mut out).unwrap(), 0);
}

#[test]
fn recovery_after_many_pages() {
    let mut eeprom = EmuEeprom::init(mem_flash()).unwrap();
    for i in 0..20u16 {
        eeprom.write(i * 8, &[i as u8; 8]).unwrap();
        eeprom.flush().unwrap();
    }
    let before = eeprom.info();
    assert_eq!(before.curr_page, FIRST_DATA_PAGE + 20);

    let mut eeprom = EmuEeprom::init(eeprom.into_flash()).unwrap();
    assert_eq!(eeprom.info().curr_page, before.curr_page);
    for i in 0..20u16 {
        let mut out = [0u8; 8];
        assert_eq!(eeprom.read(i * 8, &mut out).unwrap(), 8);
        assert_eq!(out, [i as u8; 8]);
    }
}

#[test]
fn recovery_lands_after_a_transfer() {
    let mut eeprom = EmuEeprom::init(mem_flash()).unwrap();
    while eeprom.info().curr_block == 0 {
        eeprom.write(64, &[0xA5; 24]).unwrap();
    }
    eeprom.flush().unwrap();
    let before = eeprom.info();

    let mut eeprom = EmuEeprom::init(eeprom.into_flash()).unwrap();
    assert_eq!(eeprom.info().curr_block, before.curr_block);
    assert_eq!(eeprom.info().curr_page, before.curr_page);
    let mut out = [0u8; 24];
    assert_eq!(eeprom.read(64, &mut out).unwrap(), 24);
    assert_eq!(out, [0xA5; 24]);
}

#[test]
fn file_backed_image_survives_process_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    {
        let flash = FileFlash::open(&path, FLASH_SIZE as u32, BLOCK_SIZE as u32).unwrap();
        let mut eeprom = EmuEeprom::init(flash).unwrap();
        eeprom.write(1234, b"persist me").unwrap();
        eeprom.flush().unwrap();
        // engine and file handle dropped here, like a process exit
    }
    let flash = FileFlash::open(&path, FLASH_SIZE as u32, BLOCK_SIZE as u32).unwrap();
    let mut eeprom = EmuEeprom::init(flash).unwrap();
    let mut out = [0u8; 10];
    assert_eq!(eeprom.read(1234, &mut out).unwrap(), 10);
    assert_eq!(&out, b"persist me");
}

#[test]
fn destroyed_image_reinitializes_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    {
        let flash = FileFlash::open(&path, FLASH_SIZE as u32, BLOCK_SIZE as u32).unwrap();
        let mut eeprom = EmuEeprom::init(flash).unwrap();
        eeprom.write(0, &[1, 2, 3]).unwrap();
        eeprom.flush().unwrap();
        eeprom.destroy().unwrap();
    }
    let flash = FileFlash::open(&path, FLASH_SIZE as u32, BLOCK_SIZE as u32).unwrap();
    let mut eeprom = EmuEeprom::init(flash).unwrap();
    let mut out = [0u8; 3];
    assert_eq!(eeprom.read(0, &mut out).unwrap(), 0, "destroy must not leave data behind");
    assert_eq!(eeprom.info().curr_page, FIRST_DATA_PAGE);
}
