use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct InfoCmd {}

impl ShellCmdApi for InfoCmd {
    cmd_api!(info);

    fn process(&mut self, _args: String, env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();

        let eeprom = match env.eeprom.as_ref() {
            Some(eeprom) => eeprom,
            None => return Ok(Some("emulated eeprom has been destroyed".to_string())),
        };

        let info = eeprom.info();
        write!(
            ret,
            "block {} of {}, next page {}, buffer {} of {} bytes used",
            info.curr_block + 1,
            eeprom_emu::BLOCK_COUNT,
            info.curr_page,
            info.buffer_pos,
            eeprom_emu::PAGE_CRC_OFFSET,
        )
        .unwrap();
        if info.buffer_pos != 0 {
            write!(ret, "\nbuffer:").unwrap();
            for byte in &info.page_buffer[..info.buffer_pos] {
                write!(ret, " {:02x}", byte).unwrap();
            }
        }
        Ok(Some(ret))
    }
}
