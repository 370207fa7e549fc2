use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct EraseCmd {}

impl ShellCmdApi for EraseCmd {
    cmd_api!(erase);

    fn process(&mut self, args: String, env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();
        let helpstring = "erase [vaddr] [len]";

        let eeprom = match env.eeprom.as_mut() {
            Some(eeprom) => eeprom,
            None => return Ok(Some("emulated eeprom has been destroyed".to_string())),
        };

        let mut tokens = args.split(' ').filter(|t| !t.is_empty());
        let v_addr = match tokens.next().map(CommonEnv::parse_u16) {
            Some(Ok(v_addr)) => v_addr,
            Some(Err(e)) => return Ok(Some(e)),
            None => return Ok(Some(helpstring.to_string())),
        };
        let len = match tokens.next().map(CommonEnv::parse_u16) {
            Some(Ok(len)) if len > 0 => len,
            Some(Ok(_)) => return Ok(Some("len must be at least 1".to_string())),
            Some(Err(e)) => return Ok(Some(e)),
            None => 1,
        };
        if v_addr as usize + len as usize > eeprom_emu::MAX_VIRTUAL_ADDR as usize {
            return Ok(Some(format!(
                "{} bytes at {} would run past the last virtual address ({})",
                len,
                v_addr,
                eeprom_emu::MAX_VIRTUAL_ADDR - 1
            )));
        }

        match eeprom.erase(v_addr, len) {
            Ok(_) => write!(ret, "erased {} bytes at {}", len, v_addr).unwrap(),
            Err(e) => write!(ret, "erase failed: {}", e).unwrap(),
        }
        Ok(Some(ret))
    }
}
