use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct WriteCmd {}

impl ShellCmdApi for WriteCmd {
    cmd_api!(write);

    fn process(&mut self, args: String, env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();
        let helpstring = "write [vaddr] [byte] .. (bytes in hex, e.g. `write 16 de ad be ef`)";

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
        let mut data = Vec::new();
        for token in tokens {
            match u8::from_str_radix(token, 16) {
                Ok(byte) => data.push(byte),
                Err(_) => return Ok(Some(format!("'{}' is not a hex byte", token))),
            }
        }
        if data.is_empty() {
            return Ok(Some(helpstring.to_string()));
        }
        if v_addr as usize + data.len() > eeprom_emu::MAX_VIRTUAL_ADDR as usize {
            return Ok(Some(format!(
                "{} bytes at {} would run past the last virtual address ({})",
                data.len(),
                v_addr,
                eeprom_emu::MAX_VIRTUAL_ADDR - 1
            )));
        }

        match eeprom.write(v_addr, &data) {
            Ok(count) => write!(ret, "wrote {} bytes at {}", count, v_addr).unwrap(),
            Err(e) => write!(ret, "write failed: {}", e).unwrap(),
        }
        Ok(Some(ret))
    }
}
