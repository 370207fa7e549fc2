use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct FlushCmd {}

impl ShellCmdApi for FlushCmd {
    cmd_api!(flush);

    fn process(&mut self, _args: String, env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();

        let eeprom = match env.eeprom.as_mut() {
            Some(eeprom) => eeprom,
            None => return Ok(Some("emulated eeprom has been destroyed".to_string())),
        };

        match eeprom.flush() {
            Ok(0) => write!(ret, "nothing to flush").unwrap(),
            Ok(count) => write!(ret, "flushed {} bytes", count).unwrap(),
            Err(e) => write!(ret, "flush failed: {}", e).unwrap(),
        }
        Ok(Some(ret))
    }
}
