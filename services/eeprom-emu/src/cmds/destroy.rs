use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct DestroyCmd {}

impl ShellCmdApi for DestroyCmd {
    cmd_api!(destroy);

    fn process(&mut self, args: String, env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();

        if env.eeprom.is_none() {
            return Ok(Some("emulated eeprom has already been destroyed".to_string()));
        }
        // a one-line shell has no y/n prompt, so ask for the confirmation up front
        if args.split(' ').filter(|t| !t.is_empty()).next() != Some("yes") {
            return Ok(Some("this erases the whole emulated eeprom; repeat as `destroy yes` to confirm".to_string()));
        }

        let eeprom = env.eeprom.take().unwrap();
        match eeprom.destroy() {
            Ok(_) => {
                write!(ret, "emulated eeprom erased; data verbs are disabled until the shell restarts").unwrap()
            }
            Err(e) => write!(ret, "destroy failed: {}", e).unwrap(),
        }
        Ok(Some(ret))
    }
}
