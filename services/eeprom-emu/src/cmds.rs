use core::fmt::Write;
use std::io::Result;

use eeprom_emu::EmuEeprom;
use norsim::FileFlash;

/////////////////////////// Common items to all commands
pub trait ShellCmdApi {
    // user implemented:
    // called to process the command with the remainder of the string attached
    fn process(&mut self, args: String, env: &mut CommonEnv) -> Result<Option<String>>;

    // created with cmd_api! macro
    // checks if the command matches the current verb in question
    fn matches(&self, verb: &str) -> bool;
    // returns my verb
    fn verb(&self) -> &'static str;
}
// the argument to this macro is the command verb
macro_rules! cmd_api {
    ($verb:expr) => {
        fn verb(&self) -> &'static str { stringify!($verb) }

        fn matches(&self, verb: &str) -> bool { verb == stringify!($verb) }
    };
}

/////////////////////////// Command shell integration
pub struct CommonEnv {
    /// `None` once `destroy` has run; the data verbs report that instead of
    /// panicking on a gone engine.
    pub eeprom: Option<EmuEeprom<FileFlash>>,
}

impl CommonEnv {
    /// Parse a number that may be given as decimal or 0x-prefixed hex.
    pub fn parse_u16(token: &str) -> core::result::Result<u16, String> {
        let parsed = if let Some(hex) = token.strip_prefix("0x") {
            u16::from_str_radix(hex, 16)
        } else {
            token.parse::<u16>()
        };
        parsed.map_err(|_| format!("'{}' is not a 16-bit number", token))
    }
}

/*
    To add a new command:
        0. ensure that the command implements the ShellCmdApi (above)
        1. mod/use the new command
        2. create an entry for the command's storage in the CmdEnv structure
        3. initialize the persistent storage here
        4. add it to the "commands" array in the dispatch() routine below
*/

///// 1. add your module here, and pull its namespace into the local crate
mod write;
use write::*;
mod read;
use read::*;
mod erase;
use erase::*;
mod flush;
use flush::*;
mod info;
use info::*;
mod destroy;
use destroy::*;
mod test;
use test::*;

pub struct CmdEnv {
    common_env: CommonEnv,
}

impl CmdEnv {
    pub fn new(eeprom: EmuEeprom<FileFlash>) -> CmdEnv {
        CmdEnv {
            ///// 2. the engine is the only persistent storage the verbs share
            common_env: CommonEnv { eeprom: Some(eeprom) },
        }
    }

    pub fn dispatch(&mut self, cmdline: &mut String) -> Result<Option<String>> {
        let mut ret = String::new();

        let mut write_cmd = WriteCmd {};
        let mut read_cmd = ReadCmd {};
        let mut erase_cmd = EraseCmd {};
        let mut flush_cmd = FlushCmd {};
        let mut info_cmd = InfoCmd {};
        let mut destroy_cmd = DestroyCmd {};
        let mut test_cmd = TestCmd {};

        let commands: &mut [&mut dyn ShellCmdApi] = &mut [
            ///// 4. add your command to this array, so that it can be looked up and dispatched
            &mut write_cmd,
            &mut read_cmd,
            &mut erase_cmd,
            &mut flush_cmd,
            &mut info_cmd,
            &mut destroy_cmd,
            &mut test_cmd,
        ];

        if let Some(verb) = tokenize(cmdline) {
            // search through the list of commands linearly until one matches,
            // then run it.
            for cmd in commands.iter_mut() {
                if cmd.matches(&verb) {
                    return cmd.process(cmdline.to_string(), &mut self.common_env);
                }
            }

            // if none match, create a list of available commands
            let mut first = true;
            write!(ret, "Commands: ").unwrap();
            for cmd in commands.iter() {
                if !first {
                    ret.push_str(", ");
                }
                ret.push_str(cmd.verb());
                first = false;
            }
            ret.push_str(", exit");
            Ok(Some(ret))
        } else {
            Ok(None)
        }
    }
}

/// extract the first token, as delimited by spaces
/// modifies the incoming line by removing the token and returning the remainder
/// returns the found token
pub fn tokenize(line: &mut String) -> Option<String> {
    let mut token = String::new();
    let mut retline = String::new();

    let lineiter = line.as_str().chars();
    let mut foundspace = false;
    let mut foundrest = false;
    for ch in lineiter {
        if ch != ' ' && !foundspace {
            token.push(ch);
        } else if foundspace && foundrest {
            retline.push(ch);
        } else if foundspace && ch != ' ' {
            // handle case of multiple spaces in a row
            foundrest = true;
            retline.push(ch);
        } else {
            foundspace = true;
            // consume the space
        }
    }
    line.clear();
    write!(line, "{}", retline.as_str()).unwrap();
    if !token.is_empty() { Some(token) } else { None }
}
