use core::fmt::Write;
use std::io::Result;

use crate::cmds::{CommonEnv, ShellCmdApi};

pub struct TestCmd {}

impl ShellCmdApi for TestCmd {
    cmd_api!(test);

    fn process(&mut self, _args: String, _env: &mut CommonEnv) -> Result<Option<String>> {
        let mut ret = String::new();

        // the suite runs on its own RAM-backed flash, leaving the image alone
        match crate::tests::run_suite() {
            Ok(()) => write!(ret, "all self tests passed").unwrap(),
            Err(e) => write!(ret, "{}", e).unwrap(),
        }
        Ok(Some(ret))
    }
}
