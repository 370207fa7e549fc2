//! Interactive shell driving the emulated EEPROM on a file-backed flash
//! image. Type `help` (or anything unrecognized) for the verb list.

mod cmds;

use std::io::{BufRead, Result, Write};

use clap::Parser;
use cmds::CmdEnv;
use eeprom_emu::{EmuEeprom, BLOCK_SIZE, FLASH_SIZE};
use norsim::FileFlash;

#[derive(Debug, Parser)]
#[clap(name = "eeprom-shell")]
#[clap(about = "Interactive shell for the emulated EEPROM.", long_about = None)]
struct Cli {
    /// Flash image backing the emulation; created on first use
    #[clap(default_value = "flash.bin")]
    image: String,

    /// Run the built-in self tests and exit
    #[clap(long)]
    test: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.test {
        tests::run_suite()?;
        println!("all self tests passed");
        return Ok(());
    }

    let flash = FileFlash::open(&cli.image, FLASH_SIZE as u32, BLOCK_SIZE as u32)?;
    let eeprom = EmuEeprom::init(flash)?;
    let mut env = CmdEnv::new(eeprom);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    print!("> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }
        let mut cmdline = trimmed.to_string();
        match env.dispatch(&mut cmdline) {
            Ok(Some(response)) => println!("{}", response),
            Ok(None) => {}
            Err(e) => println!("error: {}", e),
        }
        print!("> ");
        stdout.flush()?;
    }
    Ok(())
}
