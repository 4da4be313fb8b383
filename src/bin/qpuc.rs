//! QPU instruction-word tool.
//!
//! Decodes raw 64-bit words and encodes semaphore and load-immediate instructions.

use clap::{Parser, Subcommand, ValueEnum};
use qpuc::qpu::{
    decode_any, InstructionWord, LoadImmediateInstruction, LoadMode, MachineInstruction, SemaphoreInstruction,
};

#[derive(Parser)]
#[command(name = "qpuc", version, about = "VideoCore IV QPU instruction-word encoder/decoder")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode instruction words given in hexadecimal
    Decode {
        /// Words such as 0xe80009e700000013
        words: Vec<String>,
        /// Also print every field of the decoded word
        #[arg(long)]
        fields: bool,
    },
    /// Encode a semaphore instruction
    Semaphore {
        /// Semaphore index (0-15)
        #[arg(long)]
        index: u8,
        /// Increment (release) instead of decrement (acquire)
        #[arg(long)]
        increment: bool,
    },
    /// Encode a load-immediate into accumulator r0
    LoadImm {
        /// Value to load
        #[arg(long)]
        value: u32,
        #[arg(long, value_enum, default_value_t = Mode::Immediate32)]
        mode: Mode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Immediate32,
    Signed,
    Unsigned,
}

impl From<Mode> for LoadMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Immediate32 => LoadMode::Immediate32,
            Mode::Signed => LoadMode::PerElementSigned,
            Mode::Unsigned => LoadMode::PerElementUnsigned,
        }
    }
}

/// Write address of accumulator r0.
const ACCUMULATOR_R0: u8 = 32;

fn parse_word(text: &str) -> Result<InstructionWord, std::num::ParseIntError> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
    u64::from_str_radix(&digits, 16).map(InstructionWord)
}

fn decode_words(words: &[String], show_fields: bool) -> Result<(), Box<dyn std::error::Error>> {
    for text in words {
        let word = parse_word(text)?;
        match decode_any(word) {
            Some(inst) => {
                println!("{word}  {:<14} {inst}", inst.kind());
                if show_fields {
                    for field in inst.fields() {
                        println!("    {:<10} {}", field.name, field.describe(field.extract(word.0)));
                    }
                }
            }
            None => {
                log::debug!("{word} matches none of the supported layouts");
                println!("{word}  <unsupported>");
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Command::Decode { words, fields } => decode_words(&words, fields),
        Command::Semaphore { index, increment } => SemaphoreInstruction::new(index, increment)
            .encode()
            .map(|word| println!("{word}"))
            .map_err(Into::into),
        Command::LoadImm { value, mode } => {
            LoadImmediateInstruction::new(mode.into(), ACCUMULATOR_R0, value)
                .encode()
                .map(|word| println!("{word}"))
                .map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
