use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use voxschem::{
    detect_format, load_file, save_compact_file, save_json_file, FileFormat, Schematic,
};

#[derive(Parser)]
#[command(name = "schem-cli", about = "Convert and inspect voxel schematic files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode a schematic file into the compact binary format
    ToCompact {
        /// Input file (either encoding, detected from its leading bytes)
        input: PathBuf,
        /// Output .schem file path
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Re-encode a schematic file into the structured JSON format
    ToJson {
        /// Input file (either encoding, detected from its leading bytes)
        input: PathBuf,
        /// Output .json file path
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print a schematic file's dimensions, cell count and palette size
    Info {
        /// Input file (either encoding)
        input: PathBuf,
    },
}

fn run(command: Command) -> io::Result<()> {
    match command {
        Command::ToCompact { input, output } => {
            let schematic: Schematic = load_file(&input)?;
            if schematic.has_aux_data() {
                eprintln!(
                    "warning: the compact format has no auxiliary-data section; \
                     {} tile entity entries will not be written",
                    schematic.aux_data().len()
                );
            }
            save_compact_file(&output, &schematic)
        }
        Command::ToJson { input, output } => {
            let schematic: Schematic = load_file(&input)?;
            save_json_file(&output, &schematic)
        }
        Command::Info { input } => {
            let format = detect_format(&input)?;
            let schematic: Schematic = load_file(&input)?;
            let (width, height, length) = schematic.dimensions();
            println!(
                "format:   {}",
                match format {
                    FileFormat::Compact => "compact binary",
                    FileFormat::Json => "structured json",
                }
            );
            println!("size:     {width} x {height} x {length}");
            println!("cells:    {}", schematic.cells().len());
            println!("palette:  {}", schematic.palette().len());
            println!("aux data: {}", schematic.aux_data().len());
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
