use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use partbox::error::PartboxError;
use partbox::file_ops;
use partbox::passphrase::{
    ConstantSecretReader, ReaderSecretReader, SecretReader, TerminalSecretReader,
};

#[derive(Parser, Debug)]
#[command(
    name = "partbox",
    version,
    about = "splits a file into independently encrypted parts and merges them back"
)]
struct Cli {
    /// Read the base secret from stdin instead of from terminal
    #[arg(long = "passphrase-stdin", action = ArgAction::SetTrue, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a file into encrypted parts
    Encrypt {
        /// Path to the file to split and encrypt
        input_path: PathBuf,
        /// Size of each part's plaintext in bytes
        chunk_size: u64,
        /// Base secret every chunk key is derived from; prompted for when omitted
        base_password: Option<String>,
    },
    /// Reassemble a file from its encrypted parts
    Decrypt {
        /// Path to any one of the encrypted parts
        first_part_path: PathBuf,
        /// Path to write the reassembled file to
        output_path: PathBuf,
        /// Base secret every chunk key is derived from; prompted for when omitted
        base_password: Option<String>,
    },
}

fn secret_reader(arg: Option<String>, passphrase_stdin: bool) -> Box<dyn SecretReader> {
    match arg {
        Some(secret) => Box::new(ConstantSecretReader::new(secret.into_bytes())),
        None if passphrase_stdin => {
            Box::new(ReaderSecretReader::new(Box::new(std::io::stdin())))
        }
        None => Box::new(TerminalSecretReader::new()),
    }
}

fn run(cli: Cli) -> Result<(), PartboxError> {
    match cli.command {
        Commands::Encrypt {
            input_path,
            chunk_size,
            base_password,
        } => {
            let secret = secret_reader(base_password, cli.passphrase_stdin).read_secret()?;
            let parts = file_ops::split_file(&input_path, chunk_size, &secret)?;
            println!("File split into {} encrypted parts.", parts.len());
            Ok(())
        }
        Commands::Decrypt {
            first_part_path,
            output_path,
            base_password,
        } => {
            let secret = secret_reader(base_password, cli.passphrase_stdin).read_secret()?;
            file_ops::merge_file(&first_part_path, &output_path, &secret)?;
            println!("Reassembled file written to {}.", output_path.display());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("partbox: {}", err);
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
