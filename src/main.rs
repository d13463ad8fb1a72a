use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use recordio::{open_reader, HeaderValue};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recordio")]
#[command(about = "Record container CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack each input file as one record; layout is chosen from the
    /// output suffix (.rio unpacked, .rpk packed, .rpkz packed + flate).
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        inputs: Vec<PathBuf>,
    },
    /// Extract every record into numbered files.
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List records with their byte lengths.
    List { input: PathBuf },
    /// Print header entries, record count, and trailer.
    Info { input: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Pack { output, inputs } => {
            let mut writer = recordio::create_writer(output);
            for input in inputs {
                let data = fs::read(input)?;
                if !writer.write(&data) {
                    break;
                }
            }
            writer.close();
            if let Some(err) = writer.error() {
                return Err(err.to_string().into());
            }
            println!("Packed {} record(s) into {}", inputs.len(), output.display());
        }
        Commands::Unpack { input, output_dir } => {
            if !output_dir.exists() {
                fs::create_dir_all(output_dir)?;
            }
            let mut reader = open_reader(input);
            let mut n = 0usize;
            while reader.scan() {
                let out_path = output_dir.join(format!("record_{n:05}.bin"));
                File::create(&out_path)?.write_all(reader.get())?;
                n += 1;
            }
            if let Some(err) = reader.error() {
                return Err(err.to_string().into());
            }
            println!("Unpacked {n} record(s)");
        }
        Commands::List { input } => {
            let mut reader = open_reader(input);
            println!("{:<8} {:<10}", "Record", "Bytes");
            let mut n = 0usize;
            while reader.scan() {
                println!("{:<8} {:<10}", n, reader.get().len());
                n += 1;
            }
            if let Some(err) = reader.error() {
                return Err(err.to_string().into());
            }
        }
        Commands::Info { input } => {
            let mut reader = open_reader(input);
            let mut records = 0usize;
            let mut bytes = 0usize;
            while reader.scan() {
                records += 1;
                bytes += reader.get().len();
            }
            if let Some(err) = reader.error() {
                return Err(err.to_string().into());
            }
            println!("--- {} ---", input.display());
            for entry in reader.header() {
                let value = match &entry.value {
                    HeaderValue::Invalid => "<invalid>".to_string(),
                    HeaderValue::Bool(b) => b.to_string(),
                    HeaderValue::Int(i) => i.to_string(),
                    HeaderValue::Uint(u) => u.to_string(),
                    HeaderValue::String(s) => format!("{s:?}"),
                };
                println!("header  {} = {}", entry.key, value);
            }
            println!("records {records}");
            println!("bytes   {bytes}");
            if !reader.trailer().is_empty() {
                println!("trailer {} byte(s)", reader.trailer().len());
            }
        }
    }
    Ok(())
}
