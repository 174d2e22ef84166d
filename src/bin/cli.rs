//! filewire CLI Client
//!
//! Command-line interface for listing, downloading and uploading files.

use clap::{Parser, Subcommand};
use filewire::protocol::Body;
use filewire::{Client, ClientConfig, Transfer};
use tracing_subscriber::{fmt, EnvFilter};

/// filewire CLI
#[derive(Parser, Debug)]
#[command(name = "filewire-cli")]
#[command(about = "CLI for the filewire file server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7771")]
    server: String,

    /// Directory uploads are read from
    #[arg(long, default_value = "./files")]
    upload_dir: String,

    /// Directory downloads are written to
    #[arg(long, default_value = "./downloaded_files")]
    download_dir: String,

    /// Socket timeout for GET/UPLOAD in seconds (0 disables)
    #[arg(short, long, default_value = "300")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List files on the server
    List,

    /// Download a file
    Get {
        /// The file to download
        filename: String,
    },

    /// Upload a file
    Upload {
        /// The file to upload, relative to the upload directory
        filename: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let config = ClientConfig::builder()
        .server_addr(&args.server)
        .transfer_timeout_ms(args.timeout.saturating_mul(1000))
        .upload_dir(&args.upload_dir)
        .download_dir(&args.download_dir)
        .build();
    let client = Client::new(config);

    let ok = match args.command {
        Commands::List => {
            let response = client.list();
            match &response.body {
                Body::Listing { data } if response.is_ok() => {
                    println!("Files:");
                    for name in data {
                        println!("- {name}");
                    }
                    true
                }
                _ => {
                    eprintln!("Failed: {}", response.message_text().unwrap_or("unexpected reply"));
                    false
                }
            }
        }
        Commands::Get { filename } => report("Downloaded", &filename, &client.get(&filename)),
        Commands::Upload { filename } => report("Uploaded", &filename, &client.upload(&filename)),
    };

    if !ok {
        std::process::exit(1);
    }
}

fn report(action: &str, filename: &str, transfer: &Transfer) -> bool {
    if transfer.is_ok() {
        println!(
            "{action} {filename}: {} bytes in {:.2?} ({:.0} B/s)",
            transfer.bytes,
            transfer.duration,
            transfer.throughput()
        );
        true
    } else {
        eprintln!(
            "Failed: {}",
            transfer.response.message_text().unwrap_or("unexpected reply")
        );
        false
    }
}
