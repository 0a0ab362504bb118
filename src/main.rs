//! asterix21-rs: An ASTERIX CAT21 target report decoder
//!
//! Decodes hex-encoded CAT21 records from the command line, files, stdin,
//! or TCP clients into named, unit-scaled data items.

mod catalog;
mod config;
mod decoder;
mod network;
mod record;
mod target;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::RwLock;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::decoder::Cat21Decoder;
use crate::record::Cat21Record;
use crate::target::TargetStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let decoder = Arc::new(match config.catalog_path {
        Some(ref path) => Cat21Decoder::new(Catalog::from_json_file(path)?),
        None => Cat21Decoder::with_default_catalog(),
    });

    // Single record on the command line: decode, print, exit.
    if let Some(ref hex) = config.hex {
        return decode_single(&decoder, hex, &config);
    }

    info!("asterix21-rs starting");
    info!("Configuration: {:?}", config);

    let store = Arc::new(RwLock::new(TargetStore::new(
        config.ttl,
        config.min_records,
    )));

    // Channel for decoded records
    let (rec_tx, rec_rx): (Sender<Cat21Record>, Receiver<Cat21Record>) = bounded(1024);

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        // Start network services if enabled
        let net_handle = if config.net {
            let store = Arc::clone(&store);
            let decoder = Arc::clone(&decoder);
            let cfg = config.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = network::run_servers(cfg, store, decoder).await {
                    error!("Network error: {}", e);
                }
            }))
        } else {
            None
        };

        // Record processing task
        let store_for_processor = Arc::clone(&store);
        let config_for_processor = config.clone();
        let processor_handle = tokio::spawn(async move {
            process_records(rec_rx, store_for_processor, config_for_processor).await;
        });

        // Stale target removal task
        let cleanup_handle = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                loop {
                    interval.tick().await;
                    let mut store = store.write();
                    store.remove_stale();
                }
            })
        };

        // Local input: file, or stdin when no file was given
        if !config.net_only {
            let source = config.filename.as_deref();
            info!(
                "Reading records from {}",
                source.filter(|f| *f != "-").unwrap_or("stdin")
            );
            if let Err(e) = process_input(source, &decoder, &rec_tx) {
                error!("Error reading input: {}", e);
            }
        }
        // Closing the channel lets the processor drain and stop
        drop(rec_tx);

        if config.net {
            info!("Waiting for network clients, Ctrl+C to exit");
            tokio::signal::ctrl_c().await.ok();
        }

        // Cleanup
        cleanup_handle.abort();
        if let Some(h) = net_handle {
            h.abort();
        }
        processor_handle.await.ok();
    });

    Ok(())
}

/// Decode one record given on the command line.
fn decode_single(
    decoder: &Cat21Decoder,
    hex: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match decoder.decode_hex(hex) {
        Ok(record) => {
            warn_skipped(&record);
            if config.json {
                println!("{}", record.to_json());
            } else {
                print!("{}", record);
            }
            Ok(())
        }
        Err(e) => {
            error!("decode failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Read hex records line by line, decode, and hand them to the processor.
fn process_input(
    filename: Option<&str>,
    decoder: &Cat21Decoder,
    tx: &Sender<Cat21Record>,
) -> io::Result<()> {
    let reader: Box<dyn BufRead> = match filename {
        Some(f) if f != "-" => Box::new(BufReader::new(File::open(f)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match decoder.decode_hex(line) {
            Ok(record) => {
                if tx.send(record).is_err() {
                    break;
                }
            }
            Err(e) => warn!("discarded record: {}", e),
        }
    }
    Ok(())
}

async fn process_records(
    rx: Receiver<Cat21Record>,
    store: Arc<RwLock<TargetStore>>,
    config: Config,
) {
    while let Ok(record) = rx.recv() {
        warn_skipped(&record);

        {
            let mut store = store.write();
            store.update_from_record(&record);
        }

        if config.quiet {
            continue;
        }
        if config.raw {
            println!("{}", record.raw_hex());
        } else if config.json {
            println!("{}", record.to_json());
        } else {
            print!("{}", record);
        }
    }
}

fn warn_skipped(record: &Cat21Record) {
    for skipped in &record.skipped {
        warn!(
            "insufficient data for {}: {} bytes needed, {} remaining",
            skipped.name, skipped.needed, skipped.available
        );
    }
}
