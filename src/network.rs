//! Network services for asterix21-rs
//!
//! Raw hex records in over TCP, decoded records out as raw hex or JSON
//! lines, and an HTTP endpoint with the current target list.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::decoder::Cat21Decoder;
use crate::target::TargetStore;

const BROADCAST_CAPACITY: usize = 1024;

pub async fn run_servers(
    config: Config,
    store: Arc<RwLock<TargetStore>>,
    decoder: Arc<Cat21Decoder>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (raw_tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);
    let (json_tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);

    let raw_out_handle = {
        let tx = raw_tx.clone();
        let port = config.net_ro_port;
        tokio::spawn(async move {
            if let Err(e) = run_line_output_server("raw output", port, tx).await {
                error!("Raw output server error: {}", e);
            }
        })
    };

    let json_out_handle = {
        let tx = json_tx.clone();
        let port = config.net_json_port;
        tokio::spawn(async move {
            if let Err(e) = run_line_output_server("JSON output", port, tx).await {
                error!("JSON output server error: {}", e);
            }
        })
    };

    let raw_in_handle = {
        let port = config.net_ri_port;
        let store = Arc::clone(&store);
        let decoder = Arc::clone(&decoder);
        let raw_tx = raw_tx.clone();
        let json_tx = json_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_raw_input_server(port, store, decoder, raw_tx, json_tx).await {
                error!("Raw input server error: {}", e);
            }
        })
    };

    let http_handle = {
        let port = config.net_http_port;
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(port, store).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    tokio::select! {
        _ = raw_out_handle => {}
        _ = json_out_handle => {}
        _ = raw_in_handle => {}
        _ = http_handle => {}
    }

    Ok(())
}

/// Broadcast server: every line sent on `tx` goes to every client.
async fn run_line_output_server(
    label: &'static str,
    port: u16,
    tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("{} server listening on port {}", label, port);

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!("{} client connected: {}", label, addr);
        let mut rx = tx.subscribe();

        tokio::spawn(async move {
            let mut socket = socket;
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if socket.write_all(msg.as_bytes()).await.is_err() {
                            break;
                        }
                        if socket.write_all(b"\n").await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            debug!("{} client disconnected: {}", label, addr);
        });
    }
}

async fn run_raw_input_server(
    port: u16,
    store: Arc<RwLock<TargetStore>>,
    decoder: Arc<Cat21Decoder>,
    raw_tx: broadcast::Sender<String>,
    json_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Raw input server listening on port {}", port);

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!("Raw input client connected: {}", addr);

        let store = Arc::clone(&store);
        let decoder = Arc::clone(&decoder);
        let raw_tx = raw_tx.clone();
        let json_tx = json_tx.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(socket);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match decoder.decode_hex(line) {
                    Ok(record) => {
                        for skipped in &record.skipped {
                            debug!(
                                "{}: insufficient data for {} ({} bytes needed, {} left)",
                                addr, skipped.name, skipped.needed, skipped.available
                            );
                        }
                        {
                            let mut store = store.write();
                            store.update_from_record(&record);
                        }
                        let _ = raw_tx.send(record.raw_hex());
                        let _ = json_tx.send(record.to_json().to_string());
                    }
                    Err(e) => {
                        debug!("{}: discarded record: {}", addr, e);
                    }
                }
            }
            debug!("Raw input client disconnected: {}", addr);
        });
    }
}

async fn run_http_server(
    port: u16,
    store: Arc<RwLock<TargetStore>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("HTTP server listening on port {}", port);

    loop {
        let (socket, addr) = listener.accept().await?;
        debug!("HTTP client connected: {}", addr);

        let store = Arc::clone(&store);

        tokio::spawn(async move {
            if let Err(e) = handle_http_request(socket, store).await {
                debug!("HTTP error: {}", e);
            }
        });
    }
}

async fn handle_http_request(
    mut socket: TcpStream,
    store: Arc<RwLock<TargetStore>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut buffer = vec![0u8; 8192];
    let n = socket.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();

    if parts.len() < 2 {
        return Ok(());
    }

    let url = parts[1];

    let http_version = if first_line.contains("HTTP/1.1") { 11 } else { 10 };

    let keepalive = if http_version == 10 {
        request.to_lowercase().contains("connection: keep-alive")
    } else {
        !request.to_lowercase().contains("connection: close")
    };

    let (content_type, content) = if url.contains("/targets.json") {
        let json = targets_to_json(&store);
        ("application/json;charset=utf-8", json)
    } else {
        (
            "text/plain;charset=utf-8",
            "asterix21-rs\n\nGET /targets.json for the current target list\n".to_string(),
        )
    };

    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Server: asterix21-rs\r\n\
         Content-Type: {}\r\n\
         Connection: {}\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         \r\n",
        content_type,
        if keepalive { "keep-alive" } else { "close" },
        content.len()
    );

    socket.write_all(header.as_bytes()).await?;
    socket.write_all(content.as_bytes()).await?;

    Ok(())
}

fn targets_to_json(store: &Arc<RwLock<TargetStore>>) -> String {
    let summaries = store.read().summaries();
    serde_json::to_string(&summaries).unwrap_or_else(|_| "[]".to_string())
}
