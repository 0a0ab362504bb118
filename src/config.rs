//! Configuration and command-line argument parsing

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    // Input
    /// Single record to decode, then exit
    pub hex: Option<String>,
    /// File with one hex record per line ('-' for stdin)
    pub filename: Option<String>,

    // Catalog
    /// JSON catalog path; the built-in CAT21 table when absent
    pub catalog_path: Option<String>,

    // Output
    pub json: bool,
    pub raw: bool,
    pub quiet: bool,

    // Store
    pub ttl: u64,
    pub min_records: u64,

    // Networking
    pub net: bool,
    pub net_only: bool,
    pub net_ri_port: u16,
    pub net_ro_port: u16,
    pub net_json_port: u16,
    pub net_http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hex: None,
            filename: None,
            catalog_path: None,
            json: false,
            raw: false,
            quiet: false,
            ttl: 60,
            min_records: 1,
            net: false,
            net_only: false,
            net_ri_port: 30061,
            net_ro_port: 30062,
            net_json_port: 30063,
            net_http_port: 8080,
        }
    }
}

impl Config {
    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--hex" => {
                    i += 1;
                    config.hex = args.get(i).cloned();
                }
                "--ifile" => {
                    i += 1;
                    config.filename = args.get(i).cloned();
                }
                "--catalog" => {
                    i += 1;
                    config.catalog_path = args.get(i).cloned();
                }
                "--json" => config.json = true,
                "--raw" => config.raw = true,
                "--quiet" => config.quiet = true,
                "--ttl" => {
                    i += 1;
                    config.ttl = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(60);
                }
                "--min-records" => {
                    i += 1;
                    config.min_records = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(1);
                }
                "--net" => config.net = true,
                "--net-only" => {
                    config.net = true;
                    config.net_only = true;
                }
                "--net-ri-port" => {
                    i += 1;
                    config.net_ri_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30061);
                }
                "--net-ro-port" => {
                    i += 1;
                    config.net_ro_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30062);
                }
                "--net-json-port" => {
                    i += 1;
                    config.net_json_port =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30063);
                }
                "--net-http-port" => {
                    i += 1;
                    config.net_http_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(8080);
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"asterix21-rs - ASTERIX CAT21 target report decoder

Usage: asterix21-rs [OPTIONS]

Options:
  --hex <string>         Decode a single hex record and exit
  --ifile <filename>     Read hex records from file, one per line (use '-' for stdin)
  --catalog <filename>   Load item catalog from a JSON file (default: built-in CAT21)
  --json                 Emit decoded records as JSON, one object per line
  --raw                  Echo accepted records' hex instead of decoding output
  --quiet                Suppress per-record output (store/network still updated)
  --ttl <s>              Drop targets idle for <s> seconds (default: 60)
  --min-records <N>      Min records before a target is listed (default: 1)
  --net                  Enable networking
  --net-only             Enable just networking, no file or --hex input
  --net-ri-port <port>   TCP port for raw hex input (default: 30061)
  --net-ro-port <port>   TCP port for raw hex output (default: 30062)
  --net-json-port <port> TCP port for JSON record output (default: 30063)
  --net-http-port <port> HTTP server port (default: 8080)
  --help                 Show this help
"#
    );
}
