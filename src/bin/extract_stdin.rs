//! Read a signal page from stdin and print the normal-tier record as JSON.
//! No network access. The optional argument is the page URL recorded in meta.

use std::io::{self, Read};
use std::process::ExitCode;

use signal_scraper::{extract_bytes, logging};

const DEFAULT_URL: &str = "https://www.mql5.com/en/signals/0";

fn main() -> ExitCode {
    logging::init("warn");

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());

    let mut html = Vec::new();
    if io::stdin().read_to_end(&mut html).is_err() {
        eprintln!("Failed to read from stdin");
        return ExitCode::FAILURE;
    }

    match extract_bytes(&html, &url) {
        Ok(record) => {
            println!("{}", serde_json::to_string(&record).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
