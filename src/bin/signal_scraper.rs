//! Scrape one signal page and print the record as pretty JSON.
//!
//! Usage: signal_scraper <url> [--tier fast|normal|advanced] [--bypass-cache] [--selectors <file.json>]
//!
//! Logs go to stderr; `RUST_LOG` adjusts the level.

use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use signal_scraper::{logging, LoggingObserver, Options, RequestOptions, Scraper, SelectorConfig, Tier};

const USAGE: &str =
    "usage: signal_scraper <url> [--tier fast|normal|advanced] [--bypass-cache] [--selectors <file.json>]";

struct Args {
    url: String,
    tier: Option<Tier>,
    bypass_cache: bool,
    selectors: Option<String>,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut url = None;
    let mut tier = None;
    let mut bypass_cache = false;
    let mut selectors = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tier" => {
                let value = args.next().ok_or("--tier needs a value")?;
                tier = Some(value.parse::<Tier>()?);
            }
            "--bypass-cache" => bypass_cache = true,
            "--selectors" => selectors = Some(args.next().ok_or("--selectors needs a path")?),
            "-h" | "--help" => return Err(USAGE.into()),
            other if other.starts_with("--") => return Err(format!("unknown flag {other}\n{USAGE}").into()),
            other => {
                if url.replace(other.to_string()).is_some() {
                    return Err(format!("more than one URL given\n{USAGE}").into());
                }
            }
        }
    }

    Ok(Args {
        url: url.ok_or(USAGE)?,
        tier,
        bypass_cache,
        selectors,
    })
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut options = Options::default();
    if let Some(path) = &args.selectors {
        options = options.with_selectors(SelectorConfig::from_json_file(path)?);
    }

    let scraper = Scraper::new(options)?;
    scraper.subscribe(Arc::new(LoggingObserver));

    let record = scraper
        .get_signal_data(
            &args.url,
            &RequestOptions {
                tier: args.tier,
                bypass_cache: args.bypass_cache,
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("signal_scraper=info");

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
