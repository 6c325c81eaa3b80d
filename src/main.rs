use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

mod app;
mod config;
mod digest;
mod error;
mod feed;
mod models;
mod store;
#[cfg(test)]
mod test_support;

use app::Pipeline;
use config::Config;
use error::{AppError, Result};

const USAGE: &str = "Usage: feedroll [--config PATH] [--sources LOCATION] [--output PATH]";

/// Log lines go to stderr and, when configured, are appended to a file.
struct DualWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        io::stderr().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for DualWriter {
    type Writer = DualWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DualWriter {
            file: self.file.clone(),
        }
    }
}

fn init_logging(log_file: Option<&Path>) {
    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(Mutex::new(file))),
            Err(err) => {
                eprintln!("Warning: unable to open {}: {err}", path.display());
                None
            }
        }
    });

    // RUST_LOG wins; otherwise info, with html5ever's parse chatter muted.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,html5ever=error")
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(DualWriter { file })
        .init();
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    sources: Option<String>,
    output: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| AppError::Config(format!("{flag} needs a value\n{USAGE}")))
        };
        match flag.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value()?)),
            "--sources" => parsed.sources = Some(value()?),
            "--output" => parsed.output = Some(PathBuf::from(value()?)),
            other => return Err(AppError::Config(format!("unknown argument {other}\n{USAGE}"))),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    let args = parse_args(raw)?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(sources) = args.sources {
        config.sources = sources;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }

    init_logging(config.log_file.as_deref());

    if config.default_avatar.trim().is_empty() {
        tracing::warn!("default_avatar is not set; feeds without a usable avatar will publish an empty one");
    }

    let pipeline = Pipeline::new(&config)?;
    let sources = store::load_sources(pipeline.client(), &config.sources).await?;
    if sources.is_empty() {
        tracing::warn!(location = %config.sources, "No feeds to fetch");
        return Ok(());
    }

    let report = pipeline.run(sources).await?;
    if report.written {
        println!(
            "Wrote {} articles to {}",
            report.digest.items.len(),
            config.output_path.display()
        );
    } else {
        println!("No changes; {} left untouched", config.output_path.display());
    }

    Ok(())
}
