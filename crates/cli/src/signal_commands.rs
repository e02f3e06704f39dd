use std::path::PathBuf;

use {
    anyhow::{Context, Result},
    chrono::{Local, NaiveDate},
    clap::Args,
    stetho_config::StethoConfig,
    stetho_signals::{
        ConsoleSelector, FetchOutcome, FixedSelector, ListQuery, SaveOptions, SignalFetcher,
        SignalKind, SignalSelector, select::selection_line,
    },
    tracing::warn,
};

use crate::session;

#[derive(Args)]
pub struct FilterArgs {
    /// Recording family: stetho or heart.
    #[arg(long, default_value = "stetho")]
    kind: SignalKind,

    /// Only recordings from this date on (YYYY-MM-DD or UNIX seconds).
    #[arg(long, value_parser = parse_date)]
    start: Option<i64>,

    /// Only recordings up to this date (YYYY-MM-DD or UNIX seconds).
    #[arg(long, value_parser = parse_date)]
    end: Option<i64>,
}

impl FilterArgs {
    fn query(&self) -> ListQuery {
        ListQuery {
            start_date: self.start,
            end_date: self.end,
            offset: None,
        }
    }
}

#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Output WAV file (default: sound directory + file name from config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pick this listing index instead of asking.
    #[arg(long)]
    index: Option<usize>,

    /// Expand A-law encoded recordings to linear PCM.
    #[arg(long)]
    decode_alaw: bool,
}

#[derive(Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Target directory (default: sound directory from config).
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Expand A-law encoded recordings to linear PCM.
    #[arg(long)]
    decode_alaw: bool,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,
}

pub fn fetch(config: &StethoConfig, args: FetchArgs) -> Result<()> {
    let mut chain = session::open_chain(config)?;
    let mut fetcher = SignalFetcher::new(&mut chain, args.filter.kind);
    let output = args
        .output
        .unwrap_or_else(|| config.output.sound_dir.join(&config.output.file_name));
    let selector: Box<dyn SignalSelector> = match args.index {
        Some(index) => Box::new(FixedSelector(Some(index))),
        None => Box::new(ConsoleSelector),
    };

    let outcome = stetho_signals::fetch_selected(
        &mut fetcher,
        args.filter.query(),
        &*selector,
        &output,
        SaveOptions {
            decode_alaw: args.decode_alaw,
        },
    )?;
    match outcome {
        FetchOutcome::NoSignals => println!("No signal found"),
        FetchOutcome::Cancelled => println!("Nothing selected"),
        FetchOutcome::Saved(saved) => {
            if saved.clipped > 0 {
                warn!(clipped = saved.clipped, "some samples were clamped to 16 bits");
            }
            println!(
                "Saved signal {} ({} samples at {} Hz) to {}",
                saved.id,
                saved.samples,
                saved.sample_rate,
                saved.path.display()
            );
        },
    }
    Ok(())
}

pub fn download_all(config: &StethoConfig, args: DownloadArgs) -> Result<()> {
    let mut chain = session::open_chain(config)?;
    let mut fetcher = SignalFetcher::new(&mut chain, args.filter.kind);
    let dir = args.dir.unwrap_or_else(|| config.output.sound_dir.clone());

    let saved = stetho_signals::download_all(
        &mut fetcher,
        args.filter.query(),
        &dir,
        SaveOptions {
            decode_alaw: args.decode_alaw,
        },
    )
    .with_context(|| format!("downloading into {}", dir.display()))?;
    if saved.is_empty() {
        println!("No signal found");
    }
    for signal in &saved {
        println!("Downloaded {}", signal.path.display());
    }
    Ok(())
}

pub fn list(config: &StethoConfig, args: ListArgs) -> Result<()> {
    let mut chain = session::open_chain(config)?;
    let mut fetcher = SignalFetcher::new(&mut chain, args.filter.kind);
    let recordings = fetcher.list_all(args.filter.query())?;
    if recordings.is_empty() {
        println!("No signal found");
        return Ok(());
    }
    for (index, recording) in recordings.iter().enumerate() {
        println!(
            "{}  id={} device={}",
            selection_line(index, recording, &Local),
            recording.id,
            recording.device_hash.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// `YYYY-MM-DD` (UTC midnight) or plain UNIX seconds.
fn parse_date(value: &str) -> Result<i64, String> {
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD or UNIX seconds: {e}"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_as_utc_midnight() {
        assert_eq!(parse_date("2023-11-14").unwrap(), 1_699_920_000);
        assert_eq!(parse_date("1700000000").unwrap(), 1_700_000_000);
        assert!(parse_date("14/11/2023").is_err());
    }
}
