//! Fetch-and-save flows on top of [`SignalFetcher`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    alaw::decode_alaw,
    error::Result,
    fetcher::SignalFetcher,
    select::SignalSelector,
    types::{ListQuery, SignalData},
    wav::{pcm16_bytes, save_signal},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Expand A-law (`format == 1`) recordings before writing.
    pub decode_alaw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSignal {
    pub id: i64,
    pub path: PathBuf,
    pub samples: usize,
    pub sample_rate: u32,
    /// Samples clamped to the 16-bit range.
    pub clipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The listing was empty.
    NoSignals,
    /// The selector backed out.
    Cancelled,
    Saved(SavedSignal),
}

/// List the recordings, let `selector` pick one, fetch it and save it to `path`.
pub fn fetch_selected(
    fetcher: &mut SignalFetcher<'_>,
    query: ListQuery,
    selector: &dyn SignalSelector,
    path: &Path,
    options: SaveOptions,
) -> Result<FetchOutcome> {
    let recordings = fetcher.list_all(query)?;
    if recordings.is_empty() {
        info!("no recordings found");
        return Ok(FetchOutcome::NoSignals);
    }

    let Some(index) = selector.select(&recordings)? else {
        return Ok(FetchOutcome::Cancelled);
    };
    let id = recordings[index].id;
    let data = fetcher.get(id)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(FetchOutcome::Saved(save_data(id, &data, path, options)?))
}

/// Fetch every recording into `dir` as `{signalid}_{vhd}.wav`.
pub fn download_all(
    fetcher: &mut SignalFetcher<'_>,
    query: ListQuery,
    dir: &Path,
    options: SaveOptions,
) -> Result<Vec<SavedSignal>> {
    std::fs::create_dir_all(dir)?;
    let recordings = fetcher.list_all(query)?;
    info!(count = recordings.len(), dir = %dir.display(), "downloading recordings");

    let mut saved = Vec::with_capacity(recordings.len());
    for recording in recordings {
        let data = fetcher.get(recording.id)?;
        let path = dir.join(file_name(recording.id, data.vhd));
        saved.push(save_data(recording.id, &data, &path, options)?);
    }
    Ok(saved)
}

/// Write one fetched recording to `path`.
pub fn save_data(id: i64, data: &SignalData, path: &Path, options: SaveOptions) -> Result<SavedSignal> {
    let samples = if options.decode_alaw && data.is_alaw() {
        debug!(id, "expanding A-law samples");
        decode_alaw(&data.signal)
    } else {
        data.signal.clone()
    };
    let (pcm, clipped) = pcm16_bytes(&samples);
    save_signal(path, &pcm, data.frequency)?;
    Ok(SavedSignal {
        id,
        path: path.to_path_buf(),
        samples: samples.len(),
        sample_rate: data.frequency,
        clipped,
    })
}

fn file_name(id: i64, vhd: Option<i64>) -> String {
    match vhd {
        Some(vhd) => format!("{id}_{vhd}.wav"),
        None => format!("{id}.wav"),
    }
}
