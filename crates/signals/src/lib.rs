//! Recording retrieval: list and fetch stethoscope/heart signals through an
//! authenticated credential chain, decode them and save them as WAV files.

pub mod alaw;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod select;
pub mod types;
pub mod wav;

pub use {
    download::{FetchOutcome, SaveOptions, SavedSignal, download_all, fetch_selected, save_data},
    error::{Error, Result},
    fetcher::{Recordings, SignalFetcher},
    select::{ConsoleSelector, FixedSelector, SignalSelector},
    types::{ListPage, ListQuery, SignalData, SignalDescriptor, SignalKind},
};
