//! Listing and retrieval of recordings through the credential chain.

use std::collections::VecDeque;

use {
    serde::de::DeserializeOwned,
    stetho_oauth::{ApiRequest, CredentialChain},
    tracing::{debug, warn},
};

use crate::{
    error::Result,
    types::{ListPage, ListQuery, SignalData, SignalDescriptor, SignalKind},
};

/// Request/decode front for one [`SignalKind`].
///
/// Holds no state of its own; every call asks the chain for a valid access
/// token, which may rotate the stored credentials.
pub struct SignalFetcher<'c> {
    chain: &'c mut CredentialChain,
    kind: SignalKind,
}

impl<'c> SignalFetcher<'c> {
    pub fn new(chain: &'c mut CredentialChain, kind: SignalKind) -> Self {
        Self { chain, kind }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// One page of the listing.
    pub fn list_page(&mut self, query: &ListQuery) -> Result<ListPage> {
        let mut request = ApiRequest::get(self.kind.path()).param("action", "list");
        if let Some(start) = query.start_date {
            request = request.param("startdate", start);
        }
        if let Some(end) = query.end_date {
            request = request.param("enddate", end);
        }
        if let Some(offset) = query.offset {
            request = request.param("offset", offset);
        }
        let page: ListPage = self.authorized(request)?;
        debug!(
            kind = ?self.kind,
            count = page.series.len(),
            more = page.more,
            "listed recordings"
        );
        Ok(page)
    }

    /// Lazily walk every page of the listing, starting at `query.offset`.
    pub fn recordings(&mut self, query: ListQuery) -> Recordings<'_, 'c> {
        Recordings {
            fetcher: self,
            query,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Every recording matching `query`, all pages collected.
    pub fn list_all(&mut self, query: ListQuery) -> Result<Vec<SignalDescriptor>> {
        self.recordings(query).collect()
    }

    /// Samples and sampling rate of one recording.
    pub fn get(&mut self, signal_id: i64) -> Result<SignalData> {
        let request = ApiRequest::get(self.kind.path())
            .param("action", "get")
            .param("signalid", signal_id);
        let data: SignalData = self.authorized(request)?;
        debug!(
            signal_id,
            samples = data.signal.len(),
            frequency = data.frequency,
            "fetched recording"
        );
        Ok(data)
    }

    fn authorized<T: DeserializeOwned>(&mut self, request: ApiRequest) -> Result<T> {
        let body = self.chain.authorized(request)?;
        let value = serde_json::from_value(body).map_err(stetho_oauth::Error::from)?;
        Ok(value)
    }
}

/// Iterator over all recordings of a listing, fetching pages on demand.
///
/// Stops after the first error, and when a page reports `more` without
/// advancing the offset.
pub struct Recordings<'f, 'c> {
    fetcher: &'f mut SignalFetcher<'c>,
    query: ListQuery,
    buffered: VecDeque<SignalDescriptor>,
    exhausted: bool,
}

impl Iterator for Recordings<'_, '_> {
    type Item = Result<SignalDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(descriptor) = self.buffered.pop_front() {
                return Some(Ok(descriptor));
            }
            if self.exhausted {
                return None;
            }

            let page = match self.fetcher.list_page(&self.query) {
                Ok(page) => page,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                },
            };

            let previous = self.query.offset.unwrap_or(0);
            if !page.more {
                self.exhausted = true;
            } else if page.offset <= previous {
                warn!(offset = page.offset, "listing did not advance, stopping");
                self.exhausted = true;
            } else {
                self.query.offset = Some(page.offset);
            }
            self.buffered.extend(page.series);
        }
    }
}
