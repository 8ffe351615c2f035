//! Streamed audio file downloads.
//!
//! A background task on the catalog runtime appends response chunks to a
//! shared buffer. [`HttpByteStream`] reads from that buffer on any thread,
//! blocking only until the bytes it needs have arrived.

use futures_util::StreamExt;
use minispot_core::{ByteStream, StreamCanceller};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct DownloadState {
    data: Vec<u8>,
    complete: bool,
    error: Option<String>,
    cancelled: bool,
}

/// Buffer shared between the download task and its readers
pub(crate) struct Download {
    label: String,
    total: Option<u64>,
    state: Mutex<DownloadState>,
    ready: Condvar,
    task: Mutex<Option<AbortHandle>>,
}

impl Download {
    fn lock(&self) -> MutexGuard<'_, DownloadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, chunk: &[u8]) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.data.extend_from_slice(chunk);
        self.ready.notify_all();
    }

    fn finish(&self, error: Option<String>) {
        let mut state = self.lock();
        if state.complete {
            return;
        }
        state.complete = true;
        state.error = error;
        self.ready.notify_all();
    }

    fn cancel(&self) {
        {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            self.ready.notify_all();
        }
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        debug!(file = %self.label, "Download cancelled");
    }

    /// Bytes received so far
    pub(crate) fn received(&self) -> usize {
        self.lock().data.len()
    }
}

/// Marks the download complete if the task ends without doing so itself
/// (aborted, or its runtime shut down), so readers never wait forever.
struct FinishOnDrop(Arc<Download>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish(Some("download aborted".into()));
    }
}

/// Start downloading `response` on `runtime`
pub(crate) fn spawn_download(
    runtime: &Handle,
    label: String,
    response: reqwest::Response,
) -> HttpByteStream {
    let download = Arc::new(Download {
        label,
        total: response.content_length(),
        state: Mutex::new(DownloadState::default()),
        ready: Condvar::new(),
        task: Mutex::new(None),
    });

    let guard = FinishOnDrop(Arc::clone(&download));
    let handle = runtime.spawn(async move {
        let download = Arc::clone(&guard.0);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => download.append(&bytes),
                Err(e) => {
                    warn!(file = %download.label, error = %e, "Download failed");
                    download.finish(Some(e.to_string()));
                    return;
                }
            }
        }

        debug!(file = %download.label, bytes = download.received(), "Download complete");
        download.finish(None);
        drop(guard);
    });

    *download.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.abort_handle());

    HttpByteStream { download, pos: 0 }
}

/// Readable view over an in-flight download
pub struct HttpByteStream {
    download: Arc<Download>,
    pos: u64,
}

impl HttpByteStream {
    /// Current read offset
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for HttpByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.download.lock();
        loop {
            if state.cancelled {
                return Ok(0);
            }

            let available = state.data.len() as u64;
            if self.pos < available {
                let start = usize::try_from(self.pos)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
                let n = buf.len().min(state.data.len() - start);
                buf[..n].copy_from_slice(&state.data[start..start + n]);
                self.pos += n as u64;
                return Ok(n);
            }

            if state.complete {
                return match &state.error {
                    Some(message) => Err(io::Error::other(message.clone())),
                    None => Ok(0),
                };
            }

            state = self
                .download
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Seek for HttpByteStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let total = self.download.total.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "stream length unknown")
                })?;
                total.checked_add_signed(delta)
            }
        };

        let target = target
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start"))?;
        if let Some(total) = self.download.total {
            if target > total {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "seek past end of stream",
                ));
            }
        }

        self.pos = target;
        Ok(target)
    }
}

impl ByteStream for HttpByteStream {
    fn canceller(&self) -> Arc<dyn StreamCanceller> {
        Arc::new(DownloadCanceller(Arc::clone(&self.download)))
    }

    fn byte_len(&self) -> Option<u64> {
        self.download.total
    }

    fn is_seekable(&self) -> bool {
        self.download.total.is_some()
    }
}

impl Drop for HttpByteStream {
    fn drop(&mut self) {
        self.download.cancel();
    }
}

struct DownloadCanceller(Arc<Download>);

impl StreamCanceller for DownloadCanceller {
    fn cancel(&self) {
        self.0.cancel();
    }
}
