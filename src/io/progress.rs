use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

// Callbacks are cloned out of their slot before they run, so a callback may
// replace itself.
type DownloadCb = Arc<dyn Fn(u64, u64) + Send + Sync + 'static>;
type CleanCb = Arc<dyn Fn(CleanProgress) + Send + Sync + 'static>;

static DOWNLOAD_CB: Lazy<Mutex<Option<DownloadCb>>> = Lazy::new(|| Mutex::new(None));
static CLEAN_CB: Lazy<Mutex<Option<CleanCb>>> = Lazy::new(|| Mutex::new(None));

#[derive(Clone, Debug, PartialEq)]
pub enum CleanProgress {
    /// Pipeline stage that is about to start.
    Stage(&'static str),
    Writing { path: String },
    Finished,
}

/// Receives `(downloaded, total)` bytes while a model artifact downloads.
/// `total` is 0 when the server sends no length.
pub fn set_download_progress_callback<F>(f: F)
where
    F: Fn(u64, u64) + Send + Sync + 'static,
{
    if let Ok(mut slot) = DOWNLOAD_CB.lock() {
        *slot = Some(Arc::new(f));
    }
}

pub fn set_clean_progress_callback<F>(f: F)
where
    F: Fn(CleanProgress) + Send + Sync + 'static,
{
    if let Ok(mut slot) = CLEAN_CB.lock() {
        *slot = Some(Arc::new(f));
    }
}

pub(crate) fn emit_download_progress(done: u64, total: u64) {
    let cb = DOWNLOAD_CB.lock().ok().and_then(|slot| slot.clone());
    if let Some(cb) = cb {
        cb(done, total);
    }
}

pub(crate) fn emit_clean_progress(p: CleanProgress) {
    log::debug!("progress: {:?}", p);
    let cb = CLEAN_CB.lock().ok().and_then(|slot| slot.clone());
    if let Some(cb) = cb {
        cb(p);
    }
}
