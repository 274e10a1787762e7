use crate::{
    error::{CleanError, Result},
    io::progress::emit_download_progress,
};
use reqwest::blocking::Client;
use std::{
    io::{Read, Write},
    path::Path,
    time::Duration,
};
use tempfile::NamedTempFile;

pub fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("voice-cleaner-core/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(None)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Stream `url` into `dest`. The file only appears at `dest` once complete.
pub fn download_with_progress(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let mut resp = client.get(url).send()?.error_for_status()?;
    let total = resp.content_length().unwrap_or(0);

    let dir = dest
        .parent()
        .ok_or_else(|| CleanError::Io(std::io::Error::other("destination has no parent")))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;

    log::info!("downloading {url} ({total} bytes)");
    let mut buf = vec![0u8; 256 * 1024];
    let mut done = 0u64;
    loop {
        let n = resp.read(&mut buf)?;
        if n == 0 {
            break;
        }
        tmp.write_all(&buf[..n])?;
        done += n as u64;
        emit_download_progress(done, total);
    }
    tmp.flush()?;
    tmp.persist(dest).map_err(|e| CleanError::Io(e.error))?;
    Ok(())
}
