// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protected Spotify payload handling.
//!
//! The CDN delivers AES-128-CTR encrypted bytes. After decryption with the
//! track key and the fixed IV, a fixed set of byte ranges is patched to
//! reconstruct a valid OGG container header, then the file is remuxed with
//! stream copy to normalize the container.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aes::cipher::{KeyIvInit, StreamCipher};
use echotune_core::types::Track;
use echotune_core::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::download::sanitize_filename;
use crate::ResolverContext;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Fixed CTR IV shared by every protected payload.
const AUDIO_AES_IV: &str = "72e067fbddcbcf77ebe8bc643f630d93";

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);
const REMUX_TIMEOUT: Duration = Duration::from_secs(20);

/// Byte patches that rebuild the OGG header. All other bytes are preserved.
const OGG_PATCHES: &[(usize, &[u8])] = &[
    (0x00, b"OggS"),
    (0x06, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
    (0x1A, &[0x01, 0x1E, 0x01, b'v', b'o', b'r', b'b', b'i', b's']),
    (0x27, &[0x02]),
    (0x28, &[0x44, 0xAC, 0x00, 0x00]),
    (0x30, &[0x00, 0xE2, 0x04, 0x00]),
    (0x38, &[0xB8, 0x01]),
    (0x3A, b"OggS"),
    (0x3E, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
];

/// Applies the AES-128-CTR keystream; symmetric, so it both encrypts and
/// decrypts.
pub fn apply_keystream(data: &mut [u8], hex_key: &str) -> Result<(), Error> {
    let key = hex::decode(hex_key)
        .map_err(|e| Error::download(format!("invalid hex key: {e}")))?;
    if key.len() != 16 {
        return Err(Error::download(format!(
            "decryption key must be 16 bytes, got {}",
            key.len()
        )));
    }
    let iv = hex::decode(AUDIO_AES_IV)
        .map_err(|e| Error::download(format!("invalid AES IV: {e}")))?;

    let mut cipher = Aes128Ctr::new_from_slices(&key, &iv)
        .map_err(|e| Error::download(format!("cipher init failed: {e}")))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Overwrites the header byte ranges in place.
pub fn rebuild_ogg_header(data: &mut [u8]) {
    for (offset, patch) in OGG_PATCHES {
        let end = offset + patch.len();
        if end <= data.len() {
            data[*offset..end].copy_from_slice(patch);
        }
    }
}

/// Downloads, decrypts, patches, and remuxes a protected track.
///
/// Returns the final `<downloads>/<track_id>.ogg`. Intermediate files are
/// removed on every exit path.
pub async fn process_protected(
    ctx: &Arc<ResolverContext>,
    track: &Track,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    let key = track
        .decryption_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::download("missing decryption key"))?;
    let cdn_url = track
        .cdn_url
        .as_deref()
        .ok_or_else(|| Error::download("missing CDN URL"))?;

    let downloads = Path::new(&ctx.downloads.dir);
    let track_id = sanitize_filename(&track.track_id);
    let output = downloads.join(format!("{track_id}.ogg"));
    if output.exists() {
        debug!(path = %output.display(), "decrypted file already present");
        return Ok(output);
    }

    tokio::fs::create_dir_all(downloads)
        .await
        .map_err(|e| Error::DownloadFailed {
            message: "creating downloads directory failed".into(),
            source: Some(Box::new(e)),
        })?;

    let request = ctx.http.get(cdn_url).timeout(FETCH_TIMEOUT).send();
    let response = tokio::select! {
        result = request => result.map_err(|e| Error::DownloadFailed {
            message: "CDN fetch failed".into(),
            source: Some(Box::new(e)),
        })?,
        _ = cancel.cancelled() => return Err(Error::Cancelled),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(Error::download(format!("CDN returned status {status}")));
    }

    let mut data = response
        .bytes()
        .await
        .map_err(|e| Error::DownloadFailed {
            message: "CDN body read failed".into(),
            source: Some(Box::new(e)),
        })?
        .to_vec();

    apply_keystream(&mut data, key)?;
    rebuild_ogg_header(&mut data);

    let decrypted = downloads.join(format!("{track_id}_decrypted.ogg"));
    tokio::fs::write(&decrypted, &data)
        .await
        .map_err(|e| Error::DownloadFailed {
            message: "writing decrypted file failed".into(),
            source: Some(Box::new(e)),
        })?;

    let result = remux(&decrypted, &output).await;
    if let Err(e) = tokio::fs::remove_file(&decrypted).await {
        warn!(path = %decrypted.display(), error = %e, "intermediate cleanup failed");
    }
    result?;

    Ok(output)
}

/// Stream-copies the patched file through ffmpeg to normalize the container.
async fn remux(input: &Path, output: &Path) -> Result<(), Error> {
    let run = tokio::process::Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-c", "copy"])
        .arg(output)
        .output();

    let out = tokio::time::timeout(REMUX_TIMEOUT, run)
        .await
        .map_err(|_| Error::Timeout {
            duration: REMUX_TIMEOUT,
        })?
        .map_err(|e| Error::TranscodeFailed(format!("ffmpeg spawn failed: {e}")))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(Error::TranscodeFailed(format!(
            "ffmpeg remux exited with {:?}: {}",
            out.status.code(),
            stderr.trim()
        )));
    }
    Ok(())
}
