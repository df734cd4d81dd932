//! File-backed asset loading for loop clips.
//!
//! `FileLoader::load` hands the read + decode probe to a worker thread and
//! returns immediately; finished clips come back over a channel and are picked
//! up the next time the scheduler polls `is_loaded`.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use rodio::Decoder;

use super::{AssetLoader, ClipHandle};
use crate::error::Result;

const LOOP_EXTENSIONS: [&str; 4] = ["ogg", "wav", "mp3", "flac"];

/// Encoded clip bytes kept in memory; decoded afresh for every playback.
#[derive(Debug, Clone)]
pub struct ClipData {
    path: Arc<PathBuf>,
    bytes: Arc<[u8]>,
}

impl ClipData {
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: Arc::new(path.into()),
            bytes: bytes.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Fresh decoder over the in-memory bytes.
    pub fn decoder(&self) -> std::result::Result<Decoder<Cursor<Arc<[u8]>>>, rodio::decoder::DecoderError> {
        Decoder::new(Cursor::new(self.bytes()))
    }
}

/// Sorted audio files directly inside `dir`. Missing or unreadable directories
/// give an empty list and a warning.
pub fn scan_loop_dir(dir: &Path) -> Vec<PathBuf> {
    match try_scan(dir) {
        Ok(paths) => {
            if paths.is_empty() {
                warn!("no music loops found in {}", dir.display());
            }
            paths
        }
        Err(err) => {
            warn!("cannot read loop directory {}: {err}", dir.display());
            Vec::new()
        }
    }
}

fn try_scan(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_loop = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| LOOP_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_loop {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub struct FileLoader {
    next: u64,
    done_tx: Sender<(ClipHandle, ClipData)>,
    done_rx: Receiver<(ClipHandle, ClipData)>,
    ready: HashMap<ClipHandle, ClipData>,
}

impl FileLoader {
    pub fn new() -> Self {
        let (done_tx, done_rx) = unbounded();
        Self {
            next: 0,
            done_tx,
            done_rx,
            ready: HashMap::new(),
        }
    }

    fn pump(&mut self) {
        for (handle, data) in self.done_rx.try_iter() {
            self.ready.insert(handle, data);
        }
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_clip(path: &Path) -> Option<ClipData> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to read {}: {err}", path.display());
            return None;
        }
    };
    let data = ClipData::from_bytes(path, bytes);
    if let Err(err) = data.decoder() {
        warn!("cannot decode {}: {err}", path.display());
        return None;
    }
    Some(data)
}

impl AssetLoader for FileLoader {
    type Data = ClipData;

    fn load(&mut self, path: &Path) -> ClipHandle {
        self.next += 1;
        let handle = ClipHandle(self.next);
        let tx = self.done_tx.clone();
        let path = path.to_path_buf();
        let spawned = thread::Builder::new()
            .name("clip-loader".into())
            .spawn(move || {
                if let Some(data) = read_clip(&path) {
                    debug!("sound @{} loaded", path.display());
                    let _ = tx.send((handle, data));
                }
            });
        if let Err(err) = spawned {
            warn!("could not spawn loader thread: {err}");
        }
        handle
    }

    fn is_loaded(&mut self, handle: ClipHandle) -> bool {
        self.pump();
        self.ready.contains_key(&handle)
    }

    fn get(&self, handle: ClipHandle) -> Option<ClipData> {
        self.ready.get(&handle).cloned()
    }

    fn unload(&mut self, handle: ClipHandle) {
        self.pump();
        self.ready.remove(&handle);
    }
}
