use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

use crate::error::{PlayerError, Result};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "mp4"];

/// A playable piece of music and what is known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub cover: Option<PathBuf>,
    pub audio: PathBuf,
    pub description: Option<String>,
    pub rating: Option<f32>,
    pub owner: String,
    pub tags: Vec<String>,
    pub added_at: SystemTime,
    pub duration: Option<Duration>,
}

impl Track {
    /// A track with nothing but a name derived from the file stem.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());

        Self {
            id: path.to_string_lossy().into_owned(),
            name,
            author: None,
            cover: None,
            audio: path.to_path_buf(),
            description: None,
            rating: None,
            owner: "local".to_string(),
            tags: Vec::new(),
            added_at: SystemTime::now(),
            duration: None,
        }
    }

    /// Builds a track from the file's embedded tags and stream parameters.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PlayerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|source| PlayerError::Probe {
                path: path.to_path_buf(),
                source,
            })?;

        let mut track = Track::new(path);

        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                track.apply_tags(revision);
            }
        }
        if let Some(revision) = probed.format.metadata().current() {
            track.apply_tags(revision);
        }

        if let Some(stream_track) = probed.format.default_track() {
            let params = &stream_track.codec_params;
            if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
                if rate > 0 {
                    track.duration = Some(Duration::from_secs_f64(frames as f64 / rate as f64));
                }
            }
        }

        debug!("Probed {:?}: {:?} by {:?}", path, track.name, track.author);
        Ok(track)
    }

    fn apply_tags(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let value = tag.value.to_string();
            if value.trim().is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => self.name = value,
                Some(StandardTagKey::Artist) => self.author = Some(value),
                Some(StandardTagKey::Comment) => self.description = Some(value),
                Some(StandardTagKey::Genre) => {
                    if !self.tags.contains(&value) {
                        self.tags.push(value);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Ordered in-memory collection of tracks.
#[derive(Debug, Clone, Default)]
pub struct Library {
    tracks: Vec<Track>,
}

impl Library {
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Collects every audio file directly inside `dir`, sorted by path.
    pub fn scan_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| PlayerError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_audio_file(path))
            .collect();
        paths.sort();

        let tracks = paths
            .into_iter()
            .map(|path| {
                Track::from_path(&path).unwrap_or_else(|e| {
                    warn!("Could not read tags from {:?}: {}", path, e);
                    Track::new(&path)
                })
            })
            .collect::<Vec<_>>();

        info!("Scanned {:?}: {} tracks", dir, tracks.len());
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn first(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// The track after `id`, if any. Does not wrap around.
    pub fn next_after(&self, id: &str) -> Option<&Track> {
        let index = self.tracks.iter().position(|t| t.id == id)?;
        self.tracks.get(index + 1)
    }

    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Track> + 'a {
        self.tracks.iter().filter(move |t| t.has_tag(tag))
    }
}
