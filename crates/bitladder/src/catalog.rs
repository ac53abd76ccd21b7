#![forbid(unsafe_code)]

use std::{collections::BTreeMap, fs, path::Path};

use bitladder_abr::{BitrateLadder, QualityVariant};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Persisted catalog layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    videos: BTreeMap<String, VideoEntry>,
}

/// One video as written in the catalog JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    /// Ladder bitrates in kbps, lowest first.
    pub bitrates_kbps: Vec<f64>,
    pub total_chunks: usize,
    /// Optional `[width, height]` per ladder level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolutions: Option<Vec<(u32, u32)>>,
}

impl VideoEntry {
    fn new(bitrates_kbps: &[f64], total_chunks: usize) -> Self {
        Self {
            bitrates_kbps: bitrates_kbps.to_vec(),
            total_chunks,
            resolutions: None,
        }
    }
}

/// A validated catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoConfig {
    id: String,
    ladder: BitrateLadder,
    total_chunks: usize,
}

impl VideoConfig {
    fn from_entry(id: &str, entry: &VideoEntry) -> CatalogResult<Self> {
        let invalid = |reason: String| CatalogError::InvalidVideo {
            video: id.to_string(),
            reason,
        };

        if entry.total_chunks == 0 {
            return Err(invalid("total_chunks must be positive".into()));
        }
        if let Some(resolutions) = &entry.resolutions
            && resolutions.len() != entry.bitrates_kbps.len()
        {
            return Err(invalid(format!(
                "{} resolutions for {} bitrates",
                resolutions.len(),
                entry.bitrates_kbps.len()
            )));
        }

        let variants = entry
            .bitrates_kbps
            .iter()
            .enumerate()
            .map(|(index, &kbps)| {
                let variant = QualityVariant::new(index, kbps);
                match entry.resolutions.as_ref().and_then(|r| r.get(index)) {
                    Some(&(width, height)) => variant.with_resolution(width, height),
                    None => variant,
                }
            })
            .collect();
        let ladder = BitrateLadder::new(variants).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            id: id.to_string(),
            ladder,
            total_chunks: entry.total_chunks,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ladder(&self) -> &BitrateLadder {
        &self.ladder
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    fn to_entry(&self) -> VideoEntry {
        let variants = self.ladder.variants();
        let resolutions: Option<Vec<(u32, u32)>> = variants
            .iter()
            .map(|v| v.width.zip(v.height))
            .collect();
        VideoEntry {
            bitrates_kbps: variants
                .iter()
                .map(|v| v.bitrate_kbps.unwrap_or_default())
                .collect(),
            total_chunks: self.total_chunks,
            resolutions,
        }
    }
}

/// Per-video ladders and chunk counts, keyed by video identifier.
///
/// Every entry is validated on insertion; lookups of unknown identifiers
/// fail instead of producing an empty ladder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoCatalog {
    videos: BTreeMap<String, VideoConfig>,
}

impl VideoCatalog {
    /// The reference titles the pretrained policy was evaluated on.
    pub fn builtin() -> CatalogResult<Self> {
        let mut catalog = Self::default();
        for (id, bitrates_kbps, total_chunks) in BUILTIN_VIDEOS {
            catalog.insert(id, &VideoEntry::new(bitrates_kbps, *total_chunks))?;
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::default();
        for (id, entry) in &file.videos {
            catalog.insert(id, entry)?;
        }
        tracing::debug!(videos = catalog.len(), "video catalog parsed");
        Ok(catalog)
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> CatalogResult<String> {
        let file = CatalogFile {
            videos: self
                .videos
                .iter()
                .map(|(id, config)| (id.clone(), config.to_entry()))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn save(&self, path: &Path) -> CatalogResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Validate and add (or replace) one video.
    pub fn insert(&mut self, id: &str, entry: &VideoEntry) -> CatalogResult<()> {
        let config = VideoConfig::from_entry(id, entry)?;
        self.videos.insert(id.to_string(), config);
        Ok(())
    }

    pub fn get(&self, id: &str) -> CatalogResult<&VideoConfig> {
        self.videos
            .get(id)
            .ok_or_else(|| CatalogError::UnknownVideo(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.videos.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

const BUILTIN_VIDEOS: &[(&str, &[f64], usize)] = &[
    ("envivio", &[300.0, 750.0, 1200.0, 1850.0, 2850.0, 4300.0], 48),
    (
        "tears_of_steel",
        &[686.685, 686.685, 1116.150, 1929.169, 2362.822, 2470.094],
        244,
    ),
    (
        "redbull_2sec",
        &[300.795, 700.051, 1179.845, 1993.730, 2995.671, 3992.758],
        199,
    ),
    (
        "bbb_30fps",
        &[507.246, 1013.310, 1254.758, 1883.700, 3134.488, 4952.892],
        158,
    ),
    (
        "elephants_dream",
        &[344.976, 808.384, 1273.596, 2186.563, 3127.680, 4516.590],
        652,
    ),
    (
        "forest",
        &[279.652, 836.887, 1282.108, 1779.588, 2568.145, 3894.863],
        453,
    ),
];
