use crate::cache::{CacheDurations, Staleness};
use crate::epno::EpisodeList;
use crate::ids::{Aid, Eid, Fid, Gid, Lid, Uid};
use crate::protocol::Fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// UDP FILE masks
pub const FILE_FMASK: &str = "77da7fe8";
pub const FILE_AMASK: &str = "00008000";

const STATE_CRC_OK: i64 = 1;
const STATE_CRC_ERR: i64 = 1 << 1;
const STATE_V2: i64 = 1 << 2;
const STATE_V3: i64 = 1 << 3;
const STATE_V4: i64 = 1 << 4;
const STATE_V5: i64 = 1 << 5;
const STATE_UNCENSORED: i64 = 1 << 6;
const STATE_CENSORED: i64 = 1 << 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: String,
    /// kbit/s
    pub bitrate: u32,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub codec: String,
    /// kbit/s
    pub bitrate: u32,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
}

/// A released file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    pub fid: Fid,

    pub aid: Aid,
    pub eid: Eid,
    pub gid: Gid,
    /// List entry of this file per user
    pub lid: BTreeMap<Uid, Lid>,

    pub episode_number: EpisodeList,

    /// Set when the server had no stream information yet
    pub incomplete: bool,

    pub deprecated: bool,
    pub crc_match: bool,
    pub bad_crc: bool,
    /// Release version, 1 for the first release
    pub version: u8,
    pub uncensored: bool,
    pub censored: bool,

    pub size: u64,
    pub ed2k: String,
    pub sha1: String,
    pub crc32: String,

    pub length: Duration,
    pub air_date: Option<DateTime<Utc>>,

    pub audio_streams: Vec<AudioStream>,
    pub subtitle_languages: Vec<String>,
    pub video: VideoInfo,
    pub extension: String,

    pub source: String,

    /// Other episodes this file covers, with the covered fraction (0.0 to 1.0)
    pub related_episodes: BTreeMap<Eid, f32>,

    pub cached: DateTime<Utc>,
}

impl Staleness for File {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        if self.incomplete {
            durations.file_incomplete()
        } else {
            durations.file()
        }
    }
}

/// Maps the server's codec names to their common spelling
pub fn normalize_codec(codec: &str) -> &str {
    match codec {
        "MP3 CBR" => "MP3",
        "WMV9 (also WMV3)" => "WMV9",
        "Ogg (Vorbis)" => "Vorbis",
        "H264/AVC" => "H.264",
        other => other,
    }
}

/// Splits on `'` keeping empty entries, so parallel lists stay aligned
fn split_list(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split('\'').collect()
    }
}

impl File {
    /// Parses the data line of a 220 FILE reply
    ///
    /// The episode number is taken verbatim; see [`File::needs_episode_reconciliation`].
    pub fn from_fields(fields: &Fields) -> Self {
        let uint = |i| u32::try_from(fields.int(i)).unwrap_or(0);

        let related_episodes = fields
            .pairs(4)
            .into_iter()
            .filter_map(|(eid, pct)| {
                let eid = eid.trim().parse::<u32>().ok()?;
                let pct = pct.trim().parse::<u32>().unwrap_or(0);
                Some((Eid(eid), pct as f32 / 100.0))
            })
            .collect();

        let state = fields.int(6);
        let version = if state & STATE_V5 != 0 {
            5
        } else if state & STATE_V4 != 0 {
            4
        } else if state & STATE_V3 != 0 {
            3
        } else if state & STATE_V2 != 0 {
            2
        } else {
            1
        };

        let codecs = split_list(fields.str(13));
        let bitrates = split_list(fields.str(14));
        let languages = split_list(fields.str(19));
        let audio_streams = codecs
            .iter()
            .enumerate()
            .map(|(i, codec)| AudioStream {
                codec: normalize_codec(codec).to_string(),
                bitrate: bitrates
                    .get(i)
                    .and_then(|b| b.trim().parse().ok())
                    .unwrap_or(0),
                language: languages.get(i).map(|l| l.to_string()).unwrap_or_default(),
            })
            .collect();

        let (width, height) = fields
            .str(17)
            .split_once('x')
            .map(|(w, h)| (w.trim().parse().unwrap_or(0), h.trim().parse().unwrap_or(0)))
            .unwrap_or((0, 0));
        let color_depth = match uint(11) {
            0 => 8,
            depth => depth,
        };
        let video = VideoInfo {
            codec: normalize_codec(fields.str(15)).to_string(),
            bitrate: uint(16),
            width,
            height,
            color_depth,
        };

        Self {
            fid: fields.id(0),
            aid: fields.id(1),
            eid: fields.id(2),
            gid: fields.id(3),
            lid: BTreeMap::new(),
            episode_number: EpisodeList::parse(fields.str(23)),
            incomplete: width == 0 || height == 0,
            deprecated: fields.int(5) != 0,
            crc_match: state & STATE_CRC_OK != 0,
            bad_crc: state & STATE_CRC_ERR != 0,
            version,
            uncensored: state & STATE_UNCENSORED != 0,
            censored: state & STATE_CENSORED != 0,
            size: u64::try_from(fields.int(7)).unwrap_or(0),
            ed2k: fields.str(8).to_string(),
            sha1: fields.str(9).to_string(),
            crc32: fields.str(10).to_string(),
            length: Duration::from_secs(u64::try_from(fields.int(21)).unwrap_or(0)),
            air_date: fields.date(22),
            audio_streams,
            subtitle_languages: split_list(fields.str(20))
                .into_iter()
                .map(str::to_string)
                .collect(),
            video,
            extension: fields.str(18).to_string(),
            source: fields.str(12).to_string(),
            related_episodes,
            cached: DateTime::<Utc>::default(),
        }
    }

    /// True when the episode number spans several episodes or ranges, or the
    /// file names related episodes; such numbers are checked against the
    /// episode records before use.
    pub fn needs_episode_reconciliation(&self) -> bool {
        let ranges = self.episode_number.ranges();
        match ranges {
            [range] => !range.is_single() || !self.related_episodes.is_empty(),
            _ => true,
        }
    }

    /// True when the file covers only part of some episode
    pub fn is_partial(&self) -> bool {
        self.related_episodes.values().any(|&pct| pct < 1.0)
    }

    /// The `v2`-style suffix, empty for first releases
    pub fn version_suffix(&self) -> String {
        if self.version <= 1 {
            String::new()
        } else {
            format!("v{}", self.version)
        }
    }
}
