use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A non-negative time offset as the user typed it.
///
/// Accepts `SS[.fff]`, `MM:SS[.fff]` and `HH:MM:SS[.fff]`. The original text is
/// kept verbatim and is what gets handed to the engine; `seconds` only exists
/// so ranges can be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    seconds: f64,
}

impl Timestamp {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a time offset: {0:?}")]
pub struct TimestampParseError(pub String);

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let err = || TimestampParseError(s.to_string());

        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(err());
        }

        let (units, last) = parts.split_at(parts.len() - 1);
        let secs: f64 = last[0].parse().map_err(|_| err())?;
        if !secs.is_finite() || secs < 0.0 || last[0].starts_with(['+', '-']) {
            return Err(err());
        }
        if !units.is_empty() && secs >= 60.0 {
            return Err(err());
        }

        let mut total = 0.0;
        for (i, unit) in units.iter().enumerate() {
            if !unit.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            let value: u64 = unit.parse().map_err(|_| err())?;
            // Minutes are bounded only when hours precede them.
            if units.len() == 2 && i == 1 && value >= 60 {
                return Err(err());
            }
            total = total * 60.0 + value as f64;
        }

        Ok(Self {
            raw: raw.to_string(),
            seconds: total * 60.0 + secs,
        })
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimestampParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.raw
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// RotationPreset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum RotationPreset {
    #[default]
    Upright,
    Quarter,
    Half,
    ThreeQuarter,
}

impl RotationPreset {
    pub fn degrees(self) -> i32 {
        match self {
            RotationPreset::Upright => 0,
            RotationPreset::Quarter => 90,
            RotationPreset::Half => 180,
            RotationPreset::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<i32> for RotationPreset {
    type Error = crate::error::FieldError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(RotationPreset::Upright),
            90 => Ok(RotationPreset::Quarter),
            180 => Ok(RotationPreset::Half),
            270 => Ok(RotationPreset::ThreeQuarter),
            other => Err(crate::error::FieldError::InvalidPreset(other)),
        }
    }
}

impl From<RotationPreset> for i32 {
    fn from(preset: RotationPreset) -> Self {
        preset.degrees()
    }
}

// ---------------------------------------------------------------------------
// CodecChoice
// ---------------------------------------------------------------------------

/// Either stream copy (`copy`) or a named encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CodecChoice {
    Copy,
    Encoder(String),
}

impl CodecChoice {
    pub const COPY: &'static str = "copy";

    pub fn is_copy(&self) -> bool {
        matches!(self, CodecChoice::Copy)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CodecChoice::Copy => Self::COPY,
            CodecChoice::Encoder(name) => name,
        }
    }
}

impl From<&str> for CodecChoice {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s == Self::COPY {
            CodecChoice::Copy
        } else {
            CodecChoice::Encoder(s.to_string())
        }
    }
}

impl From<String> for CodecChoice {
    fn from(s: String) -> Self {
        CodecChoice::from(s.as_str())
    }
}

impl From<CodecChoice> for String {
    fn from(codec: CodecChoice) -> Self {
        codec.as_str().to_string()
    }
}

impl fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TagKey
// ---------------------------------------------------------------------------

/// Container tags, declared in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKey {
    Title,
    Artist,
    Album,
    Genre,
    Date,
    Track,
    Comment,
}

impl TagKey {
    pub const ALL: [TagKey; 7] = [
        TagKey::Title,
        TagKey::Artist,
        TagKey::Album,
        TagKey::Genre,
        TagKey::Date,
        TagKey::Track,
        TagKey::Comment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TagKey::Title => "title",
            TagKey::Artist => "artist",
            TagKey::Album => "album",
            TagKey::Genre => "genre",
            TagKey::Date => "date",
            TagKey::Track => "track",
            TagKey::Comment => "comment",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Trim,
    RotateFlip,
    FilterChain,
    Speed,
    Transcode,
    Metadata,
    Concat,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Trim => "trim",
            Mode::RotateFlip => "rotate/flip",
            Mode::FilterChain => "filters",
            Mode::Speed => "speed",
            Mode::Transcode => "transcode",
            Mode::Metadata => "metadata",
            Mode::Concat => "concat",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// OperationSpec
// ---------------------------------------------------------------------------

/// The parameters of exactly one editing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationSpec {
    Trim {
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    },
    RotateFlip {
        #[serde(default)]
        preset: RotationPreset,
        #[serde(default)]
        custom_angle: Option<i32>,
        #[serde(default)]
        flip_h: bool,
        #[serde(default)]
        flip_v: bool,
    },
    FilterChain {
        #[serde(default)]
        reverse: bool,
        #[serde(default)]
        ping_pong: bool,
        #[serde(default)]
        custom_filter: Option<String>,
    },
    Speed {
        factor: f64,
        #[serde(default)]
        adjust_audio: bool,
    },
    Transcode {
        container: String,
        video_codec: CodecChoice,
        preset: String,
        crf: u8,
        #[serde(default)]
        video_bitrate: Option<String>,
        audio_codec: CodecChoice,
        #[serde(default)]
        audio_bitrate: Option<String>,
    },
    Metadata {
        #[serde(default)]
        tags: BTreeMap<TagKey, String>,
        #[serde(default)]
        cover: Option<PathBuf>,
    },
    /// `list_file` is the concat list written by the caller; it stays `None`
    /// until that file exists.
    Concat {
        second_input: PathBuf,
        #[serde(default)]
        list_file: Option<PathBuf>,
    },
}

impl OperationSpec {
    pub fn mode(&self) -> Mode {
        match self {
            OperationSpec::Trim { .. } => Mode::Trim,
            OperationSpec::RotateFlip { .. } => Mode::RotateFlip,
            OperationSpec::FilterChain { .. } => Mode::FilterChain,
            OperationSpec::Speed { .. } => Mode::Speed,
            OperationSpec::Transcode { .. } => Mode::Transcode,
            OperationSpec::Metadata { .. } => Mode::Metadata,
            OperationSpec::Concat { .. } => Mode::Concat,
        }
    }

    /// The second input, for modes that take one.
    pub fn second_input(&self) -> Option<&PathBuf> {
        match self {
            OperationSpec::Concat { second_input, .. } => Some(second_input),
            _ => None,
        }
    }

    /// Whether this is a concat request still waiting for its list file.
    pub fn needs_list_file(&self) -> bool {
        matches!(self, OperationSpec::Concat { list_file: None, .. })
    }

    /// Attach the caller-written concat list. No-op for other modes.
    pub fn with_list_file(mut self, path: impl Into<PathBuf>) -> Self {
        if let OperationSpec::Concat { list_file, .. } = &mut self {
            *list_file = Some(path.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_keeps_original_text() {
        let ts: Timestamp = "00:00:05".parse().unwrap();
        assert_eq!(ts.as_str(), "00:00:05");
        assert_eq!(ts.as_seconds(), 5.0);
        assert_eq!(ts.to_string(), "00:00:05");
    }

    #[test]
    fn timestamp_accepts_all_forms() {
        let cases = [
            ("5", 5.0),
            ("5.25", 5.25),
            ("1:02.5", 62.5),
            ("01:00:00", 3600.0),
            ("90:00", 5400.0),
            ("0", 0.0),
        ];
        for (input, expected) in cases {
            let ts: Timestamp = input.parse().unwrap();
            assert!(
                (ts.as_seconds() - expected).abs() < 1e-9,
                "{input} parsed as {}",
                ts.as_seconds()
            );
        }
    }

    #[test]
    fn timestamp_trims_surrounding_whitespace() {
        let ts: Timestamp = "  12 ".parse().unwrap();
        assert_eq!(ts.as_str(), "12");
    }

    #[test]
    fn timestamp_rejects_malformed() {
        for input in ["", "-1", "abc", "1:2:3:4", "00:61", "1:60:00", "nan", "inf", "1::2", "a:10"] {
            assert!(input.parse::<Timestamp>().is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn timestamp_serializes_as_raw_string() {
        let ts: Timestamp = "00:01:30".parse().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"00:01:30\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
        assert!(serde_json::from_str::<Timestamp>("\"nope\"").is_err());
    }

    #[test]
    fn timestamp_error_names_the_input() {
        let err = "1:xx".parse::<Timestamp>().unwrap_err();
        assert_eq!(err, TimestampParseError("1:xx".into()));
        assert_eq!(err.to_string(), "not a time offset: \"1:xx\"");
        let _: Box<dyn std::error::Error> = Box::new(err);
    }

    #[test]
    fn rotation_preset_from_degrees() {
        assert_eq!(RotationPreset::try_from(90).unwrap(), RotationPreset::Quarter);
        assert_eq!(RotationPreset::try_from(270).unwrap().degrees(), 270);
        assert!(RotationPreset::try_from(45).is_err());
    }

    #[test]
    fn codec_choice_recognises_copy_sentinel() {
        assert!(CodecChoice::from("copy").is_copy());
        assert!(CodecChoice::from(" copy ").is_copy());
        assert_eq!(
            CodecChoice::from("libx265"),
            CodecChoice::Encoder("libx265".into())
        );
        assert_eq!(CodecChoice::Copy.to_string(), "copy");
    }

    #[test]
    fn tag_keys_sort_in_declaration_order() {
        let mut keys = vec![TagKey::Comment, TagKey::Title, TagKey::Date, TagKey::Artist];
        keys.sort();
        assert_eq!(
            keys,
            vec![TagKey::Title, TagKey::Artist, TagKey::Date, TagKey::Comment]
        );
        assert_eq!(TagKey::ALL.len(), 7);
    }

    #[test]
    fn with_list_file_only_touches_concat() {
        let spec = OperationSpec::Concat {
            second_input: PathBuf::from("b.mp4"),
            list_file: None,
        };
        assert!(spec.needs_list_file());
        let spec = spec.with_list_file("/tmp/list.txt");
        assert!(!spec.needs_list_file());
        assert_eq!(spec.mode(), Mode::Concat);

        let speed = OperationSpec::Speed {
            factor: 2.0,
            adjust_audio: false,
        };
        assert_eq!(speed.clone().with_list_file("/tmp/list.txt"), speed);
    }

    #[test]
    fn operation_spec_json_roundtrip() {
        let mut tags = BTreeMap::new();
        tags.insert(TagKey::Title, "Holiday".to_string());
        let spec = OperationSpec::Metadata {
            tags,
            cover: Some(PathBuf::from("/tmp/cover.jpg")),
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"title\":\"Holiday\""));
        let back: OperationSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.mode(), Mode::Metadata);
    }
}
