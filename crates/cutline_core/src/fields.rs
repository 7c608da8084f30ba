use crate::error::FieldError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw values collected by an input surface, before any parsing.
///
/// Defaults mirror what a fresh form shows: mp4/libx264/medium/crf 23,
/// aac at 128k, speed 1.0 with audio adjustment on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFields {
    pub input: String,
    pub second_input: String,
    pub output: String,

    pub trim_start: String,
    pub trim_end: String,

    pub reverse: bool,
    pub ping_pong: bool,
    pub custom_filter: String,

    pub rotate_preset: String,
    pub custom_angle: String,
    pub flip_h: bool,
    pub flip_v: bool,

    pub speed: String,
    pub adjust_audio: bool,

    pub container: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,

    pub tags: BTreeMap<TagKey, String>,
    pub cover: String,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            input: String::new(),
            second_input: String::new(),
            output: String::new(),
            trim_start: String::new(),
            trim_end: String::new(),
            reverse: false,
            ping_pong: false,
            custom_filter: String::new(),
            rotate_preset: "0".into(),
            custom_angle: String::new(),
            flip_h: false,
            flip_v: false,
            speed: "1.0".into(),
            adjust_audio: true,
            container: "mp4".into(),
            video_codec: "libx264".into(),
            preset: "medium".into(),
            crf: "23".into(),
            video_bitrate: String::new(),
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            tags: BTreeMap::new(),
            cover: String::new(),
        }
    }
}

impl FormFields {
    pub fn input_path(&self) -> Option<PathBuf> {
        non_blank(&self.input).map(PathBuf::from)
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        non_blank(&self.output).map(PathBuf::from)
    }

    /// Build the operation for `mode` from the raw values.
    ///
    /// Only syntax is checked here; whether the values make sense together
    /// (start before end, a non-zero rotation, ...) is left to compilation.
    pub fn to_spec(&self, mode: Mode) -> Result<OperationSpec, FieldError> {
        let spec = match mode {
            Mode::Trim => OperationSpec::Trim {
                start: parse_timestamp("trim_start", &self.trim_start)?,
                end: parse_timestamp("trim_end", &self.trim_end)?,
            },
            Mode::RotateFlip => {
                let degrees: i32 = parse_number("rotate_preset", &self.rotate_preset)?;
                OperationSpec::RotateFlip {
                    preset: RotationPreset::try_from(degrees)?,
                    // An unreadable custom angle falls back to the preset.
                    custom_angle: self.custom_angle.trim().parse().ok(),
                    flip_h: self.flip_h,
                    flip_v: self.flip_v,
                }
            }
            Mode::FilterChain => OperationSpec::FilterChain {
                reverse: self.reverse,
                ping_pong: self.ping_pong,
                custom_filter: non_blank(&self.custom_filter).map(str::to_string),
            },
            Mode::Speed => OperationSpec::Speed {
                factor: parse_number("speed", &self.speed)?,
                adjust_audio: self.adjust_audio,
            },
            Mode::Transcode => OperationSpec::Transcode {
                container: self.container.trim().to_string(),
                video_codec: CodecChoice::from(self.video_codec.as_str()),
                preset: self.preset.trim().to_string(),
                crf: parse_number("crf", &self.crf)?,
                video_bitrate: non_blank(&self.video_bitrate).map(str::to_string),
                audio_codec: CodecChoice::from(self.audio_codec.as_str()),
                audio_bitrate: non_blank(&self.audio_bitrate).map(str::to_string),
            },
            Mode::Metadata => OperationSpec::Metadata {
                tags: self
                    .tags
                    .iter()
                    .filter_map(|(key, value)| non_blank(value).map(|v| (*key, v.to_string())))
                    .collect(),
                cover: non_blank(&self.cover).map(PathBuf::from),
            },
            Mode::Concat => OperationSpec::Concat {
                second_input: PathBuf::from(self.second_input.trim()),
                list_file: None,
            },
        };
        Ok(spec)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, FieldError> {
    value.trim().parse().map_err(|_| FieldError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<Option<Timestamp>, FieldError> {
    match non_blank(value) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| FieldError::InvalidTimestamp {
                field,
                value: value.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_trim_bounds_become_none() {
        let fields = FormFields {
            trim_start: "00:00:05".into(),
            ..Default::default()
        };
        match fields.to_spec(Mode::Trim).unwrap() {
            OperationSpec::Trim { start, end } => {
                assert_eq!(start.unwrap().as_str(), "00:00:05");
                assert!(end.is_none());
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn malformed_trim_bound_is_a_field_error() {
        let fields = FormFields {
            trim_start: "five".into(),
            trim_end: "10".into(),
            ..Default::default()
        };
        assert_eq!(
            fields.to_spec(Mode::Trim).unwrap_err(),
            FieldError::InvalidTimestamp {
                field: "trim_start",
                value: "five".into()
            }
        );
    }

    #[test]
    fn unreadable_custom_angle_is_ignored() {
        let fields = FormFields {
            rotate_preset: "90".into(),
            custom_angle: "abc".into(),
            ..Default::default()
        };
        match fields.to_spec(Mode::RotateFlip).unwrap() {
            OperationSpec::RotateFlip {
                preset,
                custom_angle,
                ..
            } => {
                assert_eq!(preset, RotationPreset::Quarter);
                assert_eq!(custom_angle, None);
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn unknown_rotation_preset_is_rejected() {
        let fields = FormFields {
            rotate_preset: "45".into(),
            ..Default::default()
        };
        assert_eq!(
            fields.to_spec(Mode::RotateFlip).unwrap_err(),
            FieldError::InvalidPreset(45)
        );
    }

    #[test]
    fn speed_must_parse() {
        let fields = FormFields {
            speed: "fast".into(),
            ..Default::default()
        };
        assert!(matches!(
            fields.to_spec(Mode::Speed),
            Err(FieldError::InvalidNumber { field: "speed", .. })
        ));
    }

    #[test]
    fn transcode_defaults() {
        let spec = FormFields::default().to_spec(Mode::Transcode).unwrap();
        assert_eq!(
            spec,
            OperationSpec::Transcode {
                container: "mp4".into(),
                video_codec: CodecChoice::Encoder("libx264".into()),
                preset: "medium".into(),
                crf: 23,
                video_bitrate: None,
                audio_codec: CodecChoice::Encoder("aac".into()),
                audio_bitrate: Some("128k".into()),
            }
        );
    }

    #[test]
    fn crf_out_of_u8_range_is_rejected() {
        let fields = FormFields {
            crf: "300".into(),
            ..Default::default()
        };
        assert!(fields.to_spec(Mode::Transcode).is_err());
    }

    #[test]
    fn metadata_drops_blank_tags() {
        let mut fields = FormFields::default();
        fields.tags.insert(TagKey::Title, " A ".into());
        fields.tags.insert(TagKey::Artist, "   ".into());
        match fields.to_spec(Mode::Metadata).unwrap() {
            OperationSpec::Metadata { tags, cover } => {
                assert_eq!(tags.len(), 1);
                assert_eq!(tags[&TagKey::Title], "A");
                assert!(cover.is_none());
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn concat_waits_for_list_file() {
        let fields = FormFields {
            second_input: "/media/b.mp4".into(),
            ..Default::default()
        };
        let spec = fields.to_spec(Mode::Concat).unwrap();
        assert!(spec.needs_list_file());
        assert_eq!(spec.second_input(), Some(&PathBuf::from("/media/b.mp4")));
    }

    #[test]
    fn paths_are_trimmed() {
        let fields = FormFields {
            input: "  /media/in.mp4 ".into(),
            output: "   ".into(),
            ..Default::default()
        };
        assert_eq!(fields.input_path(), Some(PathBuf::from("/media/in.mp4")));
        assert_eq!(fields.output_path(), None);
    }
}
