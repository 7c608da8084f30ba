use clap::{Args, Parser, Subcommand};
use cutline_core::{FormFields, Mode, TagKey};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cutline", version, about = "Single-operation video edits through ffmpeg")]
pub struct Cli {
    /// ffmpeg executable to run (overrides the config file).
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// JSON config file with an `ffmpeg_path` entry.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the ffmpeg command instead of running it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cut the clip between two timestamps without re-encoding.
    Trim(TrimArgs),
    /// Rotate by a preset or custom angle and/or mirror the picture.
    Rotate(RotateArgs),
    /// Reverse, ping-pong, or apply a custom filter expression.
    Filter(FilterArgs),
    /// Change playback speed, optionally keeping audio in sync.
    Speed(SpeedArgs),
    /// Re-encode into another container/codec combination.
    Transcode(TranscodeArgs),
    /// Write tags and an optional cover image without re-encoding.
    Metadata(MetadataArgs),
    /// Join a second clip onto the end of the first.
    Concat(ConcatArgs),
    /// Print the version line of the resolved ffmpeg.
    Check,
    /// Run an operation saved as JSON.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct IoArgs {
    /// Input media file.
    #[arg(short = 'i', long = "input", value_name = "IN")]
    pub input: String,

    /// Output media file.
    #[arg(short = 'o', long = "output", value_name = "OUT")]
    pub output: String,
}

#[derive(Args, Debug)]
pub struct TrimArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Start time (SS, MM:SS or HH:MM:SS).
    #[arg(long)]
    pub start: String,

    /// End time (SS, MM:SS or HH:MM:SS).
    #[arg(long)]
    pub end: String,
}

#[derive(Args, Debug)]
pub struct RotateArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Preset rotation: 0, 90, 180 or 270.
    #[arg(long, default_value = "0")]
    pub preset: String,

    /// Custom angle in degrees; wins over the preset.
    #[arg(long, allow_hyphen_values = true)]
    pub angle: Option<String>,

    #[arg(long)]
    pub hflip: bool,

    #[arg(long)]
    pub vflip: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[arg(long)]
    pub reverse: bool,

    #[arg(long)]
    pub ping_pong: bool,

    /// Extra video filter appended to the graph.
    #[arg(long = "filter", value_name = "EXPR")]
    pub custom: Option<String>,
}

#[derive(Args, Debug)]
pub struct SpeedArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Playback speed factor, e.g. 2.0 for double speed.
    #[arg(long)]
    pub factor: String,

    /// Copy the audio track untouched instead of retiming it.
    #[arg(long)]
    pub keep_audio: bool,
}

#[derive(Args, Debug)]
pub struct TranscodeArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[arg(long)]
    pub container: Option<String>,

    /// Video encoder, or `copy`.
    #[arg(long)]
    pub vcodec: Option<String>,

    #[arg(long)]
    pub preset: Option<String>,

    #[arg(long)]
    pub crf: Option<String>,

    /// Target video bitrate, e.g. `2M`.
    #[arg(long)]
    pub vbitrate: Option<String>,

    /// Audio encoder, or `copy`.
    #[arg(long)]
    pub acodec: Option<String>,

    #[arg(long)]
    pub abitrate: Option<String>,
}

#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Tag to write, e.g. `--tag title="Holiday"`. Repeatable.
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub tags: Vec<(TagKey, String)>,

    /// Image attached as cover art.
    #[arg(long)]
    pub cover: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConcatArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Clip appended after the input.
    #[arg(long, value_name = "FILE")]
    pub second: String,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// JSON file holding the operation.
    pub spec: PathBuf,
}

fn parse_tag(raw: &str) -> Result<(TagKey, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim().to_ascii_lowercase();
    let tag = TagKey::ALL
        .into_iter()
        .find(|tag| tag.as_str() == key)
        .ok_or_else(|| {
            let known: Vec<_> = TagKey::ALL.iter().map(|t| t.as_str()).collect();
            format!("unknown tag `{key}` (expected one of {})", known.join(", "))
        })?;
    Ok((tag, value.to_string()))
}

fn base(io: IoArgs) -> FormFields {
    FormFields {
        input: io.input,
        output: io.output,
        ..Default::default()
    }
}

fn set(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl Command {
    /// The mode and raw form values for an edit subcommand.
    pub fn into_request(self) -> Option<(Mode, FormFields)> {
        let request = match self {
            Command::Trim(args) => {
                let mut fields = base(args.io);
                fields.trim_start = args.start;
                fields.trim_end = args.end;
                (Mode::Trim, fields)
            }
            Command::Rotate(args) => {
                let mut fields = base(args.io);
                fields.rotate_preset = args.preset;
                set(&mut fields.custom_angle, args.angle);
                fields.flip_h = args.hflip;
                fields.flip_v = args.vflip;
                (Mode::RotateFlip, fields)
            }
            Command::Filter(args) => {
                let mut fields = base(args.io);
                fields.reverse = args.reverse;
                fields.ping_pong = args.ping_pong;
                set(&mut fields.custom_filter, args.custom);
                (Mode::FilterChain, fields)
            }
            Command::Speed(args) => {
                let mut fields = base(args.io);
                fields.speed = args.factor;
                fields.adjust_audio = !args.keep_audio;
                (Mode::Speed, fields)
            }
            Command::Transcode(args) => {
                let mut fields = base(args.io);
                set(&mut fields.container, args.container);
                set(&mut fields.video_codec, args.vcodec);
                set(&mut fields.preset, args.preset);
                set(&mut fields.crf, args.crf);
                set(&mut fields.video_bitrate, args.vbitrate);
                set(&mut fields.audio_codec, args.acodec);
                set(&mut fields.audio_bitrate, args.abitrate);
                (Mode::Transcode, fields)
            }
            Command::Metadata(args) => {
                let mut fields = base(args.io);
                fields.tags = args.tags.into_iter().collect();
                set(&mut fields.cover, args.cover);
                (Mode::Metadata, fields)
            }
            Command::Concat(args) => {
                let mut fields = base(args.io);
                fields.second_input = args.second;
                (Mode::Concat, fields)
            }
            Command::Check | Command::Replay(_) => return None,
        };
        Some(request)
    }
}
