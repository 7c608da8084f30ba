use crate::error::CompileError;
use cutline_core::types::*;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Bounds accepted by a single `atempo` stage.
pub const TEMPO_MIN: f64 = 0.5;
pub const TEMPO_MAX: f64 = 2.0;

/// Cap on the 0.5x/2.0x stages a speed factor may decompose into. Factors
/// needing more than this (beyond 2^64 either way) are rejected.
pub const MAX_TEMPO_STAGES: usize = 64;

/// Label of the video pad every filter-chain graph ends on.
const GRAPH_OUT: &str = "outv";

/// An engine command line ready to hand to the supervisor.
///
/// Arguments are kept as OS strings so paths reach the engine byte for byte;
/// [`argv`](Self::argv) and `Display` are lossy renderings for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    program: PathBuf,
    args: Vec<OsString>,
}

impl EngineInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program followed by its arguments, as text.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for EngineInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.argv().iter().map(|a| shell_quote(a)).collect();
        f.write_str(&quoted.join(" "))
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Compile one editing operation into an engine invocation.
///
/// Every invocation starts with `-y`, declares its inputs before any
/// mode-specific flags and ends with the output path.
pub fn compile(
    spec: &OperationSpec,
    input: &Path,
    output: &Path,
    engine: &Path,
) -> Result<EngineInvocation, CompileError> {
    let mut args: Vec<OsString> = vec!["-y".into()];

    match spec {
        OperationSpec::Trim { start, end } => {
            let (start, end) = match (start, end) {
                (Some(s), Some(e)) if s.as_seconds() <= e.as_seconds() => (s, e),
                _ => return Err(CompileError::MissingRange),
            };
            push_input(&mut args, input);
            push(&mut args, ["-ss", start.as_str(), "-to", end.as_str(), "-c", "copy"]);
        }

        OperationSpec::RotateFlip {
            preset,
            custom_angle,
            flip_h,
            flip_v,
        } => {
            let filters = rotate_flip_filters(*preset, *custom_angle, *flip_h, *flip_v);
            if filters.is_empty() {
                return Err(CompileError::NoOperation);
            }
            let vf = filters.join(",");
            push_input(&mut args, input);
            push(&mut args, ["-vf", &vf, "-c:a", "copy"]);
        }

        OperationSpec::FilterChain {
            reverse,
            ping_pong,
            custom_filter,
        } => {
            let graph = filter_graph(*reverse, *ping_pong, custom_filter.as_deref())?;
            let map = format!("[{GRAPH_OUT}]");
            push_input(&mut args, input);
            push(&mut args, ["-filter_complex", &graph, "-map", &map, "-c:v", "libx264"]);
        }

        OperationSpec::Speed {
            factor,
            adjust_audio,
        } => {
            let pts = 1.0 / factor;
            if !factor.is_finite() || *factor <= 0.0 || !pts.is_finite() {
                return Err(CompileError::InvalidFactor(*factor));
            }
            let vf = format!("setpts={}*PTS", decimal(pts));
            push_input(&mut args, input);
            push(&mut args, ["-vf", &vf]);
            if *adjust_audio {
                let af: Vec<String> = tempo_chain(*factor)?
                    .iter()
                    .map(|s| format!("atempo={}", decimal(*s)))
                    .collect();
                push(&mut args, ["-af", &af.join(",")]);
            } else {
                push(&mut args, ["-c:a", "copy"]);
            }
        }

        OperationSpec::Transcode {
            container,
            video_codec,
            preset,
            crf,
            video_bitrate,
            audio_codec,
            audio_bitrate,
        } => {
            push_input(&mut args, input);
            push(&mut args, ["-c:v", video_codec.as_str()]);
            if !video_codec.is_copy() {
                let crf = crf.to_string();
                push(&mut args, ["-preset", preset, "-crf", &crf]);
            }
            if let Some(rate) = video_bitrate {
                push(&mut args, ["-b:v", rate]);
            }
            push(&mut args, ["-c:a", audio_codec.as_str()]);
            if !audio_codec.is_copy() {
                if let Some(rate) = audio_bitrate {
                    push(&mut args, ["-b:a", rate]);
                }
            }
            push(&mut args, ["-f", container]);
        }

        OperationSpec::Metadata { tags, cover } => {
            push_input(&mut args, input);
            let cover = cover.as_ref().filter(|c| !c.as_os_str().is_empty());
            if let Some(cover) = cover {
                push_input(&mut args, cover);
            }
            // BTreeMap iteration follows TagKey declaration order.
            for (key, value) in tags {
                let value = value.trim();
                if !value.is_empty() {
                    push(&mut args, ["-metadata", &format!("{key}={value}")]);
                }
            }
            if cover.is_some() {
                push(&mut args, ["-map", "0", "-map", "1", "-c", "copy"]);
                push(&mut args, ["-disposition:v:1", "attached_pic"]);
            } else {
                push(&mut args, ["-c", "copy"]);
            }
        }

        OperationSpec::Concat {
            second_input,
            list_file,
        } => {
            if second_input.as_os_str().is_empty() {
                return Err(CompileError::MissingSecondInput);
            }
            let list = list_file.as_ref().ok_or(CompileError::MissingListFile)?;
            push(&mut args, ["-f", "concat", "-safe", "0"]);
            push_input(&mut args, list);
            push(&mut args, ["-c", "copy"]);
        }
    }

    args.push(output.as_os_str().to_owned());
    Ok(EngineInvocation::new(engine, args))
}

/// Split a playback speed into `atempo` stage factors.
///
/// Each stage lies in `[TEMPO_MIN, TEMPO_MAX]` and the product of all stages
/// equals `factor`. Dividing by 0.5 or 2.0 is exact in binary floating point,
/// so no error accumulates along the chain.
pub fn tempo_chain(factor: f64) -> Result<Vec<f64>, CompileError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(CompileError::InvalidFactor(factor));
    }

    let mut stages = Vec::new();
    let mut remaining = factor;

    while remaining < TEMPO_MIN {
        if stages.len() == MAX_TEMPO_STAGES {
            return Err(CompileError::InvalidFactor(factor));
        }
        stages.push(TEMPO_MIN);
        remaining /= TEMPO_MIN;
    }
    while remaining > TEMPO_MAX {
        if stages.len() == MAX_TEMPO_STAGES {
            return Err(CompileError::InvalidFactor(factor));
        }
        stages.push(TEMPO_MAX);
        remaining /= TEMPO_MAX;
    }

    debug_assert!((TEMPO_MIN..=TEMPO_MAX).contains(&remaining));
    stages.push(remaining);
    Ok(stages)
}

fn rotate_flip_filters(
    preset: RotationPreset,
    custom_angle: Option<i32>,
    flip_h: bool,
    flip_v: bool,
) -> Vec<String> {
    let angle = custom_angle
        .filter(|a| *a != 0)
        .unwrap_or_else(|| preset.degrees());

    let mut filters = Vec::new();
    if angle != 0 {
        let rad = format!("{angle}*PI/180");
        filters.push(format!("rotate={rad}:ow=rotw({rad}):oh=roth({rad})"));
    }
    if flip_h {
        filters.push("hflip".to_string());
    }
    if flip_v {
        filters.push("vflip".to_string());
    }
    filters
}

fn filter_graph(
    reverse: bool,
    ping_pong: bool,
    custom: Option<&str>,
) -> Result<String, CompileError> {
    let mut graph = match (reverse, ping_pong) {
        (true, true) => return Err(CompileError::ConflictingFilters),
        (false, false) => return Err(CompileError::NoOperation),
        (true, false) => format!("[0:v]reverse[{GRAPH_OUT}]"),
        (false, true) => format!(
            "[0:v]split=2[forward][tmp];[tmp]reverse[reverse];[forward][reverse]concat=n=2:v=1[{GRAPH_OUT}]"
        ),
    };

    if let Some(fragment) = custom.map(str::trim).filter(|f| !f.is_empty()) {
        graph.push_str(&format!(";[{GRAPH_OUT}]{fragment}[{GRAPH_OUT}]"));
    }
    Ok(graph)
}

fn push<const N: usize>(args: &mut Vec<OsString>, items: [&str; N]) {
    args.extend(items.into_iter().map(OsString::from));
}

fn push_input(args: &mut Vec<OsString>, path: &Path) {
    args.push("-i".into());
    args.push(OsStr::new(path).to_owned());
}

/// Format a float the way ffmpeg expressions expect, always with a decimal
/// point (`2.0`, not `2`).
fn decimal(v: f64) -> String {
    let s = v.to_string();
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
