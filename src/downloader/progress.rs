// yt-dlp progress line parsing
//
// Lines come from `--newline` output, e.g.
//   [download]  45.2% of 10.00MiB at 1.20MiB/s ETA 00:05
//   [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
//   [download] Destination: /tmp/Clip.f137.mp4
//   [Merger] Merging formats into "/tmp/Clip.mp4"

use regex::Regex;

use super::models::DownloadProgress;

const PROGRESS_MARKER: &str = "[download]";

lazy_static::lazy_static! {
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
}

/// Something worth reporting in one output line
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Percentage line, with speed and ETA tokens when present
    Progress {
        percent: f32,
        speed: Option<String>,
        eta: Option<String>,
    },
    /// A new output file was opened
    Destination(String),
    Merging,
    AlreadyDownloaded,
}

impl ProgressEvent {
    /// Percentage to report, if this event carries one
    pub fn percent(&self) -> Option<f32> {
        match self {
            Self::Progress { percent, .. } => Some(*percent),
            Self::AlreadyDownloaded => Some(100.0),
            Self::Destination(_) | Self::Merging => None,
        }
    }

    /// Status line for the front end
    pub fn status_text(&self) -> String {
        match self {
            Self::Progress { percent, speed, eta } => {
                let mut parts = Vec::new();
                if let Some(speed) = speed {
                    parts.push(format!("Speed: {}", speed));
                }
                if let Some(eta) = eta {
                    parts.push(format!("ETA: {}", eta));
                }

                let mut text = format!("{:.1}%", percent);
                if !parts.is_empty() {
                    text.push_str(" - ");
                    text.push_str(&parts.join(" | "));
                }
                text
            }
            Self::Destination(name) => format!("Starting: {}", name),
            Self::Merging => "Merging video and audio...".to_string(),
            Self::AlreadyDownloaded => "File already downloaded".to_string(),
        }
    }

    pub fn to_progress(&self) -> Option<DownloadProgress> {
        self.percent().map(|percent| DownloadProgress {
            percent,
            status: self.status_text(),
        })
    }
}

/// Parse one output line. Unrecognized and malformed lines give `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.contains(PROGRESS_MARKER) && line.contains('%') {
        if let Some(event) = parse_percent_line(line) {
            return Some(event);
        }
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        // Just the file name, not the full path
        let short_name: String = path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(path)
            .chars()
            .take(50)
            .collect();
        return Some(ProgressEvent::Destination(short_name));
    }

    if MERGE_RE.is_match(line) {
        return Some(ProgressEvent::Merging);
    }

    if line.contains(PROGRESS_MARKER) && ALREADY_RE.is_match(line) {
        return Some(ProgressEvent::AlreadyDownloaded);
    }

    None
}

fn parse_percent_line(line: &str) -> Option<ProgressEvent> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let percent_token = parts.iter().find(|p| p.contains('%'))?;
    let percent: f32 = percent_token.replace('%', "").parse().ok()?;
    if !percent.is_finite() {
        return None;
    }

    let mut speed = None;
    let mut eta = None;
    for (i, part) in parts.iter().enumerate() {
        if speed.is_none() && part.ends_with("B/s") && part.len() > "B/s".len() {
            speed = Some(part.to_string());
        } else if eta.is_none() && *part == "ETA" {
            eta = parts.get(i + 1).map(|s| s.to_string());
        }
    }

    Some(ProgressEvent::Progress {
        percent: percent.clamp(0.0, 100.0),
        speed,
        eta,
    })
}
