// FormatSelector - turns yt-dlp's format listing into ranked quality options
//
// Three option families:
// - combined streams (video + audio in one file)
// - video-only streams paired with the single best audio-only stream
// - audio-only streams
//
// Each family dedupes in its own key space, so a combined and a paired
// option at the same height can both appear.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::formatting::mib;
use super::models::{FormatDescriptor, QualityCategory, QualityOption};

/// Fallback choices offered when no ranked option exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Best,
    Medium,
    Worst,
    Audio,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 4] = [Self::Best, Self::Medium, Self::Worst, Self::Audio];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Best => "Best available quality",
            Self::Medium => "Medium quality",
            Self::Worst => "Low quality",
            Self::Audio => "Audio only",
        }
    }

    /// yt-dlp selector token; yt-dlp has no "medium", so it shares `worst`
    pub fn selector(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Medium | Self::Worst => "worst",
            Self::Audio => "bestaudio",
        }
    }
}

/// Format selector with deduplication and ranking
pub struct FormatSelector;

impl FormatSelector {
    /// Build the ranked option list. Never fails; empty input gives empty output.
    pub fn build_quality_options(formats: &[FormatDescriptor]) -> Vec<QualityOption> {
        let usable: Vec<&FormatDescriptor> = formats
            .iter()
            .filter(|f| f.has_source_url() && f.effective_size() > 0)
            .collect();

        let mut options = Vec::new();
        let mut seen: HashSet<(QualityCategory, String)> = HashSet::new();

        // 1. Combined (video + audio)
        for fmt in usable.iter().filter(|f| f.has_video() && f.has_audio()) {
            let ext = fmt.ext_or("mp4");
            let key = (QualityCategory::Combined, format!("{}_{}", fmt.height_or_zero(), ext));
            if seen.insert(key) {
                options.push(Self::combined_option(fmt));
            }
        }

        // 2. Video-only + best audio
        let mut video_only: Vec<&FormatDescriptor> = usable
            .iter()
            .copied()
            .filter(|f| f.has_video() && !f.has_audio())
            .collect();
        video_only.sort_by(|a, b| b.height_or_zero().cmp(&a.height_or_zero()));

        let mut audio_only: Vec<&FormatDescriptor> = usable
            .iter()
            .copied()
            .filter(|f| f.has_audio() && !f.has_video())
            .collect();
        audio_only.sort_by(|a, b| {
            b.bitrate_or_zero()
                .partial_cmp(&a.bitrate_or_zero())
                .unwrap_or(Ordering::Equal)
        });

        if let Some(best_audio) = audio_only.first() {
            for fmt in &video_only {
                let ext = fmt.ext_or("mp4");
                let key = (
                    QualityCategory::SeparatePair,
                    format!("{}_{}", fmt.height_or_zero(), ext),
                );
                if seen.insert(key) {
                    options.push(Self::paired_option(fmt, best_audio));
                }
            }
        }

        // 3. Audio only
        for fmt in &audio_only {
            let ext = fmt.ext_or("mp3");
            let key = (
                QualityCategory::AudioOnly,
                format!("{}_{}", ext, fmt.bitrate_or_zero()),
            );
            if seen.insert(key) {
                options.push(Self::audio_option(fmt));
            }
        }

        // Final order: height, then size, both descending
        options.sort_by(|a, b| {
            b.height
                .cmp(&a.height)
                .then_with(|| b.filesize.cmp(&a.filesize))
        });

        options
    }

    /// Presets for when `build_quality_options` comes back empty
    pub fn fallback_options() -> Vec<QualityOption> {
        QualityPreset::ALL
            .iter()
            .map(|preset| QualityOption {
                label: preset.label().to_string(),
                height: 0,
                ext: String::new(),
                filesize: 0,
                category: if *preset == QualityPreset::Audio {
                    QualityCategory::AudioOnly
                } else {
                    QualityCategory::Combined
                },
                selector: preset.selector().to_string(),
            })
            .collect()
    }

    fn combined_option(fmt: &FormatDescriptor) -> QualityOption {
        let height = fmt.height_or_zero();
        let ext = fmt.ext_or("mp4").to_string();
        let size = fmt.effective_size();

        let mut label = format!("{}p", height);
        if let Some(width) = fmt.width {
            label.push_str(&format!(" ({}x{})", width, height));
        }
        label.push_str(&format!(" - {}", mib(size)));
        label.push_str(&format!(" [{}]", ext));

        QualityOption {
            label,
            height,
            ext,
            filesize: size,
            category: QualityCategory::Combined,
            selector: fmt.format_id.clone(),
        }
    }

    fn paired_option(video: &FormatDescriptor, audio: &FormatDescriptor) -> QualityOption {
        let height = video.height_or_zero();
        let ext = video.ext_or("mp4").to_string();
        let size = video.effective_size() + audio.effective_size();

        let mut label = format!("{}p (video + audio)", height);
        if let Some(width) = video.width {
            label.push_str(&format!(" ({}x{})", width, height));
        }
        label.push_str(&format!(" [{} + {}]", ext, audio.ext_or("mp3")));
        label.push_str(&format!(" - {}", mib(size)));

        QualityOption {
            label,
            height,
            ext,
            filesize: size,
            category: QualityCategory::SeparatePair,
            selector: format!("{}+{}", video.format_id, audio.format_id),
        }
    }

    fn audio_option(fmt: &FormatDescriptor) -> QualityOption {
        let ext = fmt.ext_or("mp3").to_string();
        let size = fmt.effective_size();

        let mut label = "Audio only".to_string();
        if fmt.bitrate_or_zero() > 0.0 {
            label.push_str(&format!(" ({:.0}kbps)", fmt.bitrate_or_zero()));
        }
        label.push_str(&format!(" - {}", mib(size)));
        label.push_str(&format!(" [{}]", ext));

        QualityOption {
            label,
            height: 0,
            ext,
            filesize: size,
            category: QualityCategory::AudioOnly,
            selector: fmt.format_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_combined(id: &str, height: u32, size: u64) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            ext: Some("mp4".to_string()),
            width: Some(height * 16 / 9),
            height: Some(height),
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            filesize: Some(size),
            filesize_approx: None,
            abr: None,
            url: Some(format!("https://cdn.example/{}", id)),
        }
    }

    fn make_video(id: &str, height: u32, size: u64) -> FormatDescriptor {
        FormatDescriptor {
            acodec: Some("none".to_string()),
            ..make_combined(id, height, size)
        }
    }

    fn make_audio(id: &str, ext: &str, bitrate: f64, size: u64) -> FormatDescriptor {
        FormatDescriptor {
            format_id: id.to_string(),
            ext: Some(ext.to_string()),
            width: None,
            height: None,
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            filesize: None,
            filesize_approx: Some(size),
            abr: Some(bitrate),
            url: Some(format!("https://cdn.example/{}", id)),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(FormatSelector::build_quality_options(&[]).is_empty());
    }

    #[test]
    fn test_combined_sorted_by_height() {
        let formats = vec![
            make_combined("22", 720, 50_000_000),
            make_combined("37", 1080, 100_000_000),
        ];

        let options = FormatSelector::build_quality_options(&formats);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].height, 1080);
        assert_eq!(options[0].selector, "37");
        assert_eq!(options[1].height, 720);
        assert!(options.iter().all(|o| o.category == QualityCategory::Combined));
    }

    #[test]
    fn test_unsized_without_url_is_excluded() {
        let mut orphan = make_combined("99", 2160, 0);
        orphan.filesize = None;
        orphan.url = None;

        let options =
            FormatSelector::build_quality_options(&[orphan, make_combined("22", 720, 1_000)]);

        assert_eq!(options.len(), 1);
        assert_eq!(options[0].selector, "22");
    }

    #[test]
    fn test_every_video_pairs_with_best_audio() {
        let formats = vec![
            make_video("137", 1080, 80_000_000),
            make_video("136", 720, 40_000_000),
            make_audio("139", "m4a", 48.0, 1_000_000),
            make_audio("140", "m4a", 128.0, 3_000_000),
        ];

        let options = FormatSelector::build_quality_options(&formats);
        let pairs: Vec<&QualityOption> = options
            .iter()
            .filter(|o| o.category == QualityCategory::SeparatePair)
            .collect();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].selector, "137+140");
        assert_eq!(pairs[0].filesize, 83_000_000);
        assert_eq!(pairs[1].selector, "136+140");
        assert!(pairs[0].label.contains("[mp4 + m4a]"));
    }

    #[test]
    fn test_combined_and_pair_coexist_at_same_height() {
        let formats = vec![
            make_combined("22", 720, 50_000_000),
            make_video("136", 720, 40_000_000),
            make_audio("140", "m4a", 128.0, 3_000_000),
        ];

        let options = FormatSelector::build_quality_options(&formats);

        assert_eq!(options.len(), 3);
        assert_eq!(options[0].category, QualityCategory::Combined);
        assert_eq!(options[1].category, QualityCategory::SeparatePair);
        assert_eq!(options[2].category, QualityCategory::AudioOnly);
    }

    #[test]
    fn test_no_duplicate_keys_within_category() {
        let formats = vec![
            make_combined("18", 360, 10_000_000),
            make_combined("18b", 360, 12_000_000),
            make_video("134", 360, 5_000_000),
            make_video("134b", 360, 6_000_000),
            make_audio("140", "m4a", 128.0, 3_000_000),
            make_audio("140b", "m4a", 128.0, 3_100_000),
            make_audio("251", "webm", 160.0, 3_500_000),
        ];

        let options = FormatSelector::build_quality_options(&formats);

        let mut keys = HashSet::new();
        for option in &options {
            let key = (option.category, option.height, option.ext.clone(), option.selector.clone());
            assert!(keys.insert(key));
        }
        let combined = options.iter().filter(|o| o.category == QualityCategory::Combined).count();
        let pairs = options.iter().filter(|o| o.category == QualityCategory::SeparatePair).count();
        let audio = options.iter().filter(|o| o.category == QualityCategory::AudioOnly).count();
        assert_eq!((combined, pairs, audio), (1, 1, 2));
        // First occurrence wins
        assert!(options.iter().any(|o| o.selector == "18"));
        assert!(!options.iter().any(|o| o.selector == "18b"));
    }

    #[test]
    fn test_audio_only_sorts_last_and_without_video_pairs() {
        let formats = vec![
            make_audio("140", "m4a", 128.0, 3_000_000),
            make_audio("251", "webm", 160.0, 4_000_000),
        ];

        let options = FormatSelector::build_quality_options(&formats);

        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|o| o.height == 0));
        // Same height, larger first
        assert_eq!(options[0].selector, "251");
        assert!(options[0].label.starts_with("Audio only (160kbps)"));
    }

    #[test]
    fn test_fallback_presets() {
        let options = FormatSelector::fallback_options();
        let selectors: Vec<&str> = options.iter().map(|o| o.selector.as_str()).collect();
        assert_eq!(selectors, vec!["best", "worst", "worst", "bestaudio"]);
        assert_eq!(options[3].category, QualityCategory::AudioOnly);
    }
}
