// URL checks, file-name derivation and save-path helpers

use std::path::{Path, PathBuf};

use url::Url;

/// Hosts handed to yt-dlp instead of the plain HTTP path
const MEDIA_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "fb.watch",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "reddit.com",
    "streamable.com",
];

const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_LEN: usize = 200;

/// http(s) URL with a host
pub fn validate_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map_or(false, |h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Valid URL on a recognized media-hosting domain (subdomains included)
pub fn is_media_url(url: &str) -> bool {
    if !validate_url(url) {
        return false;
    }
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => h.to_lowercase(),
            None => return false,
        },
        Err(_) => return false,
    };

    MEDIA_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Replace characters Windows and Unix reject, trim spaces/dots, bound the length
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');

    if trimmed.chars().count() <= MAX_FILENAME_LEN {
        return if trimmed.is_empty() {
            "untitled".to_string()
        } else {
            trimmed.to_string()
        };
    }

    // Keep the extension when truncating
    let (stem, ext) = match trimmed.rfind('.') {
        Some(idx) if idx > 0 && trimmed.len() - idx <= 10 => (&trimmed[..idx], &trimmed[idx..]),
        _ => (trimmed, ""),
    };
    let keep = MAX_FILENAME_LEN.saturating_sub(ext.chars().count());
    let truncated: String = stem.chars().take(keep).collect();
    let result = format!("{}{}", truncated.trim_end(), ext);

    if result.is_empty() {
        "untitled".to_string()
    } else {
        result
    }
}

/// Output name for yt-dlp: alphanumerics, space, '-' and '_' only
pub fn safe_title(title: &str, max_len: usize) -> String {
    let filtered: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let bounded: String = filtered.trim_end().chars().take(max_len).collect();

    if bounded.trim().is_empty() {
        "video".to_string()
    } else {
        bounded
    }
}

/// Last path segment of the URL, or "downloaded_file"
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .map(|s| sanitize_filename(&s))
        .unwrap_or_else(|| "downloaded_file".to_string())
}

/// Lower-cased extension including the dot (".mp4"), empty when absent
pub fn file_extension_from_url(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        })
        .unwrap_or_default()
}

/// Existing, writable directory
pub fn is_valid_save_path(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}

pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

/// `name.ext`, or `name (n).ext` for the first free n
pub fn available_filename(directory: &Path, filename: &str) -> String {
    if !directory.join(filename).exists() {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=1000 {
        let candidate = format!("{} ({}){}", stem, counter, ext);
        if !directory.join(&candidate).exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}{}", stem, timestamp, ext)
}

/// Downloads folder, else home, else the working directory
pub fn default_download_dir() -> PathBuf {
    if let Some(downloads) = dirs::download_dir() {
        if downloads.is_dir() {
            return downloads;
        }
    }
    if let Some(home) = dirs::home_dir() {
        let downloads = home.join("Downloads");
        if downloads.is_dir() {
            return downloads;
        }
        return home;
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(validate_url("http://example.com"));
        assert!(validate_url("  https://example.com/file.zip  "));

        assert!(!validate_url(""));
        assert!(!validate_url("not_a_url"));
        assert!(!validate_url("ftp://example.com"));
        assert!(!validate_url("https://"));
    }

    #[test]
    fn test_is_media_url() {
        assert!(is_media_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_media_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_media_url("https://www.facebook.com/video.php?v=123"));
        assert!(is_media_url("https://vimeo.com/123456"));
        assert!(is_media_url("https://m.twitch.tv/videos/1"));

        assert!(!is_media_url("https://www.google.com"));
        assert!(!is_media_url("https://example.com"));
        assert!(!is_media_url("https://notyoutube.com.evil.org/x"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename("test<>file"), "test__file");
        assert_eq!(sanitize_filename("normal_file.mp4"), "normal_file.mp4");
        assert_eq!(sanitize_filename("  .hidden. "), "hidden");
        assert_eq!(sanitize_filename("..."), "untitled");
    }

    #[test]
    fn test_sanitize_filename_keeps_extension_when_truncating() {
        let long = format!("{}.mp4", "a".repeat(300));
        let result = sanitize_filename(&long);
        assert_eq!(result.chars().count(), 200);
        assert!(result.ends_with(".mp4"));
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("", 100), "video");
        assert_eq!(safe_title("???", 100), "video");
        assert_eq!(safe_title("My: Clip / Part 2!", 100), "My Clip  Part 2");
        assert_eq!(safe_title("abcdef", 3), "abc");
        assert_eq!(safe_title("under_score-dash", 100), "under_score-dash");
        // Only the end is trimmed, before truncation
        assert_eq!(safe_title("  Intro  ", 100), "  Intro");
        assert_eq!(safe_title("ab cd", 3), "ab ");
        assert_eq!(safe_title("   ", 100), "video");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://example.com/files/report.pdf"), "report.pdf");
        assert_eq!(filename_from_url("https://example.com/"), "downloaded_file");
        assert_eq!(filename_from_url("garbage"), "downloaded_file");
    }

    #[test]
    fn test_file_extension_from_url() {
        assert_eq!(file_extension_from_url("https://example.com/a/B.MP4?x=1"), ".mp4");
        assert_eq!(file_extension_from_url("https://example.com/a/b"), "");
    }

    #[test]
    fn test_is_valid_save_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_valid_save_path(dir.path()));
        assert!(!is_valid_save_path(Path::new("")));
        assert!(!is_valid_save_path(Path::new("/non/existent/path")));

        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(!is_valid_save_path(&file));
    }

    #[test]
    fn test_ensure_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_directory(&nested).unwrap();
        assert!(is_valid_save_path(&nested));
        // Existing directories are fine
        ensure_directory(&nested).unwrap();

        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_directory(&file.join("sub")).is_err());
    }

    #[test]
    fn test_available_filename() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(available_filename(dir.path(), "clip.mp4"), "clip.mp4");

        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        assert_eq!(available_filename(dir.path(), "clip.mp4"), "clip (1).mp4");

        std::fs::write(dir.path().join("clip (1).mp4"), b"x").unwrap();
        assert_eq!(available_filename(dir.path(), "clip.mp4"), "clip (2).mp4");
    }

    #[test]
    fn test_default_download_dir_is_not_empty() {
        assert!(!default_download_dir().as_os_str().is_empty());
    }
}
