//! Object key derivation between pipeline stages.
//!
//! Keys are `/`-separated. A frame keeps its video's key with a new
//! extension, and a result keeps its frame's key with `.txt`, so every
//! artifact can be located from the original upload without coordination.

pub const RESULT_EXTENSION: &str = "txt";

/// Final `/`-separated component of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Key without the extension of its final component.
///
/// Leading dots do not start an extension (`.hidden` stays `.hidden`).
pub fn base_name(key: &str) -> &str {
    let name_start = key.len() - file_name(key).len();
    match key[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &key[..name_start + dot],
        _ => key,
    }
}

/// Intermediate frame key for a video key, e.g. `clips/a.mp4` → `clips/a.jpg`.
pub fn frame_key(video_key: &str, extension: &str) -> String {
    format!("{}.{}", base_name(video_key), extension)
}

/// Final result key for a frame key, e.g. `clips/a.jpg` → `clips/a.txt`.
pub fn result_key(frame_key: &str) -> String {
    format!("{}.{RESULT_EXTENSION}", base_name(frame_key))
}
