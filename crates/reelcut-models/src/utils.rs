//! Filename helpers shared by ingestion, derivation and packaging.

/// Fallback base name when a caller-provided name sanitizes to nothing.
pub const DEFAULT_OUTPUT_NAME: &str = "reelcut";

/// Sanitize a title for use in filenames.
///
/// Only allows ASCII alphanumeric, hyphen, underscore, and space. Whitespace
/// runs collapse to a single underscore and the result is lowercased and
/// capped at 50 characters.
pub fn sanitize_filename_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .take(50)
        .collect()
}

/// Base name for every artifact of a job, never empty.
pub fn output_base_name(requested: &str) -> String {
    let name = sanitize_filename_title(requested);
    if name.is_empty() {
        DEFAULT_OUTPUT_NAME.to_string()
    } else {
        name
    }
}

/// Reduce an untrusted identifier to a single safe path component.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`, and refuses anything that
/// would resolve to the current or parent directory. Returns `None` when
/// nothing usable is left.
pub fn sanitize_path_component(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(128)
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

/// Lowercased extension of an uploaded filename, defaulting to `mp4`.
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_filename_title("Hello World!"), "hello_world");
        assert_eq!(sanitize_filename_title("Test@#$%123"), "test123");
        assert_eq!(sanitize_filename_title("Café résumé"), "caf_rsum");
    }

    #[test]
    fn test_output_base_name_fallback() {
        assert_eq!(output_base_name("!!!"), DEFAULT_OUTPUT_NAME);
        assert_eq!(output_base_name("Beach Day"), "beach_day");
    }

    #[test]
    fn test_sanitize_path_component() {
        assert_eq!(sanitize_path_component("abc-123_x"), Some("abc-123_x".into()));
        assert_eq!(sanitize_path_component("../../etc/passwd"), Some("....etcpasswd".into()));
        assert_eq!(sanitize_path_component(".."), None);
        assert_eq!(sanitize_path_component("  "), None);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Movie.MOV"), "mov");
        assert_eq!(file_extension("noext"), "mp4");
    }
}
