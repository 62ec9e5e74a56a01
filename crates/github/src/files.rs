use std::{ffi::OsStr, path::Path};

/// Extensions analyzed even when MIME guessing has no opinion.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "java", "go", "cpp", "c", "cs", "rb", "php", "html", "css", "ts", "rs", "kt",
    "swift", "json", "xml", "yml", "yaml",
];

/// Whether a changed file is eligible for analysis: any text-based
/// MIME type, or an extension from the allow-list. Everything else
/// (binaries, images, unknown lockfiles) is skipped by the collector.
pub fn is_code_file(filename: &str) -> bool {
    if let Some(mime) = mime_guess::from_path(filename).first() {
        let text_based = mime.type_() == mime::TEXT
            || (mime.type_() == mime::APPLICATION
                && (mime.subtype() == mime::JSON || mime.subtype() == mime::XML));
        if text_based {
            return true;
        }
    }
    Path::new(filename)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
