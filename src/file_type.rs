//! Extension → compress-flag lookup table (spec §6).
//!
//! Pure data: given a file's extension, decide whether its payload should be
//! zlib-compressed (`zipped = true`) or stream-XOR obfuscated in place
//! (`zipped = false`) when packed.

/// Extensions whose payload is stored obfuscated instead of compressed.
const NON_COMPRESSING: &[&str] = &["png", "jpg", "jpeg", "kma", "ogg", "wav"];

/// The full set of extensions the reference format recognizes. Round-tripped
/// losslessly regardless of membership here; membership only selects the
/// compress flag. Extensions outside this set still compress (the default).
const RECOGNIZED: &[&str] = &[
    "kmd", "kmda", "ksp", "txt", "htm", "html", "nut", "ptc", "scm", "mat", "kgi", "dds", "png",
    "jpg", "jpeg", "pvr", "aif", "aiff", "kma", "ogg", "wav", "fx", "mot", "mxt", "pt2",
];

/// Returns whether a file with the given extension should be zlib-compressed
/// when packed. The extension is matched case-insensitively and without a
/// leading dot. Unknown extensions compress by default.
#[must_use]
pub fn needs_compress(extension: &str) -> bool {
    let extension = extension.trim_start_matches('.');
    !NON_COMPRESSING
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
}

/// Returns whether the extension is part of the reference format's
/// recognized set. Not required for round-tripping; exposed for parity with
/// the reference `FileType` enum.
#[must_use]
pub fn is_recognized(extension: &str) -> bool {
    let extension = extension.trim_start_matches('.');
    RECOGNIZED
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
}

/// Extracts the extension (without the dot) from a file name, lowercased.
/// Returns an empty string for extensionless names.
#[must_use]
pub fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_and_media_extensions_do_not_compress() {
        for ext in ["png", "jpg", "jpeg", "kma", "ogg", "wav", "PNG", "Wav"] {
            assert!(!needs_compress(ext), "{ext} should not compress");
        }
    }

    #[test]
    fn recognized_text_and_binary_extensions_compress() {
        for ext in ["txt", "kmd", "ksp", "dds", "scm"] {
            assert!(needs_compress(ext), "{ext} should compress");
        }
    }

    #[test]
    fn unknown_extensions_default_to_compress() {
        assert!(needs_compress("xyz"));
        assert!(needs_compress(""));
    }

    #[test]
    fn extension_of_handles_dotfiles_and_plain_names() {
        assert_eq!(extension_of("hello.txt"), "txt");
        assert_eq!(extension_of("Archive.TAR"), "tar");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".gitignore"), "gitignore");
    }
}
