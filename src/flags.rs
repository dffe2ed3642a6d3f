use once_cell::sync::Lazy;
use std::collections::HashMap;

// Header words that recur across shipping archives and repacked files.
// The format carries several opaque fields; annotating the recurring
// values makes the info output comparable between samples.
static KNOWN_WORDS: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Version words
    map.insert(0x8000_0001, "version word of single-chunk samples");
    map.insert(0x8000_000C, "version word of multi-chunk samples");

    // Flag words
    map.insert(0x8000_0012, "LZO-compressed payload");
    map.insert(0x8000_0080, "auxiliary flags, constant across samples");

    // Checksum placeholders written by repacking tools
    map.insert(0xCB3E_47E2, "checksum placeholder");
    map.insert(0xA309_C008, "checksum placeholder");

    map
});

/// Annotation for a header word, if it is one of the recurring values.
pub fn describe(word: u32) -> Option<&'static str> {
    KNOWN_WORDS.get(&word).copied()
}

/// Hex rendering with the annotation attached when one exists.
pub fn format_word(word: u32) -> String {
    match describe(word) {
        Some(desc) => format!("{:#010x} ({})", word, desc),
        None => format!("{:#010x}", word),
    }
}

/// flags1 carries the chunk count under the compression bit; render
/// both even when the exact word is not in the registry.
pub fn format_flags1(word: u32) -> String {
    let compressed = if word & 0x8000_0000 != 0 {
        "compressed"
    } else {
        "stored"
    };
    format!(
        "{:#010x} ({}, {} chunks)",
        word,
        compressed,
        word & 0x7FFF_FFFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_words_are_annotated() {
        assert_eq!(describe(0x8000_0012), Some("LZO-compressed payload"));
        assert!(describe(0xDEAD_BEEF).is_none());
    }

    #[test]
    fn format_word_appends_the_annotation() {
        assert_eq!(
            format_word(0x8000_0012),
            "0x80000012 (LZO-compressed payload)"
        );
        assert_eq!(format_word(0x1234), "0x00001234");
    }

    #[test]
    fn flags1_rendering_decodes_count_and_compression() {
        assert_eq!(
            format_flags1(0x8000_0003),
            "0x80000003 (compressed, 3 chunks)"
        );
        assert_eq!(format_flags1(0x0000_0002), "0x00000002 (stored, 2 chunks)");
    }
}
