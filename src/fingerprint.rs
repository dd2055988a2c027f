// Content-addressed artifact naming
//
// The artifact filename stem is the MD5 of the video title, exactly as
// observed - no trimming or case folding. Feed synthesis re-derives the
// same digest to match files back to metadata, so any normalization here
// would silently break that matching.

/// Map a video title to its artifact filename stem: 32 lowercase hex chars.
pub fn fingerprint(title: &str) -> String {
    format!("{:x}", md5::compute(title.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(fingerprint("hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_stable_across_calls() {
        let title = "Выпуск №42: что происходит";
        assert_eq!(fingerprint(title), fingerprint(title));
    }

    #[test]
    fn test_shape() {
        let fp = fingerprint("any title at all");
        assert_eq!(fp.len(), 32);
        assert!(fp.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(fp, fp.to_lowercase());
    }

    #[test]
    fn test_no_normalization() {
        // Whitespace and case are significant on purpose
        assert_ne!(fingerprint("Title"), fingerprint("title"));
        assert_ne!(fingerprint("Title"), fingerprint("Title "));
    }
}
