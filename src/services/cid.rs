//! Channel identifier generation (spec.md §3.1).
use rand::Rng;

const CID_CHARS: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Draws a random `len`-character string from `[0-9A-Za-z]`, mirroring the
/// original `generate_cid`.
pub fn generate_cid(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CID_CHARS[rng.gen_range(0..CID_CHARS.len())] as char)
        .collect()
}

/// True if `s` is non-empty and drawn entirely from the cid alphabet.
/// Used by the router to recognize `/{cid}` without a regex engine.
pub fn is_valid_cid_shape(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_length() {
        let cid = generate_cid(4);
        assert_eq!(cid.len(), 4);
        assert!(is_valid_cid_shape(&cid));
    }

    #[test]
    fn rejects_non_alphanumeric_shapes() {
        assert!(!is_valid_cid_shape(""));
        assert!(!is_valid_cid_shape("new_channel"));
        assert!(!is_valid_cid_shape("abc/def"));
        assert!(is_valid_cid_shape("AbC1"));
    }
}
