//! Content hashing for conflict detection

/// Compute the BLAKE3 hash of file content, hex-encoded.
pub fn compute_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_empty() {
        assert_eq!(
            compute_hash(b""),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_compute_hash_distinguishes_content() {
        let a = compute_hash(br#"[{"from":"w1","text":"a","timestamp":"t","read":false}]"#);
        let b = compute_hash(br#"[{"from":"w1","text":"a","timestamp":"t","read":true}]"#);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, compute_hash(br#"[{"from":"w1","text":"a","timestamp":"t","read":false}]"#));
    }
}
