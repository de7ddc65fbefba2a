//! Deterministic content generators for archive tests.

/// Lines of pseudo-random text, reproducible from `seed`.
///
/// Each line ends in `\n`. A simple LCG keeps the output stable across runs
/// without pulling in a random number generator.
pub fn text_lines(seed: u64, count: usize) -> Vec<String> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..count)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            format!("{},{:.6}\n", i, (state >> 11) as f64 / (1u64 << 53) as f64)
        })
        .collect()
}

/// Incompressible-ish bytes of the given length, reproducible from `seed`.
///
/// Used to push archives past a spill threshold: deflate cannot shrink this
/// data much, so the archive grows roughly one byte per input byte.
pub fn noise_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        // xorshift64*
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let word = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
        for b in word.to_le_bytes() {
            if out.len() == len {
                break;
            }
            out.push(b);
        }
    }
    out
}

/// Split `data` into chunks of at most `size` bytes, as a producer would
/// yield them.
pub fn chunked(data: &[u8], size: usize) -> Vec<Vec<u8>> {
    data.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lines_are_deterministic() {
        assert_eq!(text_lines(7, 10), text_lines(7, 10));
        assert_ne!(text_lines(7, 10), text_lines(8, 10));
        assert!(text_lines(1, 3).iter().all(|l| l.ends_with('\n')));
    }

    #[test]
    fn test_noise_bytes_length() {
        assert_eq!(noise_bytes(1, 0).len(), 0);
        assert_eq!(noise_bytes(1, 13).len(), 13);
        assert_eq!(noise_bytes(3, 4096), noise_bytes(3, 4096));
    }

    #[test]
    fn test_chunked_reassembles() {
        let data = noise_bytes(5, 1000);
        let chunks = chunked(&data, 300);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), data);
    }
}
