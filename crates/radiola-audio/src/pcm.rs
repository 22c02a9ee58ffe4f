/// Turns an arbitrary-sized stream of s16le bytes into samples.
///
/// Pipe reads do not respect sample boundaries, so a trailing odd byte is kept
/// and joined with the first byte of the next chunk.
#[derive(Debug, Default)]
pub struct S16LeAssembler {
    carry: Option<u8>,
}

impl S16LeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes` and appends the complete samples to `out`.
    pub fn push_bytes(&mut self, mut bytes: &[u8], out: &mut Vec<i16>) {
        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    out.push(i16::from_le_bytes([low, high]));
                    bytes = rest;
                }
                None => {
                    self.carry = Some(low);
                    return;
                }
            }
        }

        let mut chunks = bytes.chunks_exact(2);
        out.extend(chunks.by_ref().map(|pair| i16::from_le_bytes([pair[0], pair[1]])));
        if let [last] = chunks.remainder() {
            self.carry = Some(*last);
        }
    }

    /// Whether half a sample is waiting for its second byte.
    pub fn has_pending_byte(&self) -> bool {
        self.carry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pairs() {
        let mut assembler = S16LeAssembler::new();
        let mut out = Vec::new();
        assembler.push_bytes(&[0x01, 0x00, 0xff, 0x7f, 0x00, 0x80], &mut out);
        assert_eq!(out, vec![1, i16::MAX, i16::MIN]);
        assert!(!assembler.has_pending_byte());
    }

    #[test]
    fn joins_samples_split_across_reads() {
        let mut assembler = S16LeAssembler::new();
        let mut out = Vec::new();
        assembler.push_bytes(&[0x34, 0x12, 0x78], &mut out);
        assert_eq!(out, vec![0x1234]);
        assert!(assembler.has_pending_byte());

        assembler.push_bytes(&[], &mut out);
        assert!(assembler.has_pending_byte());

        assembler.push_bytes(&[0x56, 0xcd, 0xab], &mut out);
        assert_eq!(out, vec![0x1234, 0x5678, 0xabcd_u16 as i16]);
        assert!(!assembler.has_pending_byte());
    }

    #[test]
    fn single_bytes_still_produce_samples() {
        let mut assembler = S16LeAssembler::new();
        let mut out = Vec::new();
        for byte in [0x02, 0x00, 0x03, 0x00] {
            assembler.push_bytes(&[byte], &mut out);
        }
        assert_eq!(out, vec![2, 3]);
    }
}
