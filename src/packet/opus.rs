use super::PacketError;

/// Playout duration of an Opus packet, in 48 kHz clock samples.
///
/// Only the TOC byte is inspected, plus the frame count byte for code 3
/// packets. `offset`/`len` delimit the Opus payload inside `data`; a zero
/// `len`, an out-of-bounds range, or a code 3 packet missing its frame count
/// byte fail the call and the packet should be discarded.
pub fn opus_duration(data: &[u8], offset: usize, len: usize) -> Result<u32, PacketError> {
    let in_bounds = offset
        .checked_add(len)
        .is_some_and(|end| end <= data.len());
    if len == 0 || !in_bounds {
        return Err(PacketError::ErrShortPacket);
    }

    let toc = data[offset];

    let config = toc >> 3;
    let code = toc & 0b11;

    let frame_duration: u32 = match config {
        // CELT NB, WB, SWB, FB 2.5 ms
        16 | 20 | 24 | 28 => 120,
        // CELT NB, WB, SWB, FB 5 ms
        17 | 21 | 25 | 29 => 240,
        // SILK NB, MB, WB; Hybrid SWB, FB; CELT NB, WB, SWB, FB 10 ms
        0 | 4 | 8 | 12 | 14 | 18 | 22 | 26 | 30 => 480,
        // SILK NB, MB, WB; Hybrid SWB, FB; CELT NB, WB, SWB, FB 20 ms
        1 | 5 | 9 | 13 | 15 | 19 | 23 | 27 | 31 => 960,
        // SILK NB, MB, WB 40 ms
        2 | 6 | 10 => 1920,
        // SILK NB, MB, WB 60 ms
        3 | 7 | 11 => 2880,
        // config is a 5 bit field, 0..=31 is exhaustive above
        _ => unreachable!("opus config out of range: {config}"),
    };

    let num_frames: u32 = match code {
        0 => 1,
        1 | 2 => 2,
        3 => {
            if len < 2 {
                return Err(PacketError::ErrShortPacket);
            }
            (data[offset + 1] & 0x3f) as u32
        }
        // code is a 2 bit field
        _ => unreachable!("opus code out of range: {code}"),
    };

    Ok(frame_duration * num_frames)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opus_duration() {
        // TOC/frame-count prefixes from the RFC 8251 Opus test vectors.
        let cases: &[(&str, &[u8], u32)] = &[
            // config 31 (CELT FB 20 ms), code 3, 3 frames
            ("3x CELT FB 20 ms", &[0xff, 0x83, 0xfe], 2880),
            // config 31, code 3, 5 frames
            ("5x CELT FB 20 ms", &[0xff, 0x85, 0xbf], 4800),
            // config 31, code 3, 1 frame
            ("1x CELT FB 20 ms", &[0xff, 0x41, 0xff], 960),
            // config 31, code 1, 2 frames
            ("2x CELT FB 20 ms", &[0xfd, 0x61, 0xd6], 1920),
            // config 0 (SILK NB 10 ms), code 0
            ("1x SILK NB 10 ms", &[0x00], 480),
            // config 1 (SILK NB 20 ms), code 0
            ("1x SILK NB 20 ms", &[0x08], 960),
            // config 3 (SILK NB 60 ms), code 0
            ("1x SILK NB 60 ms", &[0x18], 2880),
            // config 16 (CELT NB 2.5 ms), code 2, 2 frames
            ("2x CELT NB 2.5 ms", &[0x82, 0x01, 0x01], 240),
            // config 14 (Hybrid SWB 10 ms), code 0
            ("1x Hybrid SWB 10 ms", &[0x70], 480),
        ];

        for (name, data, expected) in cases {
            let d = opus_duration(data, 0, data.len());
            assert_eq!(d, Ok(*expected), "{name}");
        }
    }

    #[test]
    fn test_opus_duration_offset() {
        let data = &[0xaa, 0xbb, 0xff, 0x83];
        assert_eq!(opus_duration(data, 2, 2), Ok(2880));
    }

    #[test]
    fn test_all_configs_mapped() {
        // Every 5 bit config value decodes without panicking.
        for config in 0..32u8 {
            let toc = config << 3;
            assert!(opus_duration(&[toc], 0, 1).unwrap() > 0);
        }
    }

    #[test]
    fn test_bad_arguments() {
        let data = &[0xff, 0x83];

        // Zero length.
        assert_eq!(opus_duration(data, 0, 0), Err(PacketError::ErrShortPacket));

        // Range past the end of the buffer.
        assert_eq!(opus_duration(data, 1, 2), Err(PacketError::ErrShortPacket));
        assert_eq!(
            opus_duration(data, usize::MAX, 2),
            Err(PacketError::ErrShortPacket)
        );

        // Code 3 packet with the frame count byte outside `len`.
        assert_eq!(opus_duration(data, 0, 1), Err(PacketError::ErrShortPacket));
    }
}
