//! Frame recognition and validation over a raw receiver buffer.
//!
//! [classify] looks at a single buffer position and decides whether a frame
//! begins there, and if so computes its full extent and validates it. It never
//! consumes bytes itself; the scan loop in [`crate::scan`] owns the position.

use tracing::trace;

use crate::checksum::checksum;

/// First byte of every block, sentence, and command reply.
pub const SYNC: u8 = b'$';
/// Second sync byte of a binary block.
pub const BLOCK_SYNC: u8 = b'@';
/// Second sync byte of a standard talker sentence.
pub const SENTENCE_STANDARD: u8 = b'G';
/// Second sync byte of a proprietary sentence.
pub const SENTENCE_PROPRIETARY: u8 = b'P';
/// Second sync byte of a command reply.
pub const REPLY_SYNC: u8 = b'R';
/// Third reply byte marking an error reply rather than a normal echo.
pub const REPLY_ERROR: u8 = b'?';
/// Prefix of the connection banner sent once after a fresh transport
/// connection.
pub const BANNER_PREFIX: [u8; 2] = *b"IP";
/// Terminator of the connection banner.
pub const BANNER_END: u8 = b'>';

const CRLF: [u8; 2] = [0x0d, 0x0a];

/// Binary block header: sync (2) + id (2) + length (2).
pub const BLOCK_HEADER_LEN: usize = 6;
/// Minimum binary block length: header plus trailing checksum.
pub const BLOCK_MIN_LEN: usize = 8;
/// Largest block the receiver emits. A declared length beyond this is a
/// corrupted header, not a frame worth waiting for.
pub const BLOCK_MAX_LEN: usize = 4096;
/// Low 13 bits of the id field are the block number, the high 3 a revision.
pub const BLOCK_NUMBER_MASK: u16 = 0x1fff;

/// Longest sentence or reply line probed for a terminator before giving up
/// on the position.
pub const MAX_LINE_LEN: usize = 128;
/// Longest banner probed for its terminator.
pub const MAX_BANNER_LEN: usize = 64;

/// The kind of frame found at a scan position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Binary block, tagged with its block number (revision bits stripped).
    Binary(u16),
    /// ASCII talker sentence, tagged with its identifier, e.g. `$GPGGA`.
    Sentence(String),
    /// Normal reply to a command sent to the receiver.
    CommandEcho,
    /// Reply indicating the receiver rejected a command.
    ErrorReply,
    /// One-shot connection banner, e.g. `IP10>`.
    ConnectionBanner,
}

/// One self-delimited unit of receiver output located in a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Offset of the first frame byte in the scanned buffer.
    pub start: usize,
    /// Full frame length including sync bytes and any terminator or checksum.
    pub length: usize,
    /// Whether checksum/terminator validation passed. A frame with a bad
    /// checksum still has a known length so the caller can skip past it.
    pub valid: bool,
}

/// Result of probing a single buffer position.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// A frame begins at the position and its full extent is in the buffer.
    Found(Frame),
    /// A frame appears to begin at the position but its end lies beyond the
    /// buffer. The caller must supply more bytes; this is never an error.
    Incomplete,
    /// Nothing recognizable at the position.
    Unrecognized,
}

/// Determine whether a frame begins at `pos` and validate it.
///
/// `expect_banner` enables recognition of the connection banner, which only
/// appears immediately after a fresh transport connection and must not be
/// re-triggered mid-stream.
///
/// An empty remainder is `Incomplete`: nothing can be decided until more
/// bytes arrive.
#[must_use]
pub fn classify(buf: &[u8], pos: usize, expect_banner: bool) -> ScanOutcome {
    let rest = buf.get(pos..).unwrap_or_default();
    let Some(&first) = rest.first() else {
        return ScanOutcome::Incomplete;
    };
    match first {
        SYNC => {
            if rest.len() < 2 {
                return ScanOutcome::Incomplete;
            }
            match rest[1] {
                BLOCK_SYNC => classify_block(rest, pos),
                SENTENCE_STANDARD | SENTENCE_PROPRIETARY => classify_sentence(rest, pos),
                REPLY_SYNC => classify_reply(rest, pos),
                _ => ScanOutcome::Unrecognized,
            }
        }
        b if expect_banner && b == BANNER_PREFIX[0] => {
            if rest.len() < 2 {
                return ScanOutcome::Incomplete;
            }
            if rest[1] != BANNER_PREFIX[1] {
                return ScanOutcome::Unrecognized;
            }
            classify_banner(rest, pos)
        }
        _ => ScanOutcome::Unrecognized,
    }
}

fn classify_block(rest: &[u8], pos: usize) -> ScanOutcome {
    if rest.len() < BLOCK_HEADER_LEN {
        return ScanOutcome::Incomplete;
    }
    let id = u16::from_le_bytes([rest[2], rest[3]]) & BLOCK_NUMBER_MASK;
    let length = u16::from_le_bytes([rest[4], rest[5]]) as usize;
    // Block lengths are always a multiple of 4 and bounded. Anything else
    // means this is not actually a block header, so fall back to byte-wise
    // resync.
    if length < BLOCK_MIN_LEN || length > BLOCK_MAX_LEN || length % 4 != 0 {
        trace!(id, length, "implausible block length");
        return ScanOutcome::Unrecognized;
    }
    if rest.len() < length {
        return ScanOutcome::Incomplete;
    }
    let want = u16::from_le_bytes([rest[length - 2], rest[length - 1]]);
    let got = checksum(&rest[..length - 2]);
    ScanOutcome::Found(Frame {
        kind: FrameKind::Binary(id),
        start: pos,
        length,
        valid: want == got,
    })
}

fn classify_sentence(rest: &[u8], pos: usize) -> ScanOutcome {
    match find_line_end(rest, MAX_LINE_LEN) {
        Some(length) => ScanOutcome::Found(Frame {
            kind: FrameKind::Sentence(sentence_id(&rest[..length])),
            start: pos,
            length,
            valid: true,
        }),
        None if rest.len() >= MAX_LINE_LEN => ScanOutcome::Unrecognized,
        None => ScanOutcome::Incomplete,
    }
}

fn classify_reply(rest: &[u8], pos: usize) -> ScanOutcome {
    if rest.len() < 3 {
        return ScanOutcome::Incomplete;
    }
    let kind = if rest[2] == REPLY_ERROR {
        FrameKind::ErrorReply
    } else {
        FrameKind::CommandEcho
    };
    match find_line_end(rest, MAX_LINE_LEN) {
        Some(length) => ScanOutcome::Found(Frame {
            kind,
            start: pos,
            length,
            valid: true,
        }),
        None if rest.len() >= MAX_LINE_LEN => ScanOutcome::Unrecognized,
        None => ScanOutcome::Incomplete,
    }
}

fn classify_banner(rest: &[u8], pos: usize) -> ScanOutcome {
    let end = rest.len().min(MAX_BANNER_LEN);
    match rest[..end].iter().position(|&b| b == BANNER_END) {
        Some(i) => ScanOutcome::Found(Frame {
            kind: FrameKind::ConnectionBanner,
            start: pos,
            length: i + 1,
            valid: true,
        }),
        None if rest.len() >= MAX_BANNER_LEN => ScanOutcome::Unrecognized,
        None => ScanOutcome::Incomplete,
    }
}

/// Look for a CRLF in `rest`, probing at most `max` bytes. Returns the line
/// length including the terminator.
fn find_line_end(rest: &[u8], max: usize) -> Option<usize> {
    let end = rest.len().min(max);
    rest[..end].windows(2).position(|w| w == CRLF).map(|i| i + 2)
}

/// Identifier token of a sentence: everything before the first field
/// separator.
fn sentence_id(line: &[u8]) -> String {
    let end = line
        .iter()
        .position(|&b| b == b',' || b == b'*' || b == CRLF[0])
        .unwrap_or(line.len());
    String::from_utf8_lossy(&line[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn block(id: u16, payload: &[u8]) -> Vec<u8> {
        let length = BLOCK_MIN_LEN + payload.len();
        let mut dat = vec![SYNC, BLOCK_SYNC];
        dat.extend_from_slice(&id.to_le_bytes());
        dat.extend_from_slice(&u16::try_from(length).unwrap().to_le_bytes());
        dat.extend_from_slice(payload);
        dat.extend_from_slice(&checksum(&dat).to_le_bytes());
        dat
    }

    #[test_case(b"xyz" ; "plain text")]
    #[test_case(b"$x123" ; "sync with unknown class byte")]
    #[test_case(b"IP10>" ; "banner while not expected")]
    #[test_case(&[0x00, 0xff, 0x7e] ; "binary noise")]
    fn unrecognized(dat: &[u8]) {
        assert_eq!(classify(dat, 0, false), ScanOutcome::Unrecognized);
    }

    #[test_case(b"" ; "empty buffer")]
    #[test_case(b"$" ; "lone sync byte")]
    #[test_case(b"$@" ; "block sync only")]
    #[test_case(b"$@\x01\x02\x14" ; "partial block header")]
    #[test_case(b"$GPGGA,1,2,3" ; "sentence without terminator")]
    #[test_case(b"$R" ; "reply sync only")]
    #[test_case(b"$R: setNMEAOutput" ; "reply without terminator")]
    fn incomplete(dat: &[u8]) {
        assert_eq!(classify(dat, 0, false), ScanOutcome::Incomplete);
    }

    #[test]
    fn block_with_valid_checksum() {
        let dat = block(4007, &[1, 2, 3, 4]);
        let ScanOutcome::Found(frame) = classify(&dat, 0, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::Binary(4007));
        assert_eq!(frame.length, dat.len());
        assert!(frame.valid);
    }

    #[test]
    fn block_id_strips_revision_bits() {
        let dat = block(4007 | 0x2000, &[1, 2, 3, 4]);
        let ScanOutcome::Found(frame) = classify(&dat, 0, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::Binary(4007));
    }

    #[test]
    fn block_with_corrupt_checksum_has_known_length() {
        let mut dat = block(4007, &[1, 2, 3, 4]);
        let n = dat.len();
        dat[n - 1] ^= 0xff;
        let ScanOutcome::Found(frame) = classify(&dat, 0, false) else {
            panic!("expected a frame");
        };
        assert!(!frame.valid);
        assert_eq!(frame.length, n);
    }

    #[test]
    fn block_split_across_reads_is_incomplete_not_invalid() {
        let dat = block(4007, &[1, 2, 3, 4]);
        for n in 1..dat.len() {
            assert_eq!(
                classify(&dat[..n], 0, false),
                ScanOutcome::Incomplete,
                "prefix of {n} bytes"
            );
        }
    }

    #[test_case(0 ; "zero length")]
    #[test_case(7 ; "below minimum")]
    #[test_case(22 ; "not a multiple of four")]
    #[test_case(4100 ; "beyond maximum")]
    fn block_with_implausible_length(length: u16) {
        let mut dat = vec![SYNC, BLOCK_SYNC, 0x07, 0x0f];
        dat.extend_from_slice(&length.to_le_bytes());
        dat.extend_from_slice(&[0u8; 64]);
        assert_eq!(classify(&dat, 0, false), ScanOutcome::Unrecognized);
    }

    #[test]
    fn sentence_with_terminator() {
        let dat = b"$GPGGA,131100.00,5231.2,N*5b\r\nmore";
        let ScanOutcome::Found(frame) = classify(dat, 0, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::Sentence("$GPGGA".into()));
        assert_eq!(frame.length, dat.len() - 4);
        assert!(frame.valid);
    }

    #[test]
    fn sentence_terminator_beyond_probe_limit() {
        let mut dat = b"$GP".to_vec();
        dat.extend_from_slice(&vec![b'x'; MAX_LINE_LEN]);
        dat.extend_from_slice(b"\r\n");
        assert_eq!(classify(&dat, 0, false), ScanOutcome::Unrecognized);
    }

    #[test]
    fn sentence_split_inside_terminator() {
        // CR present, LF beyond the buffer
        assert_eq!(classify(b"$GPGGA,1\r", 0, false), ScanOutcome::Incomplete);
    }

    #[test]
    fn reply_echo_and_error() {
        let ScanOutcome::Found(frame) = classify(b"$R: gdl\r\n", 0, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::CommandEcho);

        let ScanOutcome::Found(frame) = classify(b"$R? invalid\r\n", 0, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::ErrorReply);
    }

    #[test]
    fn banner_only_when_expected() {
        let dat = b"IP10>";
        assert_eq!(classify(dat, 0, false), ScanOutcome::Unrecognized);

        let ScanOutcome::Found(frame) = classify(dat, 0, true) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.kind, FrameKind::ConnectionBanner);
        assert_eq!(frame.length, 5);
    }

    #[test]
    fn banner_without_terminator() {
        assert_eq!(classify(b"IP10", 0, true), ScanOutcome::Incomplete);
        let mut long = b"IP".to_vec();
        long.extend_from_slice(&vec![b'x'; MAX_BANNER_LEN]);
        assert_eq!(classify(&long, 0, true), ScanOutcome::Unrecognized);
    }

    #[test]
    fn classify_mid_buffer() {
        let mut dat = vec![0xaa, 0xbb];
        dat.extend_from_slice(&block(4001, &[0, 0, 0, 0]));
        let ScanOutcome::Found(frame) = classify(&dat, 2, false) else {
            panic!("expected a frame");
        };
        assert_eq!(frame.start, 2);
        assert_eq!(frame.kind, FrameKind::Binary(4001));
    }

    #[test]
    fn sentence_id_stops_at_separator() {
        assert_eq!(sentence_id(b"$GPGSV,3,1*77\r\n"), "$GPGSV");
        assert_eq!(sentence_id(b"$PSSN*10\r\n"), "$PSSN");
        assert_eq!(sentence_id(b"$GPTXT\r\n"), "$GPTXT");
    }
}
