//! Bridge from validated frames to typed records.
//!
//! Decoders are pure functions over a frame's byte range, looked up by binary
//! block number or sentence identifier. The registry ships defaults for every
//! block and sentence the composites consume, and callers may register their
//! own for additional ids.

use std::collections::HashMap;

use crate::frame::{Frame, FrameKind, BANNER_END};
use crate::records::{
    AttCovEuler, AttEuler, Banner, ChannelStatus, Dop, Gga, Gsv, InsNavGeod, MeasEpoch,
    PosCovGeodetic, PvtGeodetic, QualityInd, ReceiverSetup, ReceiverStatus, Record, Reply, Rmc,
    VelCovGeodetic,
};
use crate::{Error, Result};

/// Decoder for one binary block number.
pub trait BlockDecoder: Send + Sync {
    /// Decode the full frame bytes, header and trailing checksum included.
    fn decode(&self, dat: &[u8]) -> Result<Record>;
}

impl<F> BlockDecoder for F
where
    F: Fn(&[u8]) -> Result<Record> + Send + Sync,
{
    fn decode(&self, dat: &[u8]) -> Result<Record> {
        self(dat)
    }
}

/// Decoder for one sentence identifier.
pub trait SentenceDecoder: Send + Sync {
    /// Decode the full sentence line, terminator included.
    fn decode(&self, line: &str) -> Result<Record>;
}

impl<F> SentenceDecoder for F
where
    F: Fn(&str) -> Result<Record> + Send + Sync,
{
    fn decode(&self, line: &str) -> Result<Record> {
        self(line)
    }
}

/// Lookup table from frame id to decoder.
#[derive(Default)]
pub struct DecoderRegistry {
    blocks: HashMap<u16, Box<dyn BlockDecoder>>,
    sentences: HashMap<String, Box<dyn SentenceDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry. Command replies and banners are always decoded;
    /// everything else needs a registered decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with decoders for all supported blocks and sentences.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register_block(PvtGeodetic::ID, |d: &[u8]| {
            PvtGeodetic::decode(d).map(Record::from)
        });
        reg.register_block(PosCovGeodetic::ID, |d: &[u8]| {
            PosCovGeodetic::decode(d).map(Record::from)
        });
        reg.register_block(AttEuler::ID, |d: &[u8]| {
            AttEuler::decode(d).map(Record::from)
        });
        reg.register_block(AttCovEuler::ID, |d: &[u8]| {
            AttCovEuler::decode(d).map(Record::from)
        });
        reg.register_block(InsNavGeod::ID, |d: &[u8]| {
            InsNavGeod::decode(d).map(Record::from)
        });
        reg.register_block(ChannelStatus::ID, |d: &[u8]| {
            ChannelStatus::decode(d).map(Record::from)
        });
        reg.register_block(MeasEpoch::ID, |d: &[u8]| {
            MeasEpoch::decode(d).map(Record::from)
        });
        reg.register_block(Dop::ID, |d: &[u8]| Dop::decode(d).map(Record::from));
        reg.register_block(VelCovGeodetic::ID, |d: &[u8]| {
            VelCovGeodetic::decode(d).map(Record::from)
        });
        reg.register_block(ReceiverStatus::ID, |d: &[u8]| {
            ReceiverStatus::decode(d).map(Record::from)
        });
        reg.register_block(QualityInd::ID, |d: &[u8]| {
            QualityInd::decode(d).map(Record::from)
        });
        reg.register_block(ReceiverSetup::ID, |d: &[u8]| {
            ReceiverSetup::decode(d).map(Record::from)
        });

        for talker in ["$GPGGA", "$GNGGA"] {
            reg.register_sentence(talker, |l: &str| Gga::parse(l).map(Record::from));
        }
        for talker in ["$GPRMC", "$GNRMC"] {
            reg.register_sentence(talker, |l: &str| Rmc::parse(l).map(Record::from));
        }
        for talker in ["$GPGSV", "$GLGSV", "$GAGSV"] {
            reg.register_sentence(talker, |l: &str| Gsv::parse(l).map(Record::from));
        }
        reg
    }

    /// Register or replace the decoder for a binary block number.
    pub fn register_block<D>(&mut self, id: u16, decoder: D)
    where
        D: BlockDecoder + 'static,
    {
        self.blocks.insert(id, Box::new(decoder));
    }

    /// Register or replace the decoder for a sentence identifier, e.g.
    /// `$GPGGA`.
    pub fn register_sentence<D>(&mut self, id: &str, decoder: D)
    where
        D: SentenceDecoder + 'static,
    {
        self.sentences.insert(id.to_string(), Box::new(decoder));
    }

    /// Decode a validated frame into a typed record.
    ///
    /// # Errors
    /// [`Error::UnknownId`] if no decoder is registered for the frame, and
    /// [`Error::Decode`] (or [`Error::NotEnoughData`]) if the registered
    /// decoder rejects the payload.
    pub fn decode(&self, frame: &Frame, buf: &[u8]) -> Result<Record> {
        let dat = &buf[frame.start..frame.start + frame.length];
        match &frame.kind {
            FrameKind::Binary(id) => match self.blocks.get(id) {
                Some(decoder) => decoder.decode(dat),
                None => Err(Error::UnknownId(id.to_string())),
            },
            FrameKind::Sentence(id) => {
                let line = sentence_str(id, dat)?;
                verify_sentence_checksum(id, line)?;
                match self.sentences.get(id) {
                    Some(decoder) => decoder.decode(line),
                    None => Err(Error::UnknownId(id.clone())),
                }
            }
            FrameKind::CommandEcho | FrameKind::ErrorReply => {
                let line = sentence_str("reply", dat)?;
                Ok(Reply {
                    text: line.trim_end().to_string(),
                    error: frame.kind == FrameKind::ErrorReply,
                }
                .into())
            }
            FrameKind::ConnectionBanner => {
                let text = sentence_str("banner", dat)?;
                Ok(Banner {
                    descriptor: text.trim_end_matches(BANNER_END as char).to_string(),
                }
                .into())
            }
        }
    }
}

fn sentence_str<'a>(id: &str, dat: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(dat).map_err(|_| Error::Decode {
        id: id.to_string(),
        reason: "line is not valid utf-8".into(),
    })
}

/// Verify the `*hh` checksum of a sentence, if it carries one: XOR of all
/// bytes between `$` and `*`.
fn verify_sentence_checksum(id: &str, line: &str) -> Result<()> {
    let line = line.trim_end();
    let Some(star) = line.rfind('*') else {
        return Ok(());
    };
    let want = u8::from_str_radix(&line[star + 1..], 16).map_err(|_| Error::Decode {
        id: id.to_string(),
        reason: format!("bad checksum suffix {:?}", &line[star + 1..]),
    })?;
    let got = line[1..star].bytes().fold(0u8, |acc, b| acc ^ b);
    if got != want {
        return Err(Error::Decode {
            id: id.to_string(),
            reason: format!("sentence checksum mismatch: computed {got:02X}, expected {want:02X}"),
        });
    }
    Ok(())
}
