//! The stream scan loop.
//!
//! A [Scanner] repeatedly classifies the next buffer position, validates and
//! decodes frames, updates the latest-value cache, attempts triggered
//! composite builds, and dispatches everything to the callback registry. It
//! owns all of that state, so multiple independent receiver sessions can run
//! in one process.
//!
//! Malformed receiver output is an expected operating condition: corrupt or
//! rejected frames are logged and skipped, and the loop never halts because
//! of a single bad frame.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cache::LatestValueCache;
use crate::composite::CompositeSet;
use crate::decode::DecoderRegistry;
use crate::dispatch::CallbackRegistry;
use crate::frame::{classify, Frame, FrameKind, ScanOutcome};
use crate::{Error, Result};

/// Outcome of one scan pass over a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    /// Bytes consumed. Anything after this offset is the start of an
    /// incomplete frame and must be prepended to the next read.
    pub consumed: usize,
    /// Records decoded and dispatched, composites included.
    pub frames: usize,
    /// Frames recognized but skipped: checksum mismatch, decoder rejection,
    /// or no registered decoder.
    pub dropped: usize,
}

/// Scans raw receiver buffers for frames and drives decode and dispatch.
pub struct Scanner {
    decoders: DecoderRegistry,
    composites: CompositeSet,
    registry: Arc<CallbackRegistry>,
    cache: LatestValueCache,
    expect_banner: bool,
}

impl Scanner {
    /// Create a scanner.
    ///
    /// # Errors
    /// [`Error::Config`] if a composite is configured whose key has no
    /// subscriber; such a composite would be assembled into the void, which
    /// is always a setup mistake.
    pub fn new(
        decoders: DecoderRegistry,
        composites: CompositeSet,
        registry: Arc<CallbackRegistry>,
    ) -> Result<Self> {
        for spec in composites.specs() {
            let key = spec.kind.key();
            if !registry.has_subscribers(key) {
                return Err(Error::Config(format!(
                    "composite {key:?} is configured but has no subscribers"
                )));
            }
        }
        Ok(Scanner {
            decoders,
            composites,
            registry,
            cache: LatestValueCache::new(),
            expect_banner: false,
        })
    }

    /// Arm connection-banner recognition for the next scan. Call after
    /// opening a fresh transport connection; the flag clears itself once a
    /// banner has been consumed.
    pub fn expect_banner(&mut self) {
        self.expect_banner = true;
    }

    /// Clear the latest-value cache, e.g. between replayed sessions.
    pub fn reset(&mut self) {
        self.cache.reset();
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Scan `buf` from the start, consuming as many frames as possible.
    ///
    /// The buffer is only borrowed for this call; the caller keeps ownership
    /// and is expected to carry `buf[summary.consumed..]` over into its next
    /// read. The position strictly advances on every iteration, so a pass
    /// always terminates within `buf.len()` steps.
    pub fn scan(&mut self, buf: &[u8]) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let mut pos = 0;

        while pos < buf.len() {
            match classify(buf, pos, self.expect_banner) {
                ScanOutcome::Incomplete => break,
                ScanOutcome::Unrecognized => {
                    // resynchronization after corruption or a mid-frame connect
                    pos += 1;
                }
                ScanOutcome::Found(frame) => {
                    if frame.valid {
                        match self.consume(&frame, buf) {
                            Some(dispatched) => summary.frames += dispatched,
                            None => summary.dropped += 1,
                        }
                    } else {
                        warn!(kind = ?frame.kind, length = frame.length, "checksum mismatch, skipping frame");
                        summary.dropped += 1;
                    }
                    // Advance past the full frame even when invalid so a
                    // corrupt block is not re-probed byte by byte.
                    pos += frame.length;
                }
            }
        }

        summary.consumed = pos;
        trace!(
            consumed = summary.consumed,
            frames = summary.frames,
            dropped = summary.dropped,
            remainder = buf.len() - summary.consumed,
            "scan pass done"
        );
        summary
    }

    /// Decode one validated frame and dispatch the results. Returns the
    /// number of records dispatched, composites included, or `None` if the
    /// frame was skipped.
    fn consume(&mut self, frame: &Frame, buf: &[u8]) -> Option<usize> {
        let record = match self.decoders.decode(frame, buf) {
            Ok(record) => record,
            Err(Error::UnknownId(id)) => {
                trace!(%id, "no decoder registered, skipping frame");
                return None;
            }
            Err(err) => {
                warn!(kind = ?frame.kind, %err, "decoder rejected frame, skipping");
                return None;
            }
        };

        if frame.kind == FrameKind::ConnectionBanner {
            // one-shot: never re-triggered mid-stream
            self.expect_banner = false;
        }

        let arrived = self.cache.update(&record);
        self.registry.dispatch(record.key(), &record);
        let mut dispatched = 1;

        if let Some(constituent) = arrived {
            for composite in self.composites.on_arrival(constituent, &self.cache) {
                debug!(key = composite.key(), "assembled composite");
                self.registry.dispatch(composite.key(), &composite);
                dispatched += 1;
            }
        }
        Some(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;
    use crate::frame::{BLOCK_HEADER_LEN, BLOCK_SYNC, SYNC};
    use crate::records::{MeasEpoch, Record};
    use std::sync::Mutex;

    fn block(id: u16, payload: &[u8]) -> Vec<u8> {
        let length = BLOCK_HEADER_LEN + payload.len() + 2;
        let mut dat = vec![SYNC, BLOCK_SYNC];
        dat.extend_from_slice(&id.to_le_bytes());
        dat.extend_from_slice(&u16::try_from(length).unwrap().to_le_bytes());
        dat.extend_from_slice(payload);
        dat.extend_from_slice(&checksum(&dat).to_le_bytes());
        dat
    }

    fn meas_epoch_block(observations: u8) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&1000u32.to_le_bytes());
        p.extend_from_slice(&2310u16.to_le_bytes());
        p.push(observations);
        p.push(0);
        block(MeasEpoch::ID, &p)
    }

    fn scanner() -> (Scanner, Arc<CallbackRegistry>) {
        let registry = Arc::new(CallbackRegistry::new());
        let scanner = Scanner::new(
            DecoderRegistry::with_defaults(),
            CompositeSet::default(),
            Arc::clone(&registry),
        )
        .unwrap();
        (scanner, registry)
    }

    #[test]
    fn empty_buffer() {
        let (mut scanner, _) = scanner();
        assert_eq!(scanner.scan(&[]), ScanSummary::default());
    }

    #[test]
    fn garbage_is_fully_consumed() {
        let (mut scanner, _) = scanner();
        let buf: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        let summary = scanner.scan(&buf);
        assert_eq!(summary.consumed, buf.len());
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn frame_preceded_by_garbage() {
        let (mut scanner, registry) = scanner();
        let seen = Arc::new(Mutex::new(0u32));
        let s = Arc::clone(&seen);
        registry.register_fn("measepoch", move |_| *s.lock().unwrap() += 1);

        let mut buf = b"noise$@noise".to_vec();
        buf.extend_from_slice(&meas_epoch_block(7));
        let summary = scanner.scan(&buf);
        assert_eq!(summary.consumed, buf.len());
        assert_eq!(summary.frames, 1);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn incomplete_tail_is_reported() {
        let (mut scanner, _) = scanner();
        let dat = meas_epoch_block(7);
        let mut buf = dat.clone();
        buf.extend_from_slice(&dat[..5]); // second block cut short

        let summary = scanner.scan(&buf);
        assert_eq!(summary.consumed, dat.len());
        assert_eq!(summary.frames, 1);
        assert_eq!(buf.len() - summary.consumed, 5);
    }

    #[test]
    fn unknown_block_is_dropped_not_fatal() {
        let (mut scanner, registry) = scanner();
        let seen = Arc::new(Mutex::new(0u32));
        let s = Arc::clone(&seen);
        registry.register_fn("measepoch", move |_| *s.lock().unwrap() += 1);

        let mut buf = block(1234, &[0u8; 4]);
        buf.extend_from_slice(&meas_epoch_block(7));
        let summary = scanner.scan(&buf);
        assert_eq!(summary.consumed, buf.len());
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.dropped, 1);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn banner_is_one_shot() {
        let (mut scanner, registry) = scanner();
        let banners = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::clone(&banners);
        registry.register_fn("banner", move |rec| {
            if let Record::Banner(banner) = rec {
                b.lock().unwrap().push(banner.descriptor.clone());
            }
        });

        scanner.expect_banner();
        let summary = scanner.scan(b"IP10>IP11>");
        assert_eq!(summary.consumed, 10);
        // second IP10> is mid-stream data, not a banner
        assert_eq!(*banners.lock().unwrap(), vec!["IP10".to_string()]);
    }

    #[test]
    fn new_rejects_composite_without_subscribers() {
        let registry = Arc::new(CallbackRegistry::new());
        let zult = Scanner::new(
            DecoderRegistry::with_defaults(),
            CompositeSet::gnss_defaults(),
            registry,
        );
        assert!(matches!(zult, Err(Error::Config(_))));
    }

    #[test]
    fn reset_clears_cache() {
        let registry = Arc::new(CallbackRegistry::new());
        registry.register_fn("navfix", |_| {});
        registry.register_fn("satstatus", |_| {});
        registry.register_fn("diagnostics", |_| {});
        let mut scanner = Scanner::new(
            DecoderRegistry::with_defaults(),
            CompositeSet::gnss_defaults(),
            registry,
        )
        .unwrap();
        scanner.scan(&meas_epoch_block(7));
        scanner.reset();
        // nothing to assert beyond it not panicking; arrival state is
        // exercised end to end in the integration tests
    }
}
