//! Frame synchronization across the ego sensor streams.
//!
//! After each world tick the runner asks for the payloads of that tick's
//! frame. Each stream is drained in turn: payloads tagged with an older
//! frame are dropped, the payload of the requested frame is kept. A stream
//! that stays empty past the timeout, or that delivers a payload from the
//! future, fails the sequence.

use std::cmp::Ordering;
use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::trace;

use crate::simulator::{CameraImage, GnssMeasurement, SensorData, SensorRig, WorldTick};

/// One of the ego sensor streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// World snapshots.
    World,
    /// RGB camera.
    Rgb,
    /// Semantic segmentation camera.
    Semantic,
    /// GNSS receiver.
    Gnss,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::World => "world",
            Self::Rgb => "rgb",
            Self::Semantic => "semantic",
            Self::Gnss => "gnss",
        };
        f.write_str(name)
    }
}

/// Errors from pulling a synchronized frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No payload arrived in time.
    #[error("timed out after {timeout_ms} ms waiting for frame {frame} on the {stream} stream")]
    Timeout {
        /// The stream that stayed empty.
        stream: Stream,
        /// The frame being waited for.
        frame: u64,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u128,
    },

    /// The sending side of a stream is gone.
    #[error("the {stream} stream is disconnected")]
    Disconnected {
        /// The disconnected stream.
        stream: Stream,
    },

    /// A stream skipped past the requested frame.
    #[error("expected frame {expected} on the {stream} stream, got {found}")]
    FrameMismatch {
        /// The offending stream.
        stream: Stream,
        /// The frame being waited for.
        expected: u64,
        /// The frame actually delivered.
        found: u64,
    },
}

/// Payloads of every stream for one frame.
#[derive(Debug, Clone)]
pub struct SensorBundle {
    /// The synchronized frame number.
    pub frame: u64,
    /// World snapshot.
    pub world: WorldTick,
    /// RGB image.
    pub rgb: CameraImage,
    /// Semantic segmentation image.
    pub semantic: CameraImage,
    /// GNSS fix.
    pub gnss: GnssMeasurement,
}

/// Drains the sensor streams to a common frame.
#[derive(Debug)]
pub struct FrameSynchronizer {
    rig: SensorRig,
    timeout: Duration,
    discarded: u64,
}

impl FrameSynchronizer {
    /// Wrap a sensor rig, waiting at most `timeout` for each payload.
    pub const fn new(rig: SensorRig, timeout: Duration) -> Self {
        Self {
            rig,
            timeout,
            discarded: 0,
        }
    }

    /// Collect the payloads of `frame` from every stream.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if any stream times out, disconnects, or
    /// delivers a payload newer than `frame`.
    pub fn pull(&mut self, frame: u64) -> Result<SensorBundle, SyncError> {
        let world = self.retrieve(Stream::World, frame, |rig| &rig.world)?;
        let rgb = self.retrieve(Stream::Rgb, frame, |rig| &rig.rgb)?;
        let semantic = self.retrieve(Stream::Semantic, frame, |rig| &rig.semantic)?;
        let gnss = self.retrieve(Stream::Gnss, frame, |rig| &rig.gnss)?;
        Ok(SensorBundle {
            frame,
            world,
            rgb,
            semantic,
            gnss,
        })
    }

    /// Number of stale payloads dropped so far.
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }

    fn retrieve<T: SensorData>(
        &mut self,
        stream: Stream,
        frame: u64,
        select: impl Fn(&SensorRig) -> &Receiver<T>,
    ) -> Result<T, SyncError> {
        let (result, dropped) = drain_to(select(&self.rig), stream, frame, self.timeout);
        self.discarded = self.discarded.saturating_add(dropped);
        result
    }
}

/// Receive from `queue` until the payload of `frame` shows up.
///
/// Returns the outcome together with the number of stale payloads dropped.
fn drain_to<T: SensorData>(
    queue: &Receiver<T>,
    stream: Stream,
    frame: u64,
    timeout: Duration,
) -> (Result<T, SyncError>, u64) {
    let mut dropped: u64 = 0;
    loop {
        let data = match queue.recv_timeout(timeout) {
            Ok(data) => data,
            Err(RecvTimeoutError::Timeout) => {
                let err = SyncError::Timeout {
                    stream,
                    frame,
                    timeout_ms: timeout.as_millis(),
                };
                return (Err(err), dropped);
            }
            Err(RecvTimeoutError::Disconnected) => {
                return (Err(SyncError::Disconnected { stream }), dropped);
            }
        };
        match data.frame().cmp(&frame) {
            Ordering::Less => {
                trace!(%stream, stale = data.frame(), frame, "Dropping stale payload");
                dropped = dropped.saturating_add(1);
            }
            Ordering::Equal => return (Ok(data), dropped),
            Ordering::Greater => {
                let err = SyncError::FrameMismatch {
                    stream,
                    expected: frame,
                    found: data.frame(),
                };
                return (Err(err), dropped);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::mpsc::{self, Sender};

    use super::*;

    struct Senders {
        world: Sender<WorldTick>,
        rgb: Sender<CameraImage>,
        semantic: Sender<CameraImage>,
        gnss: Sender<GnssMeasurement>,
    }

    fn rig() -> (Senders, SensorRig) {
        let (world_tx, world) = mpsc::channel();
        let (rgb_tx, rgb) = mpsc::channel();
        let (semantic_tx, semantic) = mpsc::channel();
        let (gnss_tx, gnss) = mpsc::channel();
        (
            Senders {
                world: world_tx,
                rgb: rgb_tx,
                semantic: semantic_tx,
                gnss: gnss_tx,
            },
            SensorRig {
                world,
                rgb,
                semantic,
                gnss,
            },
        )
    }

    fn image(frame: u64, tag: u8) -> CameraImage {
        CameraImage {
            frame,
            width: 1,
            height: 1,
            data: vec![tag],
        }
    }

    fn send_all(tx: &Senders, frame: u64) {
        tx.world
            .send(WorldTick {
                frame,
                elapsed_seconds: 0.0,
            })
            .unwrap();
        tx.rgb.send(image(frame, 1)).unwrap();
        tx.semantic.send(image(frame, 2)).unwrap();
        tx.gnss
            .send(GnssMeasurement {
                frame,
                latitude: 0.0,
                longitude: 0.0,
                altitude: 0.0,
            })
            .unwrap();
    }

    #[test]
    fn pulls_matching_frame() {
        let (tx, rig) = rig();
        let mut sync = FrameSynchronizer::new(rig, Duration::from_millis(100));
        send_all(&tx, 4);
        let bundle = sync.pull(4).unwrap();
        assert_eq!(bundle.world.frame, 4);
        assert_eq!(bundle.rgb.data, vec![1]);
        assert_eq!(bundle.semantic.data, vec![2]);
        assert_eq!(bundle.gnss.frame, 4);
        assert_eq!(sync.discarded(), 0);
    }

    #[test]
    fn drops_stale_payloads() {
        let (tx, rig) = rig();
        let mut sync = FrameSynchronizer::new(rig, Duration::from_millis(100));
        send_all(&tx, 1);
        send_all(&tx, 2);
        send_all(&tx, 3);
        let bundle = sync.pull(3).unwrap();
        assert_eq!(bundle.frame, 3);
        assert_eq!(sync.discarded(), 8);
    }

    #[test]
    fn empty_stream_times_out() {
        let (tx, rig) = rig();
        let mut sync = FrameSynchronizer::new(rig, Duration::from_millis(20));
        tx.world
            .send(WorldTick {
                frame: 1,
                elapsed_seconds: 0.0,
            })
            .unwrap();
        let err = sync.pull(1).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Timeout {
                stream: Stream::Rgb,
                frame: 1,
                ..
            }
        ));
    }

    #[test]
    fn future_frame_is_a_mismatch() {
        let (tx, rig) = rig();
        let mut sync = FrameSynchronizer::new(rig, Duration::from_millis(100));
        send_all(&tx, 9);
        let err = sync.pull(8).unwrap_err();
        assert_eq!(
            err,
            SyncError::FrameMismatch {
                stream: Stream::World,
                expected: 8,
                found: 9
            }
        );
    }

    #[test]
    fn dropped_sender_disconnects() {
        let (tx, rig) = rig();
        let mut sync = FrameSynchronizer::new(rig, Duration::from_millis(100));
        drop(tx);
        assert!(matches!(
            sync.pull(1).unwrap_err(),
            SyncError::Disconnected {
                stream: Stream::World
            }
        ));
    }
}
