//! Destinations for assembled frames.

use crate::types::ScanFrame;
use log::{info, warn};
use std::sync::mpsc::SyncSender;

/// Receives every frame the session produces, in sequence order.
pub trait ScanSink {
    fn publish(&mut self, frame: ScanFrame);
}

/// Blocks while the queue is full, so frames are never reordered or dropped.
/// Frames published after the receiver hung up are discarded with a warning.
impl ScanSink for SyncSender<ScanFrame> {
    fn publish(&mut self, frame: ScanFrame) {
        let seq = frame.sequence_number;
        if self.send(frame).is_err() {
            warn!("Frame {} dropped, receiver disconnected", seq);
        }
    }
}

impl ScanSink for Vec<ScanFrame> {
    fn publish(&mut self, frame: ScanFrame) {
        self.push(frame);
    }
}

impl<F: FnMut(ScanFrame)> ScanSink for F {
    fn publish(&mut self, frame: ScanFrame) {
        self(frame)
    }
}

/// Logs a one-line summary of each frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ScanSink for LogSink {
    fn publish(&mut self, frame: ScanFrame) {
        let valid = frame
            .ranges
            .iter()
            .filter(|r| (frame.range_min..=frame.range_max).contains(*r))
            .count();
        info!(
            "Scan {} [{}] at {:.6}: {}/{} ranges valid",
            frame.sequence_number,
            frame.frame_id,
            frame.timestamp.as_secs_f64(),
            valid,
            frame.ranges.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    fn frame(seq: u32) -> ScanFrame {
        ScanFrame {
            sequence_number: seq,
            ..ScanFrame::default()
        }
    }

    #[test]
    fn channel_sink_preserves_order() {
        let (mut tx, rx) = sync_channel(4);
        for seq in 1..=3 {
            tx.publish(frame(seq));
        }
        let received: Vec<u32> = rx.try_iter().map(|f| f.sequence_number).collect();
        assert_eq!(received, [1, 2, 3]);
    }

    #[test]
    fn hung_up_channel_does_not_panic() {
        let (mut tx, rx) = sync_channel::<ScanFrame>(1);
        drop(rx);
        tx.publish(frame(1));
    }

    #[test]
    fn closure_sink() {
        let mut seen = Vec::new();
        let mut sink = |f: ScanFrame| seen.push(f.sequence_number);
        sink.publish(frame(9));
        LogSink.publish(frame(10));
        assert_eq!(seen, [9]);
    }
}
