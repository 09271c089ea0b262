// SPDX-License-Identifier: Apache-2.0

//! Compact packet decoder: parses a single datagram payload from the
//! rotating range sensor into a [`DecodedModule`]. Pure function of its
//! input buffer, no state carried between calls.

use std::fmt;

use tracing::instrument;

use crate::types::{DecodedModule, Point};

/// Start-of-frame marker expected in bytes `[0..4)`, big-endian.
const START_PATTERN: u32 = 0x0202_0202;
/// Command identifier expected in bytes `[4..8)`, little-endian.
const COMMAND_ID: u32 = 1;
/// Size of the fixed transport header before the first module.
const HEADER_LEN: usize = 32;
/// Size of the fixed module header before the per-layer arrays.
const MODULE_HEADER_LEN: usize = 32;

#[derive(Debug)]
#[allow(dead_code)]
pub enum DecodeError {
    TooShort(usize),
    BadStartPattern(u32),
    BadCommandId(u32),
}

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::TooShort(len) => write!(f, "datagram too short: {} bytes", len),
            DecodeError::BadStartPattern(v) => {
                write!(f, "unexpected start pattern: 0x{:08X}", v)
            }
            DecodeError::BadCommandId(v) => write!(f, "unexpected command id: {}", v),
        }
    }
}

#[inline]
fn le_u32(buf: &[u8], off: usize) -> Option<u32> {
    buf.get(off..off + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

#[inline]
fn le_u64(buf: &[u8], off: usize) -> Option<u64> {
    buf.get(off..off + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

#[inline]
fn le_f32(buf: &[u8], off: usize) -> Option<f32> {
    buf.get(off..off + 4)
        .map(|s| f32::from_le_bytes(s.try_into().unwrap()))
}

#[inline]
fn le_u16(buf: &[u8], off: usize) -> Option<u16> {
    buf.get(off..off + 2)
        .map(|s| u16::from_le_bytes(s.try_into().unwrap()))
}

/// Validates the fixed transport header and returns the size in bytes of
/// the first module, or an error describing why the datagram was rejected.
fn validate_header(buf: &[u8]) -> Result<u32, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::TooShort(buf.len()));
    }

    let start = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    if start != START_PATTERN {
        return Err(DecodeError::BadStartPattern(start));
    }

    let command = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    if command != COMMAND_ID {
        return Err(DecodeError::BadCommandId(command));
    }

    Ok(u32::from_le_bytes(buf[28..32].try_into().unwrap()))
}

/// Decodes a single module slice, appending its points to `out`. Returns
/// `(frame_number, last_module, next_module_size)`, or `None` if the module
/// is malformed beyond recovery (missing required header fields).
fn decode_module(m: &[u8], out: &mut Vec<Point>) -> Option<(u64, bool, u32)> {
    let frame_number = le_u64(m, 8)?;
    let num_layers = le_u32(m, 20)? as usize;
    let num_beams = le_u32(m, 24)? as usize;
    let num_echos = le_u32(m, 28)? as usize;

    let mut off = MODULE_HEADER_LEN + num_layers * 16;

    // `n` comes straight from an untrusted header field, so this must never
    // reserve `n` elements up front — a malformed datagram with an
    // enormous count would make the allocator abort the process before the
    // first bounds check ever runs. Growing via `push` instead means a short
    // buffer fails on the first out-of-bounds `le_f32` read.
    let mut read_array = |off: &mut usize, n: usize| -> Option<Vec<f32>> {
        let mut v = Vec::new();
        for i in 0..n {
            v.push(le_f32(m, *off + i * 4)?);
        }
        *off += n * 4;
        Some(v)
    };

    let phi = read_array(&mut off, num_layers)?;
    let theta_start = read_array(&mut off, num_layers)?;
    let theta_stop = read_array(&mut off, num_layers)?;

    let scaling = le_f32(m, off)?;
    off += 4;
    let next_module_size = le_u32(m, off)?;
    off += 4;
    off += 1; // reserved
    let data_echos = *m.get(off)?;
    let data_beams = *m.get(off + 1)?;
    off += 3; // data_echos, data_beams, reserved

    let data_offset = off;

    let echo_size =
        (if data_echos & 1 != 0 { 2 } else { 0 }) + (if data_echos & 2 != 0 { 2 } else { 0 });
    let beam_prop_size = if data_beams & 1 != 0 { 1 } else { 0 };
    let beam_angle_size = if data_beams & 2 != 0 { 2 } else { 0 };
    let beam_size = echo_size * num_echos + beam_prop_size + beam_angle_size;

    let beam_denom = if num_beams <= 1 { 1 } else { num_beams - 1 };

    for b in 0..num_beams {
        for l in 0..num_layers {
            let base = data_offset + (b * num_layers + l) * beam_size;
            let theta = theta_start[l]
                + b as f32 * (theta_stop[l] - theta_start[l]) / beam_denom as f32;

            for ec in 0..num_echos {
                let idx = base + ec * echo_size;
                if echo_size > 0 && idx + echo_size > m.len() {
                    continue;
                }
                let raw = if echo_size > 0 {
                    match le_u16(m, idx) {
                        Some(v) => v,
                        None => continue,
                    }
                } else {
                    0
                };
                let d = raw as f32 * scaling / 1000.0;
                let x = d * phi[l].cos() * theta.cos();
                let y = d * phi[l].cos() * theta.sin();
                let z = d * phi[l].sin();
                out.push(Point::new(x, y, z, l as u32, b as u32, ec as u32, theta));
            }
        }
    }

    Some((frame_number, next_module_size == 0, next_module_size))
}

/// Decodes one datagram payload into a [`DecodedModule`]. Returns `None`
/// for a malformed or unrecognized datagram — UDP is best-effort and the
/// caller silently drops these (see `decode_datagram` for the logging
/// wrapper used by the net ingestion loop).
#[instrument(skip_all, level = "trace")]
pub fn decode(buf: &[u8]) -> Option<DecodedModule> {
    let mut module_size = validate_header(buf).ok()?;

    let mut offset = HEADER_LEN;
    let mut points = Vec::new();
    let mut frame_number = None;
    let mut last_module = false;

    while module_size > 0 {
        let end = offset.checked_add(module_size as usize)?;
        if end > buf.len() {
            break;
        }
        let m = &buf[offset..end];

        match decode_module(m, &mut points) {
            Some((fnum, last, next_size)) => {
                frame_number = Some(fnum);
                last_module = last;
                offset = end;
                module_size = next_size;
            }
            None => break,
        }
    }

    frame_number.map(|frame_number| DecodedModule {
        frame_number,
        last_module,
        points,
    })
}

/// Wraps [`decode`] with the logging policy from the error handling design:
/// a malformed datagram is dropped and counted, never surfaced as an error.
#[instrument(skip_all, level = "trace")]
pub fn decode_datagram(buf: &[u8]) -> Option<DecodedModule> {
    match decode(buf) {
        Some(module) => Some(module),
        None => {
            tracing::trace!(len = buf.len(), "dropping malformed datagram");
            None
        }
    }
}
