//! CPU compute provider.
//!
//! label(p) = first `bits_per_label` bits of SHA-256(commitment || p as u64 LE)
//! pow(p)   = SHA-256("pow" || commitment || p as u64 LE), compared big-endian
//!            against the difficulty threshold.
//!
//! Bits are taken LSB-first from each digest byte and packed LSB-first into
//! the output, labels back to back.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use sha2::{Digest, Sha256};

use super::{ComputeProvider, ProviderKind, WorkOutput, WorkRequest, CPU_PROVIDER_ID};
use crate::consts::MAX_BITS_PER_LABEL;
use crate::difficulty::meets_difficulty;
use crate::error::{InitError, Result};
use crate::util::bytes_for_labels;

// Как часто compute() смотрит на флаг остановки (в метках).
const STOP_CHECK_INTERVAL: u64 = 4096;

const POW_DOMAIN: &[u8] = b"pow";

pub struct CpuProvider {
    stop: AtomicBool,
}

impl Default for CpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProvider {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }
}

/// Full digest a label is cut from.
pub fn label_digest(commitment: &[u8; 32], position: u64) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(commitment);
    h.update(position.to_le_bytes());
    h.finalize().into()
}

pub fn pow_value(commitment: &[u8; 32], position: u64) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(POW_DOMAIN);
    h.update(commitment);
    h.update(position.to_le_bytes());
    h.finalize().into()
}

impl ComputeProvider for CpuProvider {
    fn id(&self) -> u32 {
        CPU_PROVIDER_ID
    }

    fn model(&self) -> &str {
        "CPU (sha256)"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cpu
    }

    fn compute(&self, req: &WorkRequest<'_>) -> Result<WorkOutput> {
        let n = req.num_labels()?;
        if req.bits_per_label == 0 || req.bits_per_label > MAX_BITS_PER_LABEL {
            return Err(InitError::Oracle(format!(
                "unsupported bits_per_label {}",
                req.bits_per_label
            )));
        }
        self.stop.store(false, Ordering::SeqCst);

        let mut packer = BitPacker::with_capacity(bytes_for_labels(n, req.bits_per_label) as usize);
        let mut nonce = None;

        for (i, position) in (req.start..=req.end).enumerate() {
            if i as u64 % STOP_CHECK_INTERVAL == 0 && self.stop.swap(false, Ordering::SeqCst) {
                debug!("cpu provider: stopped at position {}", position);
                return Err(InitError::Oracle("computation stopped".into()));
            }

            let digest = label_digest(req.commitment, position);
            packer.push(&digest, req.bits_per_label);

            if nonce.is_none() && meets_difficulty(&pow_value(req.commitment, position), req.difficulty) {
                nonce = Some(position);
            }
        }

        Ok(WorkOutput {
            output: packer.finish(),
            nonce,
        })
    }

    fn stop(&self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// LSB-first bit packer.
struct BitPacker {
    out: Vec<u8>,
    // занятые биты в последнем байте out (0 = выровнено)
    used: u32,
}

impl BitPacker {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            used: 0,
        }
    }

    /// Append the first `bits` bits of `src`.
    fn push(&mut self, src: &[u8], bits: u32) {
        let whole = (bits / 8) as usize;
        let tail = bits % 8;

        if self.used == 0 {
            self.out.extend_from_slice(&src[..whole]);
            if tail != 0 {
                self.out.push(src[whole] & ((1u8 << tail) - 1));
                self.used = tail;
            }
            return;
        }

        for &b in &src[..whole] {
            self.push_bits(b, 8);
        }
        if tail != 0 {
            self.push_bits(src[whole] & ((1u8 << tail) - 1), tail);
        }
    }

    fn push_bits(&mut self, value: u8, bits: u32) {
        if self.used == 0 {
            self.out.push(value);
            self.used = bits % 8;
            return;
        }
        let free = 8 - self.used;
        let last = self.out.len() - 1;
        self.out[last] |= value << self.used;
        if bits > free {
            self.out.push(value >> free);
            self.used = bits - free;
        } else {
            self.used = (self.used + bits) % 8;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.out
    }
}
