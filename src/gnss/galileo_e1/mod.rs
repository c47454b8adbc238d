
use rustfft::num_complex::Complex;

use crate::TrackingError;
use crate::gnss::common::SignalCode;

pub mod tracking;

pub const CODE_LENGTH_CHIPS:usize = 4092;
pub const CODE_CHIP_RATE_HZ:f64 = 1.023e6;
pub const CODE_PERIOD_SEC:f64 = 0.004;

/// Replica oversampling: the sinboc(1,1) subcarrier needs two samples per chip.
pub const REPLICA_SAMPLES_PER_CHIP:usize = 2;

/// Cyclic code plus two guard samples on each end, so the resampler can index
/// +/-2 around either boundary without a modulus test.
pub const GUARDED_CODE_LENGTH:usize = REPLICA_SAMPLES_PER_CHIP*CODE_LENGTH_CHIPS + 4;

/// Source of the satellite-specific E1 replica, sampled at two samples per
/// chip into a buffer of length `REPLICA_SAMPLES_PER_CHIP*CODE_LENGTH_CHIPS`.
/// The chip tables themselves live outside this crate.
pub trait CodeGenerator {
	fn generate(&self, signal:SignalCode, prn:u8, out:&mut [Complex<f64>]) -> Result<(), TrackingError>;
}

/// Expands +/-1 chips into the sinboc(1,1) subchip sequence.
pub fn sinboc11_expand(chips:&[f64], out:&mut [Complex<f64>]) {
	assert_eq!(out.len(), REPLICA_SAMPLES_PER_CHIP * chips.len());
	for (i, c) in chips.iter().enumerate() {
		out[2*i]     = Complex{ re:  *c, im: 0.0 };
		out[2*i + 1] = Complex{ re: -*c, im: 0.0 };
	}
}

/// Copies the cyclic neighbours into the guard samples.  The code proper
/// occupies indices [2, 2L+2); index 2 always holds chip 2 of the sequence.
pub fn wire_guard_band(code:&mut [Complex<f64>]) {
	assert_eq!(code.len(), GUARDED_CODE_LENGTH);
	let l2 = REPLICA_SAMPLES_PER_CHIP * CODE_LENGTH_CHIPS;
	code[0] = code[l2];
	code[1] = code[l2 + 1];
	code[l2 + 2] = code[2];
	code[l2 + 3] = code[3];
}

/// Code generator backed by a chip table read from disk: one signed byte per
/// chip, 4092 bytes, sign giving the chip value.  Covers one satellite; the
/// PRN and signal it was extracted for are checked on every call.
pub struct CodeTableGenerator {
	signal: SignalCode,
	prn: u8,
	chips: Vec<f64>,
}

impl CodeTableGenerator {

	pub fn from_file(path:&str, signal:SignalCode, prn:u8) -> Result<Self, TrackingError> {
		let raw = std::fs::read(path).map_err(|_| TrackingError::CodeGeneration("Unable to read code table"))?;
		if raw.len() != CODE_LENGTH_CHIPS {
			return Err(TrackingError::CodeGeneration("Code table must hold exactly one chip per byte"));
		}
		let mut chips:Vec<f64> = Vec::with_capacity(CODE_LENGTH_CHIPS);
		for b in raw {
			match b as i8 {
				x if x > 0 => chips.push(1.0),
				x if x < 0 => chips.push(-1.0),
				_ => return Err(TrackingError::CodeGeneration("Zero chip in code table")),
			}
		}
		Ok(Self{ signal, prn, chips })
	}

}

impl CodeGenerator for CodeTableGenerator {

	fn generate(&self, signal:SignalCode, prn:u8, out:&mut [Complex<f64>]) -> Result<(), TrackingError> {
		if signal != self.signal || prn != self.prn {
			return Err(TrackingError::CodeGeneration("Code table was extracted for a different signal"));
		}
		sinboc11_expand(&self.chips, out);
		Ok(())
	}

}

#[cfg(test)]
mod guard_band_tests {

	use super::*;

	#[test]
	fn guard_samples_mirror_the_cyclic_neighbours() {
		let mut code:Vec<Complex<f64>> = (0..GUARDED_CODE_LENGTH).map(|i| Complex{ re: i as f64, im: 0.0 }).collect();
		wire_guard_band(&mut code);
		let l2 = REPLICA_SAMPLES_PER_CHIP * CODE_LENGTH_CHIPS;
		assert_eq!(code[0].re, l2 as f64);
		assert_eq!(code[1].re, (l2 + 1) as f64);
		assert_eq!(code[l2 + 2].re, 2.0);
		assert_eq!(code[l2 + 3].re, 3.0);
	}

	#[test]
	fn sinboc_expansion_alternates_subchips() {
		let chips = vec![1.0, -1.0, 1.0];
		let mut out = vec![Complex{ re: 0.0, im: 0.0 }; 6];
		sinboc11_expand(&chips, &mut out);
		let res:Vec<f64> = out.iter().map(|c| c.re).collect();
		assert_eq!(res, vec![1.0, -1.0, -1.0, 1.0, 1.0, -1.0]);
	}

}
