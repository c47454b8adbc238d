
use std::f64::consts;

use rustfft::num_complex::Complex;

/// Costas-free arctangent phase discriminator on the Prompt correlation.
/// Output is in cycles, bounded to +/- 0.5.
pub fn pll_atan_cycles(prompt:Complex<f64>) -> f64 {
	prompt.im.atan2(prompt.re) / (2.0 * consts::PI)
}

/// Normalized noncoherent very-early-minus-late power discriminator.  Output
/// is dimensionless; the loop design gain is folded into the DLL filter.
pub fn dll_nc_veml_normalized(very_early:Complex<f64>, early:Complex<f64>, late:Complex<f64>, very_late:Complex<f64>) -> f64 {
	let p_early:f64 = very_early.norm() + early.norm();
	let p_late:f64  = late.norm() + very_late.norm();
	if p_early + p_late == 0.0 { 0.0 } else { (p_early - p_late) / (p_early + p_late) }
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn pll_atan_is_in_cycles() {
		assert!((pll_atan_cycles(Complex{ re: 1.0, im: 0.0 })).abs() < 1.0e-12);
		assert!((pll_atan_cycles(Complex{ re: 0.0, im: 1.0 }) - 0.25).abs() < 1.0e-12);
		assert!((pll_atan_cycles(Complex{ re: 0.0, im: -1.0 }) + 0.25).abs() < 1.0e-12);
		// the wrap point sits at half a cycle
		assert!(pll_atan_cycles(Complex{ re: -1.0, im: 1.0e-9 }) < 0.5);
		assert!(pll_atan_cycles(Complex{ re: -1.0, im: 1.0e-9 }) > 0.49);
	}

	#[test]
	fn dll_veml_sign_follows_the_stronger_side() {
		let hi = Complex{ re: 2.0, im: 0.0 };
		let lo = Complex{ re: 1.0, im: 0.0 };
		assert!(dll_nc_veml_normalized(hi, hi, lo, lo) > 0.0);
		assert!(dll_nc_veml_normalized(lo, lo, hi, hi) < 0.0);
		assert_eq!(dll_nc_veml_normalized(hi, lo, lo, hi), 0.0);
	}

	#[test]
	fn dll_veml_handles_an_all_zero_block() {
		let z = Complex{ re: 0.0, im: 0.0 };
		assert_eq!(dll_nc_veml_normalized(z, z, z, z), 0.0);
	}

}
