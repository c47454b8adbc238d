
use rustfft::num_complex::Complex;

/* Hot kernel: one pass over the block doing carrier wipeoff and all five
code accumulations.  Written branch-free over equal-length slices so LLVM can
auto-vectorize it (SSE/AVX on x86-64, NEON on aarch64); build with
`-C target-cpu=native` to get the wide registers.  Accumulation runs in
single precision like the sample stream itself; everything downstream of the
five scalars is double precision. */
#[inline]
pub fn wipeoff_and_veml(input:&[Complex<f64>],
						carrier:&[Complex<f64>],
						very_early:&[Complex<f64>],
						early:&[Complex<f64>],
						prompt:&[Complex<f64>],
						late:&[Complex<f64>],
						very_late:&[Complex<f64>]) -> [Complex<f64>; 5] {

	let n = input.len();
	assert!(carrier.len() == n && very_early.len() == n && early.len() == n
		&& prompt.len() == n && late.len() == n && very_late.len() == n);

	// replica chips are real-valued (+/-1 subchips), so each tap is a scale
	// of the wiped sample rather than a full complex multiply

	let mut ve_re = 0.0f32; let mut ve_im = 0.0f32;
	let mut e_re  = 0.0f32; let mut e_im  = 0.0f32;
	let mut p_re  = 0.0f32; let mut p_im  = 0.0f32;
	let mut l_re  = 0.0f32; let mut l_im  = 0.0f32;
	let mut vl_re = 0.0f32; let mut vl_im = 0.0f32;

	for i in 0..n {
		// baseband sample after conjugate carrier wipeoff
		let bb_re = (input[i].re * carrier[i].re + input[i].im * carrier[i].im) as f32;
		let bb_im = (input[i].im * carrier[i].re - input[i].re * carrier[i].im) as f32;

		let c = very_early[i].re as f32;
		ve_re += bb_re * c; ve_im += bb_im * c;

		let c = early[i].re as f32;
		e_re += bb_re * c; e_im += bb_im * c;

		let c = prompt[i].re as f32;
		p_re += bb_re * c; p_im += bb_im * c;

		let c = late[i].re as f32;
		l_re += bb_re * c; l_im += bb_im * c;

		let c = very_late[i].re as f32;
		vl_re += bb_re * c; vl_im += bb_im * c;
	}

	[Complex{ re: ve_re as f64, im: ve_im as f64 },
	 Complex{ re: e_re  as f64, im: e_im  as f64 },
	 Complex{ re: p_re  as f64, im: p_im  as f64 },
	 Complex{ re: l_re  as f64, im: l_im  as f64 },
	 Complex{ re: vl_re as f64, im: vl_im as f64 }]
}

#[cfg(test)]
mod tests {

	use super::*;

	fn tone(n:usize, cycles_per_block:f64) -> Vec<Complex<f64>> {
		(0..n).map(|i| {
			let phase = 2.0 * std::f64::consts::PI * cycles_per_block * (i as f64) / (n as f64);
			Complex{ re: phase.cos(), im: phase.sin() }
		}).collect()
	}

	#[test]
	fn prompt_accumulates_block_energy_on_a_matched_replica() {
		let n = 4096;
		let code:Vec<Complex<f64>> = (0..n).map(|i| Complex{ re: if (i / 7) % 2 == 0 { 1.0 } else { -1.0 }, im: 0.0 }).collect();
		let flat = tone(n, 0.0);
		let [ve, e, p, l, vl] = wipeoff_and_veml(&code, &flat, &code, &code, &code, &code, &code);
		for x in [ve, e, p, l, vl].iter() {
			assert!((x.re - n as f64).abs() < 1.0e-1);
			assert!(x.im.abs() < 1.0e-1);
		}
	}

	#[test]
	fn wipeoff_rotates_against_the_carrier() {
		// input carries exactly the wipeoff tone; after wipeoff the residual is flat
		let n = 4096;
		let carr = tone(n, 17.0);
		let ones:Vec<Complex<f64>> = (0..n).map(|_| Complex{ re: 1.0, im: 0.0 }).collect();
		let [_, _, p, _, _] = wipeoff_and_veml(&carr, &carr, &ones, &ones, &ones, &ones, &ones);
		assert!((p.re - n as f64).abs() < 1.0e-1);
		assert!(p.im.abs() < 1.0e-1);
	}

	#[test]
	fn unmatched_tone_collapses_the_accumulation() {
		// a whole number of residual cycles integrates to ~zero
		let n = 4096;
		let carr = tone(n, 0.0);
		let input = tone(n, 3.0);
		let ones:Vec<Complex<f64>> = (0..n).map(|_| Complex{ re: 1.0, im: 0.0 }).collect();
		let [_, _, p, _, _] = wipeoff_and_veml(&input, &carr, &ones, &ones, &ones, &ones, &ones);
		assert!(p.norm() < 1.0e-1);
	}

}
