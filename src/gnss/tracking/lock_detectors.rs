
use rustfft::num_complex::Complex;

/// Signal-to-noise-variance CN0 estimator over a window of Prompt outputs.
/// The signal power estimate comes from the mean in-phase magnitude, the
/// total power from the mean squared magnitude; the correction terms convert
/// the SNR into dB-Hz for a coherent integration spanning one code period at
/// `fs_in_hz`.
pub fn cn0_svn_estimator(prompt_window:&[Complex<f64>], fs_in_hz:f64, code_length_chips:f64) -> f64 {
	let n:f64 = prompt_window.len() as f64;
	let p_sig:f64 = {
		let sum:f64 = prompt_window.iter().map(|c| c.re.abs()).sum();
		(sum / n).powi(2)
	};
	let p_tot:f64 = {
		let sum:f64 = prompt_window.iter().map(|c| c.re*c.re + c.im*c.im).sum();
		sum / n
	};
	let snr = p_sig / (p_tot - p_sig);
	10.0 * snr.log10() + 10.0 * (fs_in_hz / 2.0).log10() - 10.0 * code_length_chips.log10()
}

/// Narrowband-difference over narrowband-power carrier lock statistic.
/// Approaches +1 when the Prompt energy sits in the in-phase arm.
pub fn carrier_lock_detector(prompt_window:&[Complex<f64>]) -> f64 {
	let tmp_sum_i:f64 = prompt_window.iter().map(|c| c.re).sum();
	let tmp_sum_q:f64 = prompt_window.iter().map(|c| c.im).sum();
	let nbp:f64 = tmp_sum_i * tmp_sum_i + tmp_sum_q * tmp_sum_q;
	let nbd:f64 = tmp_sum_i * tmp_sum_i - tmp_sum_q * tmp_sum_q;
	nbd / nbp
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn carrier_lock_detector_on_clean_inphase_prompts() {
		let window:Vec<Complex<f64>> = (0..10).map(|_| Complex{ re: 1000.0, im: 1.0 }).collect();
		let stat = carrier_lock_detector(&window);
		assert!(stat > 0.99 && stat <= 1.0);
	}

	#[test]
	fn carrier_lock_detector_on_quadrature_prompts() {
		let window:Vec<Complex<f64>> = (0..10).map(|_| Complex{ re: 1.0, im: 1000.0 }).collect();
		assert!(carrier_lock_detector(&window) < -0.99);
	}

	#[test]
	fn cn0_estimator_tracks_the_snr() {
		// +/- alternating quadrature noise keeps p_tot above p_sig
		let strong:Vec<Complex<f64>> = (0..10).map(|i| Complex{ re: 100.0, im: if i % 2 == 0 { 10.0 } else { -10.0 } }).collect();
		let weak:Vec<Complex<f64>> = (0..10).map(|i| Complex{ re: 100.0, im: if i % 2 == 0 { 80.0 } else { -80.0 } }).collect();
		let cn0_strong = cn0_svn_estimator(&strong, 4.092e6, 4092.0);
		let cn0_weak = cn0_svn_estimator(&weak, 4.092e6, 4092.0);
		assert!(cn0_strong > cn0_weak);
		assert!(cn0_strong > 40.0);
	}

}
