
pub trait ScalarFilter {

	fn apply(&mut self, x:f64) -> f64;
	fn initialize(&mut self, x0:f64);

}

/* Bilinear-transform realization of the classic second-order analog loop
filter.  The output is the NCO command; the (e + e_prev) term is the
integrator, so the command persists after the error goes to zero. */
pub struct SecondOrderLoopFilter { pub tau1: f64, pub tau2: f64, pub pdi: f64,
								   last_error: f64, last_nco: f64 }

impl SecondOrderLoopFilter {

	pub fn new(tau1:f64, tau2:f64, pdi:f64) -> Self { Self { tau1, tau2, pdi, last_error: 0.0, last_nco: 0.0 } }

}

impl ScalarFilter for SecondOrderLoopFilter {

	fn apply(&mut self, x:f64) -> f64 {
		let nco = self.last_nco
			+ (self.tau2 / self.tau1) * (x - self.last_error)
			+ (x + self.last_error) * (self.pdi / (2.0 * self.tau1));
		self.last_nco = nco;
		self.last_error = x;
		nco
	}

	// The initial estimate is applied outside the loop (the NCO command is an
	// offset from it), so taking it here just resets the integrator.
	fn initialize(&mut self, _x0:f64) {
		self.last_error = 0.0;
		self.last_nco = 0.0;
	}

}

fn loop_coefficients(bw_hz:f64, zeta:f64, k:f64) -> (f64, f64) {
	let wn = (bw_hz * 8.0 * zeta) / (4.0 * zeta * zeta + 1.0);
	(k / (wn * wn), (2.0 * zeta) / wn)
}

pub fn new_pll_filter(bw_hz:f64, pdi:f64) -> SecondOrderLoopFilter {
	let (tau1, tau2) = loop_coefficients(bw_hz, 0.7, 0.25);
	SecondOrderLoopFilter::new(tau1, tau2, pdi)
}

pub fn new_dll_filter(bw_hz:f64, pdi:f64) -> SecondOrderLoopFilter {
	let (tau1, tau2) = loop_coefficients(bw_hz, 0.7, 1.0);
	SecondOrderLoopFilter::new(tau1, tau2, pdi)
}

#[test]
fn loop_filter_integrates_constant_error() {
	let mut f = new_pll_filter(50.0, 0.004);
	f.initialize(0.0);
	let mut last = 0.0;
	for _ in 0..100 {
		let nco = f.apply(0.1);
		assert!(nco > last);	// type-2 loop keeps ramping on a constant error
		last = nco;
	}
}

#[test]
fn loop_filter_holds_command_after_error_vanishes() {
	let mut f = new_dll_filter(2.0, 0.004);
	f.initialize(0.0);
	for _ in 0..50 { f.apply(0.25); }
	let held = f.apply(0.0);
	for _ in 0..20 {
		let nco = f.apply(0.0);
		assert!((nco - held).abs() < 1.0e-12);
	}
}
