
use std::f64::consts;

use colored::Colorize;
use rustfft::num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::TrackingError;
use crate::filters::{self, ScalarFilter, SecondOrderLoopFilter};
use crate::gnss::common::{AcquisitionHandoff, GnssSynchro, GnssSystem, SignalCode};
use crate::gnss::galileo_e1::{self, CodeGenerator,
	CODE_CHIP_RATE_HZ, CODE_LENGTH_CHIPS, CODE_PERIOD_SEC, GUARDED_CODE_LENGTH, REPLICA_SAMPLES_PER_CHIP};
use crate::gnss::tracking::{correlator, discriminators, lock_detectors, EventSink, TrackingEvent};
use crate::io::{DumpRecord, TrackingDumpWriter};


const CN0_ESTIMATION_SAMPLES:usize = 10;
const MINIMUM_VALID_CN0_DB_HZ:f64 = 25.0;
const MAXIMUM_LOCK_FAIL_COUNTER:u32 = 200;
// NBD/NBP stays within +/-1, so the CN0 floor is the effective unlock trigger
const CARRIER_LOCK_THRESHOLD:f64 = 20.0;

const ZERO:Complex<f64> = Complex{ re: 0.0, im: 0.0 };

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
	pub if_freq_hz: f64,
	pub fs_in_hz: f64,
	pub prn_length_samples: usize,
	pub channel_id: usize,
	pub pll_bw_hz: f64,
	pub dll_bw_hz: f64,
	pub early_late_space_chips: f64,
	pub very_early_late_space_chips: f64,
	pub dump: bool,
	pub dump_path_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
	Disabled,
	PullIn,
	Tracking,
}

/// Outcome of one work call: how many input samples were consumed and, except
/// during pull-in, the synchronization record for this PRN period.
#[derive(Debug, Clone)]
pub struct WorkStatus {
	pub consumed: usize,
	pub record: Option<GnssSynchro>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingDebug {
	pub state: String,
	pub carrier_doppler_hz: f64,
	pub code_freq_hz: f64,
	pub prompt_re: f64,
	pub prompt_im: f64,
	pub cn0_db_hz: f64,
	pub carrier_lock_test: f64,
	pub prn_length_samples: usize,
}

pub struct VemlTracking {
	// configuration, immutable for the life of the instance
	if_freq_hz: f64,
	fs_in: f64,
	vector_length: usize,
	channel_id: usize,
	early_late_space_chips: f64,
	very_early_late_space_chips: f64,

	code_generator: Box<dyn CodeGenerator>,
	event_sink: Option<Box<dyn EventSink>>,
	dump: Option<TrackingDumpWriter>,

	state: TrackingState,

	// acquisition hand-off
	handoff: Option<AcquisitionHandoff>,
	prn: u8,
	signal: SignalCode,
	system: GnssSystem,
	acq_code_phase_samples: f64,
	acq_carrier_doppler_hz: f64,
	acq_sample_stamp: u64,

	sample_counter: u64,
	last_whole_second: u64,

	// NCOs and loop filters
	carrier_loop_filter: SecondOrderLoopFilter,
	code_loop_filter: SecondOrderLoopFilter,
	carrier_doppler_hz: f64,
	code_freq_hz: f64,
	rem_carr_phase_rad: f64,
	acc_carrier_phase_rad: f64,
	rem_code_phase_samples: f64,
	next_rem_code_phase_samples: f64,
	current_prn_length_samples: usize,
	next_prn_length_samples: usize,

	// replica buffers, allocated once at construction and reused
	spreading_code: Vec<Complex<f64>>,
	very_early_code: Vec<Complex<f64>>,
	carrier_wipeoff: Vec<Complex<f64>>,
	el_space_samples: usize,
	ve_space_samples: usize,

	// correlator outputs of the latest block
	very_early: Complex<f64>,
	early: Complex<f64>,
	prompt: Complex<f64>,
	late: Complex<f64>,
	very_late: Complex<f64>,

	// CN0 estimation and lock detection
	prompt_window: [Complex<f64>; CN0_ESTIMATION_SAMPLES],
	window_fill: usize,
	cn0_db_hz: f64,
	carrier_lock_test: f64,
	lock_fail_counter: u32,

	// latest loop commands, kept for the dump stream
	last_carr_error: f64,
	last_carr_nco: f64,
	last_code_error: f64,
	last_code_nco: f64,
}

impl VemlTracking {

	pub fn new(cfg:&TrackingConfig, code_generator:Box<dyn CodeGenerator>, event_sink:Option<Box<dyn EventSink>>) -> Result<Self, TrackingError> {

		if !(cfg.fs_in_hz > 0.0) {
			return Err(TrackingError::InvalidConfig("sample rate must be positive"));
		}
		if cfg.fs_in_hz < 2.0 * CODE_CHIP_RATE_HZ {
			return Err(TrackingError::InvalidConfig("sample rate must cover at least two samples per chip"));
		}
		if !(cfg.pll_bw_hz > 0.0) || !(cfg.dll_bw_hz > 0.0) {
			return Err(TrackingError::InvalidConfig("loop noise bandwidths must be positive"));
		}
		if !(cfg.early_late_space_chips > 0.0) {
			return Err(TrackingError::InvalidConfig("early-late offset must be positive"));
		}
		if cfg.very_early_late_space_chips <= cfg.early_late_space_chips {
			return Err(TrackingError::InvalidConfig("very-early offset must exceed the early-late offset"));
		}
		let nominal_length = cfg.fs_in_hz * CODE_PERIOD_SEC;
		if (cfg.prn_length_samples as f64 - nominal_length).abs() > 1.0 {
			return Err(TrackingError::InvalidConfig("PRN length in samples does not match the sample rate"));
		}

		let dump = if cfg.dump {
			Some(TrackingDumpWriter::create(&cfg.dump_path_prefix, cfg.channel_id)
				.map_err(|_| TrackingError::DumpFile("Unable to create tracking dump file"))?)
		} else { None };

		Ok(VemlTracking {
			if_freq_hz: cfg.if_freq_hz,
			fs_in: cfg.fs_in_hz,
			vector_length: cfg.prn_length_samples,
			channel_id: cfg.channel_id,
			early_late_space_chips: cfg.early_late_space_chips,
			very_early_late_space_chips: cfg.very_early_late_space_chips,

			code_generator,
			event_sink,
			dump,

			state: TrackingState::Disabled,

			handoff: None,
			prn: 0,
			signal: SignalCode::default(),
			system: GnssSystem::default(),
			acq_code_phase_samples: 0.0,
			acq_carrier_doppler_hz: 0.0,
			acq_sample_stamp: 0,

			sample_counter: 0,
			last_whole_second: 0,

			carrier_loop_filter: filters::new_pll_filter(cfg.pll_bw_hz, CODE_PERIOD_SEC),
			code_loop_filter: filters::new_dll_filter(cfg.dll_bw_hz, CODE_PERIOD_SEC),
			carrier_doppler_hz: 0.0,
			code_freq_hz: CODE_CHIP_RATE_HZ,
			rem_carr_phase_rad: 0.0,
			acc_carrier_phase_rad: 0.0,
			rem_code_phase_samples: 0.0,
			next_rem_code_phase_samples: 0.0,
			current_prn_length_samples: cfg.prn_length_samples,
			next_prn_length_samples: cfg.prn_length_samples,

			spreading_code: vec![ZERO; GUARDED_CODE_LENGTH],
			very_early_code: vec![ZERO; 2 * cfg.prn_length_samples],
			carrier_wipeoff: vec![ZERO; 2 * cfg.prn_length_samples],
			el_space_samples: 0,
			ve_space_samples: 0,

			very_early: ZERO,
			early: ZERO,
			prompt: ZERO,
			late: ZERO,
			very_late: ZERO,

			prompt_window: [ZERO; CN0_ESTIMATION_SAMPLES],
			window_fill: 0,
			cn0_db_hz: 0.0,
			carrier_lock_test: 1.0,
			lock_fail_counter: 0,

			last_carr_error: 0.0,
			last_carr_nco: 0.0,
			last_code_error: 0.0,
			last_code_nco: 0.0,
		})
	}

	// Read-only getter methods
	pub fn state(&self) -> TrackingState { self.state }
	pub fn if_freq_hz(&self) -> f64 { self.if_freq_hz }
	pub fn channel_id(&self) -> usize { self.channel_id }
	pub fn carrier_doppler_hz(&self) -> f64 { self.carrier_doppler_hz }
	pub fn code_freq_hz(&self) -> f64 { self.code_freq_hz }
	pub fn prompt(&self) -> Complex<f64> { self.prompt }
	pub fn acc_carrier_phase_rad(&self) -> f64 { self.acc_carrier_phase_rad }
	pub fn rem_code_phase_samples(&self) -> f64 { self.rem_code_phase_samples }
	pub fn next_rem_code_phase_samples(&self) -> f64 { self.next_rem_code_phase_samples }
	pub fn next_prn_length_samples(&self) -> usize { self.next_prn_length_samples }
	pub fn sample_counter(&self) -> u64 { self.sample_counter }
	pub fn last_cn0_snv_db_hz(&self) -> f64 { self.cn0_db_hz }
	pub fn last_carrier_lock_test(&self) -> f64 { self.carrier_lock_test }
	pub fn lock_fail_counter(&self) -> u32 { self.lock_fail_counter }

	pub fn debug(&self) -> TrackingDebug {
		TrackingDebug {
			state: format!("{:?}", self.state),
			carrier_doppler_hz: self.carrier_doppler_hz,
			code_freq_hz: self.code_freq_hz,
			prompt_re: self.prompt.re,
			prompt_im: self.prompt.im,
			cn0_db_hz: self.cn0_db_hz,
			carrier_lock_test: self.carrier_lock_test,
			prn_length_samples: self.current_prn_length_samples,
		}
	}

	/// How many input samples must be available before `work` is invoked.
	pub fn forecast(&self) -> usize { 2 * self.vector_length }

	pub fn set_acquisition(&mut self, handoff:AcquisitionHandoff) {
		self.handoff = Some(handoff);
	}

	/// Arms the loop from the acquisition hand-off.  Validates the hand-off,
	/// regenerates the guarded local code and resets every loop accumulator;
	/// the next work call performs the one-shot pull-in alignment.
	pub fn start_tracking(&mut self) -> Result<(), TrackingError> {

		let handoff = self.handoff.clone().ok_or(TrackingError::MissingAcquisition)?;
		let signal = SignalCode::from_descriptor(&handoff.signal_code)?;
		let system = GnssSystem::from_char(handoff.system)?;

		let code_len = REPLICA_SAMPLES_PER_CHIP * CODE_LENGTH_CHIPS;
		self.code_generator.generate(signal, handoff.prn, &mut self.spreading_code[2 .. 2 + code_len])?;
		galileo_e1::wire_guard_band(&mut self.spreading_code);

		self.carrier_loop_filter.initialize(handoff.doppler_hz);
		self.code_loop_filter.initialize(handoff.delay_samples);

		self.prn = handoff.prn;
		self.signal = signal;
		self.system = system;
		self.acq_code_phase_samples = handoff.delay_samples;
		self.acq_carrier_doppler_hz = handoff.doppler_hz;
		self.acq_sample_stamp = handoff.sample_stamp;

		self.carrier_doppler_hz = handoff.doppler_hz;
		self.code_freq_hz = CODE_CHIP_RATE_HZ;
		self.rem_carr_phase_rad = 0.0;
		self.acc_carrier_phase_rad = 0.0;
		self.rem_code_phase_samples = 0.0;
		self.next_rem_code_phase_samples = 0.0;
		self.current_prn_length_samples = self.vector_length;
		self.next_prn_length_samples = self.vector_length;

		self.very_early = ZERO;
		self.early = ZERO;
		self.prompt = ZERO;
		self.late = ZERO;
		self.very_late = ZERO;

		self.window_fill = 0;
		self.cn0_db_hz = 0.0;
		self.carrier_lock_test = 1.0;
		self.lock_fail_counter = 0;

		self.state = TrackingState::PullIn;

		log::warn!("{} on channel {} for {} PRN {} ({}): Doppler {:+.0} Hz, code phase {:.1} samples",
			"Tracking start".green(), self.channel_id, system.name(), handoff.prn, signal.name(),
			handoff.doppler_hz, handoff.delay_samples);

		Ok(())
	}

	/// One invocation of the engine.  `input` is borrowed from the runtime and
	/// must hold at least `forecast()` samples.
	pub fn work(&mut self, input:&[Complex<f64>]) -> WorkStatus {
		match self.state {
			TrackingState::Disabled => self.work_disabled(),
			TrackingState::PullIn   => self.pull_in(input),
			TrackingState::Tracking => self.track_block(input),
		}
	}

	fn work_disabled(&mut self) -> WorkStatus {
		self.very_early = ZERO;
		self.early = ZERO;
		self.prompt = ZERO;
		self.late = ZERO;
		self.very_late = ZERO;

		let record = GnssSynchro{ channel_id: self.channel_id, ..Default::default() };
		self.write_dump_record();

		let consumed = self.current_prn_length_samples;
		self.sample_counter += consumed as u64;
		WorkStatus{ consumed, record: Some(record) }
	}

	/* One-shot alignment between the acquisition estimate and the block
	boundary: skip enough input so that the next block starts exactly on the
	predicted code epoch.  No correlator output is produced. */
	fn pull_in(&mut self, input:&[Complex<f64>]) -> WorkStatus {
		let block = self.next_prn_length_samples as f64;
		let acq_to_trk_delay = self.sample_counter as i64 - self.acq_sample_stamp as i64;
		let correction = block - (acq_to_trk_delay as f64) % block;
		let offset = (self.acq_code_phase_samples + correction).round() as usize;

		assert!(offset <= input.len(), "runtime provided fewer samples than forecast");

		self.sample_counter += offset as u64;
		self.state = TrackingState::Tracking;
		WorkStatus{ consumed: offset, record: None }
	}

	fn track_block(&mut self, input:&[Complex<f64>]) -> WorkStatus {
		self.current_prn_length_samples = self.next_prn_length_samples;
		self.rem_code_phase_samples = self.next_rem_code_phase_samples;

		let n = self.current_prn_length_samples;
		assert!(n <= input.len(), "runtime provided fewer samples than forecast");

		self.update_local_code();
		self.update_local_carrier();

		let ve_s = self.ve_space_samples;
		let el_s = self.el_space_samples;
		let [ve, e, p, l, vl] = correlator::wipeoff_and_veml(
			&input[..n],
			&self.carrier_wipeoff[..n],
			&self.very_early_code[0 .. n],
			&self.very_early_code[ve_s - el_s .. ve_s - el_s + n],
			&self.very_early_code[ve_s .. ve_s + n],
			&self.very_early_code[ve_s + el_s .. ve_s + el_s + n],
			&self.very_early_code[2*ve_s .. 2*ve_s + n]);
		self.very_early = ve;
		self.early = e;
		self.prompt = p;
		self.late = l;
		self.very_late = vl;

		// carrier loop
		let carr_error = discriminators::pll_atan_cycles(p);
		let carr_nco = self.carrier_loop_filter.apply(carr_error);
		self.carrier_doppler_hz = self.acq_carrier_doppler_hz + carr_nco;

		// code loop
		let code_error = discriminators::dll_nc_veml_normalized(ve, e, l, vl);
		let code_nco = self.code_loop_filter.apply(code_error);
		self.code_freq_hz = CODE_CHIP_RATE_HZ - code_nco;

		self.last_carr_error = carr_error;
		self.last_carr_nco = carr_nco;
		self.last_code_error = code_error;
		self.last_code_nco = code_nco;

		/* Block-length scheduler: the next block spans one PRN period at the
		updated chipping rate, plus the residual carried into this block; the
		sub-sample rounding error is carried forward so the replica alignment
		never drifts by more than one sample. */
		let t_prn_samples = (CODE_LENGTH_CHIPS as f64 / self.code_freq_hz) * self.fs_in;
		let k_blk_samples = t_prn_samples + self.rem_code_phase_samples;
		self.next_prn_length_samples = k_blk_samples.round() as usize;
		self.next_rem_code_phase_samples = k_blk_samples - self.next_prn_length_samples as f64;

		self.update_lock_monitor();

		let record = GnssSynchro {
			prn: self.prn,
			signal: self.signal,
			system: self.system,
			channel_id: self.channel_id,
			prompt_i: self.prompt.im,
			prompt_q: self.prompt.re,
			tracking_timestamp_secs: (self.sample_counter as f64
				+ self.next_prn_length_samples as f64
				+ self.next_rem_code_phase_samples) / self.fs_in,
			// the timestamp above is aligned with the PRN start sample
			code_phase_secs: 0.0,
			carrier_phase_rads: self.acc_carrier_phase_rad,
			cn0_db_hz: self.cn0_db_hz,
		};

		self.write_dump_record();
		self.log_once_per_second();

		let consumed = self.current_prn_length_samples;
		self.sample_counter += consumed as u64;
		WorkStatus{ consumed, record: Some(record) }
	}

	/* Resamples the guarded local code at the current chipping rate into one
	long very-early buffer; the other four taps are offset views into it, so
	all five replicas share the same Doppler-adjusted chip timing. */
	fn update_local_code(&mut self) {
		let code_phase_step_chips = self.code_freq_hz / self.fs_in;
		let code_phase_step_half_chips = 2.0 * self.code_freq_hz / self.fs_in;
		let rem_code_phase_half_chips = self.rem_code_phase_samples * code_phase_step_half_chips;
		let code_length_half_chips = (REPLICA_SAMPLES_PER_CHIP * CODE_LENGTH_CHIPS) as f64;

		self.el_space_samples = (self.early_late_space_chips / code_phase_step_chips).round() as usize;
		self.ve_space_samples = (self.very_early_late_space_chips / code_phase_step_chips).round() as usize;

		let loop_length = self.current_prn_length_samples + 2 * self.ve_space_samples;
		let bias_half_chips = 2.0 * self.very_early_late_space_chips;

		let mut tcode_half_chips = -rem_code_phase_half_chips;
		for i in 0..loop_length {
			let associated_chip_index = 2 + ((tcode_half_chips - bias_half_chips) % code_length_half_chips).round() as isize;
			debug_assert!(associated_chip_index >= 0 && (associated_chip_index as usize) < GUARDED_CODE_LENGTH);
			self.very_early_code[i] = self.spreading_code[associated_chip_index as usize];
			tcode_half_chips += code_phase_step_half_chips;
		}
	}

	fn update_local_carrier(&mut self) {
		let phase_step_rad = 2.0 * consts::PI * self.carrier_doppler_hz / self.fs_in;
		let mut phase_rad = self.rem_carr_phase_rad;
		for i in 0..self.current_prn_length_samples {
			self.carrier_wipeoff[i] = Complex{ re: phase_rad.cos(), im: phase_rad.sin() };
			phase_rad += phase_step_rad;
		}
		// the residual stays in [0, 2pi) so the accumulated phase never steps back
		self.rem_carr_phase_rad = phase_rad.rem_euclid(2.0 * consts::PI);
		self.acc_carrier_phase_rad += self.rem_carr_phase_rad;
	}

	/* Ten Prompt outputs fill the window; the eleventh period evaluates it.
	Failures accumulate, successes pay them down, and a run of failures beyond
	the limit disables the channel and notifies the embedder exactly once. */
	fn update_lock_monitor(&mut self) {
		if self.window_fill < CN0_ESTIMATION_SAMPLES {
			self.prompt_window[self.window_fill] = self.prompt;
			self.window_fill += 1;
			return;
		}
		self.window_fill = 0;
		self.cn0_db_hz = lock_detectors::cn0_svn_estimator(&self.prompt_window, self.fs_in, CODE_LENGTH_CHIPS as f64);
		self.carrier_lock_test = lock_detectors::carrier_lock_detector(&self.prompt_window);

		if self.carrier_lock_test.abs() > CARRIER_LOCK_THRESHOLD || self.cn0_db_hz < MINIMUM_VALID_CN0_DB_HZ {
			self.lock_fail_counter += 1;
		} else if self.lock_fail_counter > 0 {
			self.lock_fail_counter -= 1;
		}

		if self.lock_fail_counter > MAXIMUM_LOCK_FAIL_COUNTER {
			log::warn!("{} on channel {} ({} PRN {}), CN0 = {:.2} dB-Hz",
				"Loss of lock".red(), self.channel_id, self.system.name(), self.prn, self.cn0_db_hz);
			if let Some(sink) = self.event_sink.as_mut() {
				sink.emit(TrackingEvent::LossOfLock{ channel_id: self.channel_id });
			}
			self.lock_fail_counter = 0;
			self.state = TrackingState::Disabled;
		}
	}

	fn write_dump_record(&mut self) {
		if self.dump.is_none() { return; }
		let rec = DumpRecord {
			abs_ve: self.very_early.norm() as f32,
			abs_e:  self.early.norm() as f32,
			abs_p:  self.prompt.norm() as f32,
			abs_l:  self.late.norm() as f32,
			abs_vl: self.very_late.norm() as f32,
			prompt_i: self.prompt.im as f32,
			prompt_q: self.prompt.re as f32,
			sample_counter: self.sample_counter,
			acc_carrier_phase_rad: self.acc_carrier_phase_rad as f32,
			carrier_doppler_hz: self.carrier_doppler_hz as f32,
			code_freq_hz: self.code_freq_hz as f32,
			carr_error: self.last_carr_error as f32,
			carr_nco: self.last_carr_nco as f32,
			code_error: self.last_code_error as f32,
			code_nco: self.last_code_nco as f32,
			cn0_db_hz: self.cn0_db_hz as f32,
			carrier_lock_test: self.carrier_lock_test as f32,
			rem_code_phase_samples: self.rem_code_phase_samples as f32,
			block_end_sample: (self.sample_counter + self.current_prn_length_samples as u64) as f64,
		};
		if let Some(dump) = self.dump.as_mut() {
			dump.write_record(&rec);
		}
	}

	fn log_once_per_second(&mut self) {
		let seg = (self.sample_counter as f64 / self.fs_in) as u64;
		if seg != self.last_whole_second {
			self.last_whole_second = seg;
			log::info!("Tracking CH {}: {} PRN {}, CN0 = {:.2} dB-Hz",
				self.channel_id, self.system.name(), self.prn, self.cn0_db_hz);
		}
	}

}
