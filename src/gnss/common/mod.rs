
use serde::{Serialize, Deserialize};

use crate::TrackingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GnssSystem {
	Gps,
	Glonass,
	Sbas,
	Galileo,
	Compass,
}

impl GnssSystem {

	pub fn from_char(c:char) -> Result<Self, TrackingError> {
		match c {
			'G' => Ok(GnssSystem::Gps),
			'R' => Ok(GnssSystem::Glonass),
			'S' => Ok(GnssSystem::Sbas),
			'E' => Ok(GnssSystem::Galileo),
			'C' => Ok(GnssSystem::Compass),
			_   => Err(TrackingError::UnknownSystem),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			GnssSystem::Gps     => "GPS",
			GnssSystem::Glonass => "GLONASS",
			GnssSystem::Sbas    => "SBAS",
			GnssSystem::Galileo => "Galileo",
			GnssSystem::Compass => "Compass",
		}
	}

}

impl Default for GnssSystem {
	fn default() -> Self { GnssSystem::Galileo }
}

/// Galileo E1 open-service components; selects what the external code
/// generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalCode {
	E1b,
	E1c,
	E1bc,
}

impl SignalCode {

	/// Parses the signal descriptor carried in the acquisition hand-off.
	pub fn from_descriptor(s:&str) -> Result<Self, TrackingError> {
		match s {
			"1B"   => Ok(SignalCode::E1b),
			"1C"   => Ok(SignalCode::E1c),
			"1B+C" => Ok(SignalCode::E1bc),
			_      => Err(TrackingError::UnknownSignal),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			SignalCode::E1b  => "1B",
			SignalCode::E1c  => "1C",
			SignalCode::E1bc => "1B+C",
		}
	}

}

impl Default for SignalCode {
	fn default() -> Self { SignalCode::E1b }
}

/// What the acquisition stage hands over before `start_tracking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionHandoff {
	pub prn: u8,
	pub signal_code: String,
	pub system: char,
	pub delay_samples: f64,
	pub doppler_hz: f64,
	pub sample_stamp: u64,
}

/// One synchronization record per PRN period, timestamped at the PRN start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnssSynchro {
	pub prn: u8,
	pub signal: SignalCode,
	pub system: GnssSystem,
	pub channel_id: usize,
	pub prompt_i: f64,
	pub prompt_q: f64,
	pub tracking_timestamp_secs: f64,
	pub code_phase_secs: f64,
	pub carrier_phase_rads: f64,
	pub cn0_db_hz: f64,
}

impl Default for GnssSynchro {
	fn default() -> Self {
		GnssSynchro {
			prn: 0,
			signal: SignalCode::default(),
			system: GnssSystem::default(),
			channel_id: 0,
			prompt_i: 0.0,
			prompt_q: 0.0,
			tracking_timestamp_secs: 0.0,
			code_phase_secs: 0.0,
			carrier_phase_rads: 0.0,
			cn0_db_hz: 0.0,
		}
	}
}

#[test]
fn system_codes_round_trip() {
	for (c, name) in [('G', "GPS"), ('R', "GLONASS"), ('S', "SBAS"), ('E', "Galileo"), ('C', "Compass")].iter() {
		assert_eq!(GnssSystem::from_char(*c).unwrap().name(), *name);
	}
	assert_eq!(GnssSystem::from_char('X'), Err(TrackingError::UnknownSystem));
}

#[test]
fn signal_descriptors_are_a_closed_set() {
	assert_eq!(SignalCode::from_descriptor("1B"), Ok(SignalCode::E1b));
	assert_eq!(SignalCode::from_descriptor("1C"), Ok(SignalCode::E1c));
	assert_eq!(SignalCode::from_descriptor("1B+C"), Ok(SignalCode::E1bc));
	assert_eq!(SignalCode::from_descriptor("5X"), Err(TrackingError::UnknownSignal));
}
