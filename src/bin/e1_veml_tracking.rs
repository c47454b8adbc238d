
extern crate clap;
extern crate colored;
extern crate galileo_e1_tracking;
extern crate rustfft;
extern crate serde_json;

use clap::{Arg, App};
use colored::*;
use rustfft::num_complex::Complex;

use galileo_e1_tracking::gnss::common::{AcquisitionHandoff, SignalCode};
use galileo_e1_tracking::gnss::galileo_e1::CodeTableGenerator;
use galileo_e1_tracking::gnss::galileo_e1::tracking::{TrackingConfig, TrackingDebug, TrackingState, VemlTracking};
use galileo_e1_tracking::io;

fn main() {

	let matches = App::new("Galileo E1 VEML Tracking")
		.version("0.1.0")
		.about("Takes baseband IQ samples and runs one DLL+PLL VEML tracking channel for the Galileo E1 open service signal")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename (interleaved LE i16 I/Q)")
			.required(true).takes_value(true))
		.arg(Arg::with_name("sample_rate_sps")
			.short("s").long("sample_rate_sps")
			.takes_value(true).required(true))
		.arg(Arg::with_name("prn")
			.short("p").long("prn")
			.takes_value(true).required(true))
		.arg(Arg::with_name("code_table")
			.short("t").long("code_table")
			.help("File with the 4092 E1B chips for this PRN, one signed byte per chip")
			.takes_value(true).required(true))
		.arg(Arg::with_name("acq_doppler_hz")
			.short("d").long("acq_doppler_hz")
			.takes_value(true).required(true))
		.arg(Arg::with_name("acq_delay_samples")
			.short("c").long("acq_delay_samples")
			.takes_value(true).required(true))
		.arg(Arg::with_name("dump_prefix")
			.long("dump_prefix")
			.help("Enables the binary tracking dump, written to {prefix}{channel}.dat")
			.takes_value(true))
		.arg(Arg::with_name("max_records")
			.short("m").long("max_records")
			.takes_value(true))
		.get_matches();

	// Parse mandatory fields
	let fname:&str            = matches.value_of("filename").unwrap();
	let fs:f64                = matches.value_of("sample_rate_sps").unwrap().parse().unwrap();
	let prn:u8                = matches.value_of("prn").unwrap().parse().unwrap();
	let code_table:&str       = matches.value_of("code_table").unwrap();
	let acq_doppler_hz:f64    = matches.value_of("acq_doppler_hz").unwrap().parse().unwrap();
	let acq_delay_samples:f64 = matches.value_of("acq_delay_samples").unwrap().parse().unwrap();

	// Parse optional fields
	let opt_dump_prefix:Option<&str> = matches.value_of("dump_prefix");
	let opt_max_records:Option<usize> = matches.value_of("max_records").map(|s| s.parse().unwrap() );

	eprintln!("Tracking PRN {} in {} at {} [samples/sec], max_records={:?}", prn, &fname, &fs, &opt_max_records);

	let cfg = TrackingConfig {
		if_freq_hz: 0.0,
		fs_in_hz: fs,
		prn_length_samples: (fs * 0.004).round() as usize,
		channel_id: 0,
		pll_bw_hz: 50.0,
		dll_bw_hz: 2.0,
		early_late_space_chips: 0.1,
		very_early_late_space_chips: 0.15,
		dump: opt_dump_prefix.is_some(),
		dump_path_prefix: opt_dump_prefix.unwrap_or("").to_owned(),
	};

	let code_gen = CodeTableGenerator::from_file(code_table, SignalCode::E1b, prn)
		.unwrap_or_else(|e| panic!("Unable to load code table: {:?}", e));

	let mut trk = VemlTracking::new(&cfg, Box::new(code_gen), None)
		.unwrap_or_else(|e| panic!("Unable to construct tracking channel: {:?}", e));

	trk.set_acquisition(AcquisitionHandoff {
		prn,
		signal_code: "1B".to_owned(),
		system: 'E',
		delay_samples: acq_delay_samples,
		doppler_hz: acq_doppler_hz,
		sample_stamp: 0,
	});
	trk.start_tracking().unwrap_or_else(|e| panic!("Unable to start tracking: {:?}", e));

	let samples:Vec<Complex<f64>> = io::file_source_i16_complex(&fname)
		.unwrap_or_else(|e| panic!("{}", e))
		.map(|((re, im), _)| Complex{ re: re as f64, im: im as f64 })
		.collect();

	let mut all_results:Vec<TrackingDebug> = vec![];
	let mut cursor:usize = 0;
	let mut records:usize = 0;

	'outer: while cursor + trk.forecast() <= samples.len() {
		let status = trk.work(&samples[cursor .. cursor + trk.forecast()]);
		cursor += status.consumed;

		if status.record.is_some() {
			records += 1;
			if records % 250 == 0 {
				let debug = trk.debug();
				match trk.state() {
					TrackingState::Disabled => eprintln!("Disabled {}", format!("{:9.2} [Hz], CN0 {:5.1}", debug.carrier_doppler_hz, debug.cn0_db_hz).red()),
					TrackingState::PullIn   => eprintln!("PullIn {}",   format!("{:9.2} [Hz]", debug.carrier_doppler_hz).yellow()),
					TrackingState::Tracking => eprintln!("Tracking {}", format!("{:9.2} [Hz], CN0 {:5.1}", debug.carrier_doppler_hz, debug.cn0_db_hz).green()),
				}
				all_results.push(debug);
				if let Some(max_records) = opt_max_records {
					if all_results.len() >= max_records { break 'outer; }
				}
			}
		}
	}

	// Output data in JSON format
	println!("{}", serde_json::to_string_pretty(&all_results).unwrap());

}
