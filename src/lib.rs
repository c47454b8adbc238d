
extern crate byteorder;
extern crate colored;
extern crate log;
extern crate rustfft;
extern crate serde;

pub mod filters;
pub mod io;
pub mod gnss;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingError {
	InvalidConfig(&'static str),
	UnknownSignal,
	UnknownSystem,
	MissingAcquisition,
	CodeGeneration(&'static str),
	DumpFile(&'static str),
}
