
use std::fs::File;
use std::io::{BufWriter, Write};

use byteorder::{LittleEndian, NativeEndian, ReadBytesExt, WriteBytesExt};

pub struct FileSourceLEi16Complex {
	f:File,
	idx:usize,
}

pub fn file_source_i16_complex(filename:&str) -> Result<FileSourceLEi16Complex, &'static str> {
	let f = File::open(filename).map_err(|_| "Unable to open source file")?;
	Ok(FileSourceLEi16Complex{ f, idx: 0 })
}

impl Iterator for FileSourceLEi16Complex {
	type Item = ((i16, i16), usize);

	fn next(&mut self) -> Option<((i16, i16), usize)> {
		match (self.f.read_i16::<LittleEndian>(), self.f.read_i16::<LittleEndian>()) {
			(Ok(re_i16), Ok(im_i16)) => {
				let i = self.idx;
				self.idx += 1;
				Some(((re_i16, im_i16), i))
			},
			(_, _) => None,
		}
	}
}

/* One fixed-layout record per PRN period.  The field order matches the
decoding scripts that post-process the dump, so it must not change. */
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpRecord {
	pub abs_ve:  f32,
	pub abs_e:   f32,
	pub abs_p:   f32,
	pub abs_l:   f32,
	pub abs_vl:  f32,
	pub prompt_i: f32,
	pub prompt_q: f32,
	pub sample_counter: u64,
	pub acc_carrier_phase_rad: f32,
	pub carrier_doppler_hz: f32,
	pub code_freq_hz: f32,
	pub carr_error: f32,
	pub carr_nco: f32,
	pub code_error: f32,
	pub code_nco: f32,
	pub cn0_db_hz: f32,
	pub carrier_lock_test: f32,
	pub rem_code_phase_samples: f32,
	pub block_end_sample: f64,
}

// 17 x f32 + u64 + f64
pub const DUMP_RECORD_SIZE:usize = 17*4 + 8 + 8;

impl DumpRecord {

	pub fn write_to<W: Write>(&self, w:&mut W) -> std::io::Result<()> {
		w.write_f32::<NativeEndian>(self.abs_ve)?;
		w.write_f32::<NativeEndian>(self.abs_e)?;
		w.write_f32::<NativeEndian>(self.abs_p)?;
		w.write_f32::<NativeEndian>(self.abs_l)?;
		w.write_f32::<NativeEndian>(self.abs_vl)?;
		w.write_f32::<NativeEndian>(self.prompt_i)?;
		w.write_f32::<NativeEndian>(self.prompt_q)?;
		w.write_u64::<NativeEndian>(self.sample_counter)?;
		w.write_f32::<NativeEndian>(self.acc_carrier_phase_rad)?;
		w.write_f32::<NativeEndian>(self.carrier_doppler_hz)?;
		w.write_f32::<NativeEndian>(self.code_freq_hz)?;
		w.write_f32::<NativeEndian>(self.carr_error)?;
		w.write_f32::<NativeEndian>(self.carr_nco)?;
		w.write_f32::<NativeEndian>(self.code_error)?;
		w.write_f32::<NativeEndian>(self.code_nco)?;
		w.write_f32::<NativeEndian>(self.cn0_db_hz)?;
		w.write_f32::<NativeEndian>(self.carrier_lock_test)?;
		w.write_f32::<NativeEndian>(self.rem_code_phase_samples)?;
		w.write_f64::<NativeEndian>(self.block_end_sample)?;
		Ok(())
	}

}

pub struct TrackingDumpWriter {
	w: BufWriter<File>,
	pub path: String,
}

impl TrackingDumpWriter {

	/// Truncates `{prefix}{channel_id}.dat` and prepares it for per-PRN records.
	pub fn create(path_prefix:&str, channel_id:usize) -> std::io::Result<Self> {
		let path = format!("{}{}.dat", path_prefix, channel_id);
		let f = File::create(&path)?;
		Ok(Self{ w: BufWriter::new(f), path })
	}

	/// Best-effort write; a full disk must not take the tracking loop down.
	pub fn write_record(&mut self, rec:&DumpRecord) {
		if let Err(e) = rec.write_to(&mut self.w) {
			log::warn!("Failed writing tracking dump {}: {}", self.path, e);
		}
	}

	pub fn flush(&mut self) {
		if let Err(e) = self.w.flush() {
			log::warn!("Failed flushing tracking dump {}: {}", self.path, e);
		}
	}

}

impl Drop for TrackingDumpWriter {
	fn drop(&mut self) { self.flush(); }
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn dump_record_layout() {
		let mut buf:Vec<u8> = vec![];
		DumpRecord::default().write_to(&mut buf).unwrap();
		assert_eq!(buf.len(), DUMP_RECORD_SIZE);
	}

	#[test]
	fn dump_writer_appends_fixed_size_records() {
		let path_prefix = std::env::temp_dir().join("veml_dump_test_").to_str().unwrap().to_owned();
		{
			let mut w = TrackingDumpWriter::create(&path_prefix, 7).unwrap();
			for i in 0..5 {
				let rec = DumpRecord{ sample_counter: i, ..Default::default() };
				w.write_record(&rec);
			}
		}
		let written = std::fs::read(format!("{}7.dat", path_prefix)).unwrap();
		assert_eq!(written.len(), 5 * DUMP_RECORD_SIZE);
		std::fs::remove_file(format!("{}7.dat", path_prefix)).unwrap();
	}

}
