// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::fmt::Write;

use clap::Args;
use color_eyre::eyre::{OptionExt, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use inception::memory::WORD_SIZE;
use log::info;

use crate::CliArguments;
use crate::cli_commands::{parse_number, parse_size, with_session};

/// Reads at least this large get a progress bar.
const PROGRESS_THRESHOLD: usize = 4096;
/// How much to read between progress updates.
const READ_CHUNK: usize = 1024;
const DUMP_WIDTH: usize = 16;

#[derive(Args)]
pub struct ReadArguments
{
	#[arg(value_parser = parse_number)]
	/// Address to start reading from
	address: u32,
	#[arg(value_parser = parse_size)]
	/// Number of bytes to read, a multiple of 4
	size: usize,
}

#[derive(Args)]
pub struct WriteArguments
{
	#[arg(value_parser = parse_number)]
	/// Address of the word to write
	address: u32,
	#[arg(value_parser = parse_number)]
	/// Value to write
	value: u32,
}

pub fn read_command(cli_args: &CliArguments, read_args: &ReadArguments) -> Result<()>
{
	if read_args.size == 0 || read_args.size % WORD_SIZE != 0 {
		bail!("read size must be a positive multiple of {} bytes", WORD_SIZE);
	}
	let progress_bar = if read_args.size >= PROGRESS_THRESHOLD {
		ProgressBar::new(read_args.size as u64).with_style(
			ProgressStyle::default_bar()
				.template(" {percent:>3}% |{bar:50}| {bytes}/{total_bytes} [{binary_bytes_per_sec} {elapsed}]")?,
		)
	} else {
		ProgressBar::hidden()
	};

	let data = with_session(cli_args, |session| {
		let mut data = Vec::with_capacity(read_args.size);
		while data.len() < read_args.size {
			let offset = data.len();
			let length = (read_args.size - offset).min(READ_CHUNK);
			let address = u32::try_from(offset)
				.ok()
				.and_then(|offset| read_args.address.checked_add(offset))
				.ok_or_eyre("read runs past the end of the address space")?;
			data.extend(session.read_memory(address, length)?);
			progress_bar.inc(length as u64);
		}
		Ok(data)
	});
	progress_bar.finish_and_clear();

	print!("{}", hex_dump(read_args.address, &data?));
	Ok(())
}

pub fn write_command(cli_args: &CliArguments, write_args: &WriteArguments) -> Result<()>
{
	with_session(cli_args, |session| Ok(session.write_word(write_args.address, write_args.value)?))?;
	info!("Wrote {:#010x} to {:#010x}", write_args.value, write_args.address);
	Ok(())
}

/// Format `data` as lines of hex bytes followed by their printable characters.
fn hex_dump(address: u32, data: &[u8]) -> String
{
	let mut dump = String::new();
	for (line, bytes) in data.chunks(DUMP_WIDTH).enumerate() {
		let line_address = address.wrapping_add((line * DUMP_WIDTH) as u32);
		let _ = write!(dump, "{:08x}: ", line_address);
		for byte in bytes {
			let _ = write!(dump, "{:02x} ", byte);
		}
		for _ in bytes.len()..DUMP_WIDTH {
			dump.push_str("   ");
		}
		dump.push(' ');
		dump.extend(bytes.iter().map(|&byte| {
			if byte.is_ascii_graphic() || byte == b' ' {
				byte as char
			} else {
				'.'
			}
		}));
		dump.push('\n');
	}
	dump
}
