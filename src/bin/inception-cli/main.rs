// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod cli_commands;

use std::io::stdout;
use std::str::FromStr;

use clap::builder::styling::Styles;
use clap::{Args, CommandFactory, Parser, crate_description, crate_version};
use clap_complete::{Shell, generate};
use color_eyre::config::HookBuilder;
use color_eyre::eyre::{EyreHandler, InstallError, Result};
use owo_colors::OwoColorize;

use crate::cli_commands::{ToplevelCommmands, parse_pid, parse_vid};
use inception::usb::{Pid, Vid};

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	disable_colored_help(false),
	arg_required_else_help(true)
)]
struct CliArguments
{
	#[arg(global = true, long = "vid", value_parser = parse_vid)]
	/// USB vendor ID of the probe, in hex (defaults to 04b4)
	vid: Option<Vid>,
	#[arg(global = true, long = "pid", value_parser = parse_pid)]
	/// USB product ID of the probe, in hex (defaults to 00f1)
	pid: Option<Pid>,
	#[arg(global = true, short = 's', long = "serial", alias = "serial-number")]
	/// Use the device with the given serial number
	serial_number: Option<String>,
	#[arg(global = true, long = "index", value_parser = usize::from_str)]
	/// Use the nth found device (may be unstable!)
	index: Option<usize>,
	#[arg(global = true, long = "timeout", value_name = "MS", value_parser = u64::from_str)]
	/// How long to wait on any one USB transfer, in milliseconds
	timeout_ms: Option<u64>,

	#[command(subcommand)]
	pub subcommand: ToplevelCommmands,
}

#[derive(Args)]
struct CompletionArguments
{
	shell: Shell,
}

type EyreHookFunc = Box<dyn Fn(&(dyn std::error::Error + 'static)) -> Box<dyn EyreHandler> + Send + Sync + 'static>;
type PanicHookFunc = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync + 'static>;

struct InceptionHook
{
	inner_hook: EyreHookFunc,
}

struct InceptionPanic
{
	inner_hook: PanicHookFunc,
}

struct InceptionHandler
{
	inner_handler: Box<dyn EyreHandler>,
}

impl InceptionHook
{
	fn build_handler(&self, error: &(dyn std::error::Error + 'static)) -> InceptionHandler
	{
		InceptionHandler {
			inner_handler: (*self.inner_hook)(error),
		}
	}

	pub fn install(self) -> Result<(), InstallError>
	{
		color_eyre::eyre::set_hook(self.into_eyre_hook())
	}

	pub fn into_eyre_hook(self) -> EyreHookFunc
	{
		Box::new(move |err| Box::new(self.build_handler(err)))
	}
}

impl InceptionPanic
{
	pub fn install(self)
	{
		std::panic::set_hook(self.into_panic_hook());
	}

	pub fn into_panic_hook(self) -> PanicHookFunc
	{
		Box::new(move |panic_info| {
			self.print_header();
			(*self.inner_hook)(panic_info);
			self.print_footer();
		})
	}

	fn print_header(&self)
	{
		eprintln!("{}", report_header("crash"));
		eprintln!();
	}

	fn print_footer(&self)
	{
		eprintln!();
		eprintln!("{}", report_footer());
	}
}

impl EyreHandler for InceptionHandler
{
	fn debug(&self, error: &(dyn std::error::Error + 'static), fmt: &mut core::fmt::Formatter<'_>)
	-> core::fmt::Result
	{
		write!(fmt, "{}", report_header("error"))?;
		self.inner_handler.debug(error, fmt)?;
		writeln!(fmt)?;
		writeln!(fmt)?;
		write!(fmt, "{}", report_footer())
	}

	fn track_caller(&mut self, location: &'static std::panic::Location<'static>)
	{
		self.inner_handler.track_caller(location);
	}
}

/// The cut-here marker and version line that open every crash or error report.
fn report_header(kind: &str) -> String
{
	format!(
		"------------[ ✂ cut here ✂ ]------------\nUnhandled {} in inception-cli v{}",
		kind,
		crate_version!()
	)
}

fn report_footer() -> String
{
	[
		"Please include all lines down to this one from the cut here",
		"marker when reporting this issue, along with the probe and",
		"target you were using.",
	]
	.map(|line| line.yellow().to_string())
	.join("\n")
}

fn install_error_handler() -> Result<()>
{
	// Grab us a new default handler
	let default_handler = HookBuilder::default();
	// Turn that into a pair of hooks - one for panic, and the other for errors
	let (panic_hook, eyre_hook) = default_handler.try_into_hooks()?;

	// Wrap the default panic handling with our header and footer, and install it
	InceptionPanic {
		inner_hook: panic_hook.into_panic_hook(),
	}
	.install();

	// Likewise for errors, so we only have to deal with our additions
	InceptionHook {
		inner_hook: eyre_hook.into_eyre_hook(),
	}
	.install()?;
	Ok(())
}

/// Clap v3 style (approximate)
/// See https://stackoverflow.com/a/75343828
fn style() -> clap::builder::Styles
{
	Styles::styled()
		.usage(
			anstyle::Style::new()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
				.bold(),
		)
		.header(
			anstyle::Style::new()
				.bold()
				.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
		)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn main() -> Result<()>
{
	install_error_handler()?;
	env_logger::Builder::new()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let cli_args = CliArguments::parse();

	match &cli_args.subcommand {
		ToplevelCommmands::Complete(comp_args) => {
			let mut cmd = CliArguments::command();
			generate(comp_args.shell, &mut cmd, "inception-cli", &mut stdout());
			Ok(())
		},
		subcommand => subcommand.run(&cli_args),
	}
}
