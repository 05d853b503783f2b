// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! This build script only exists to statically link the Visual C runtime on Windows so the
//! resulting `inception-cli` binary can be copied onto a machine without the redistributable.

fn main()
{
	static_vcruntime::metabuild();
}
