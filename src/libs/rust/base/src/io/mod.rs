/*
 * Copyright (C) 2018 Nils Asmussen <nils@os.inf.tu-dresden.de>
 * Economic rights: Technische Universitaet Dresden (Germany)
 *
 * Copyright (C) 2019-2024 Nils Asmussen, Barkhausen Institut
 *
 * This file is part of M3 (Microkernel-based SysteM for Heterogeneous Manycores).
 *
 * M3 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * M3 is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

//! Contains the modules for console output and logging

pub mod log;
mod logflags;

pub use self::log::Sink;
pub use self::logflags::LogFlags;

/// Macro for logging (includes a trailing newline)
///
/// The arguments are printed if $flag is enabled (see [`LogFlags`]).
///
/// # Examples
///
/// ```
/// use base::io::LogFlags;
/// use base::log;
///
/// log!(LogFlags::HwpmRes, "my log entry: {}, {}", 1, "test");
/// ```
#[macro_export]
macro_rules! log {
    ($flag:expr, $fmt:expr)                   => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"))
    );

    ($flag:expr, $fmt:expr, $($arg:tt)*)      => (
        $crate::log!(@log_impl $flag, concat!($fmt, "\n"), $($arg)*)
    );

    (@log_impl $flag:expr, $($args:tt)*)    => ({
        if let Some(mut l) = $crate::io::log::Log::get() {
            if l.flags().contains($flag) {
                l.write_fmt(format_args!($($args)*));
            }
        }
    });
}

/// Macro for printing to the console
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ({
        $crate::io::log::print_fmt(format_args!($($arg)*));
    });
}

/// Macro for printing to the console (includes a trailing newline)
#[macro_export]
macro_rules! println {
    ()                      => ($crate::print!("\n"));
    ($fmt:expr)             => ($crate::print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::print!(concat!($fmt, "\n"), $($arg)*));
}

/// Initializes the logger with the given flags, writing all output to `sink`
pub fn init(flags: LogFlags, sink: Sink) {
    log::init(flags, sink);
}

/// Initializes the logger to write to stderr, using the flags from the `HWPM_LOG` environment
/// variable if present
#[cfg(feature = "linux")]
pub fn init_stderr() {
    let flags = match std::env::var(log::LOG_ENV) {
        Ok(val) => val.parse().unwrap_or_else(|_| LogFlags::default()),
        Err(_) => LogFlags::default(),
    };
    log::init(flags, log::stderr_sink);
}
