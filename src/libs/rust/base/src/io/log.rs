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

//! Contains the logger

use core::fmt;

use spin::{Mutex, MutexGuard};

use crate::io::LogFlags;

/// The environment variable that holds the log flags on hosted builds
pub const LOG_ENV: &str = "HWPM_LOG";

/// The function that receives formatted log output
pub type Sink = fn(fmt::Arguments<'_>);

static LOG: Mutex<Log> = Mutex::new(Log::new());

/// The logger that forwards enabled messages to the installed sink
pub struct Log {
    flags: LogFlags,
    sink: Option<Sink>,
}

impl Log {
    /// Returns the logger, if it has been initialized
    pub fn get() -> Option<MutexGuard<'static, Log>> {
        let log = LOG.lock();
        match log.sink {
            Some(_) => Some(log),
            None => None,
        }
    }

    pub(crate) const fn new() -> Self {
        Log {
            flags: LogFlags::Info.union(LogFlags::Error),
            sink: None,
        }
    }

    /// Returns the currently enabled flags
    pub fn flags(&self) -> LogFlags {
        self.flags
    }

    /// Writes the given arguments to the sink
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        if let Some(sink) = self.sink {
            sink(args);
        }
    }
}

/// Initializes the logger
pub fn init(flags: LogFlags, sink: Sink) {
    let mut log = LOG.lock();
    log.flags = flags;
    log.sink = Some(sink);
}

/// Prints the given arguments unconditionally
///
/// On hosted builds, the output goes to stdout. Otherwise, it is written to the log sink if the
/// logger has been initialized.
pub fn print_fmt(args: fmt::Arguments<'_>) {
    cfg_if::cfg_if! {
        if #[cfg(feature = "linux")] {
            std::print!("{}", args);
        }
        else {
            if let Some(mut l) = Log::get() {
                l.write_fmt(args);
            }
        }
    }
}

#[cfg(feature = "linux")]
pub(crate) fn stderr_sink(args: fmt::Arguments<'_>) {
    std::eprint!("{}", args);
}
