/*
 * Copyright (C) 2023-2024 Nils Asmussen, Barkhausen Institut
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

use bitflags::bitflags;

use core::str;

bitflags! {
    /// All log flags used by the HWPM resource manager
    ///
    /// Logging is controlled at runtime via the flags passed to `io::init`. On hosted builds, they
    /// are read from the environment variable `HWPM_LOG` (e.g., `HWPM_LOG="Info|Error|HwpmRes"`).
    /// Any component can then use the `log` macro to log something. The available flags are kept
    /// here.
    ///
    /// There are three general flags: `Info`, `Debug`, and `Error`. Info and Error are enabled by
    /// default. Additionally, there are per-component flags that control the logging of certain
    /// aspects of the resource manager.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct LogFlags : u64 {
        /// General: informational output (enabled by default)
        const Info          = 1 << 0;
        /// General: debugging output (disable by default)
        const Debug         = 1 << 1;
        /// General: error output (enabled by default)
        const Error         = 1 << 2;

        #[doc(hidden)]
        const __hwpm_start = 3;

        /// HWPM: slot array allocation and registration
        const HwpmInit      = 1 << (Self::__hwpm_start.bits() + 0);
        /// HWPM: floorsweep discovery and IP registration
        const HwpmFs        = 1 << (Self::__hwpm_start.bits() + 1);
        /// HWPM: reservations, releases, and rollbacks
        const HwpmRes       = 1 << (Self::__hwpm_start.bits() + 2);
        /// HWPM: allow-list sizing and copying
        const HwpmAlist     = 1 << (Self::__hwpm_start.bits() + 3);
        /// HWPM: binding and unbinding of reserved resources
        const HwpmBind      = 1 << (Self::__hwpm_start.bits() + 4);
        /// HWPM: power management requests
        const HwpmPower     = 1 << (Self::__hwpm_start.bits() + 5);
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        Self::Info | Self::Error
    }
}

impl str::FromStr for LogFlags {
    type Err = bitflags::parser::ParseError;

    fn from_str(flags: &str) -> Result<Self, Self::Err> {
        Ok(Self(flags.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags() {
        let flags: LogFlags = "Info|HwpmRes".parse().unwrap();
        assert_eq!(flags, LogFlags::Info | LogFlags::HwpmRes);
        assert!("Info|NoSuchFlag".parse::<LogFlags>().is_err());
    }

    #[test]
    fn default_flags() {
        assert!(LogFlags::default().contains(LogFlags::Info));
        assert!(LogFlags::default().contains(LogFlags::Error));
        assert!(!LogFlags::default().contains(LogFlags::HwpmFs));
    }
}
