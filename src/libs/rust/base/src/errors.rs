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

//! Contains the error handling types

use core::fmt;

use num_enum::{FromPrimitive, IntoPrimitive};

/// The error codes
#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum Code {
    // success
    Success = 0,
    // argument and lookup errors
    InvArgs,
    NotFound,
    NotSup,
    // allocation errors
    OutOfMem,
    NoSpace,
    // register bus errors
    ReadFailed,
    WriteFailed,
    // resource state errors
    AlreadyReserved,
    NotReservable,
    #[num_enum(default)]
    Unspecified,
}

impl Default for Code {
    fn default() -> Self {
        Self::Success
    }
}

/// The error struct that is passed around
///
/// Besides the error code, an error records whether a compensating rollback has been performed
/// before it was returned. The code always refers to the original failure.
#[derive(Clone, Copy)]
pub struct Error {
    code: Code,
    rolled_back: bool,
}

impl Error {
    /// Creates a new object for given error code
    pub fn new(code: Code) -> Self {
        Error {
            code,
            rolled_back: false,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Returns true if previously applied changes have been rolled back before this error was
    /// returned
    pub fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    /// Marks this error as being returned after a rollback
    pub fn with_rollback(mut self) -> Self {
        self.rolled_back = true;
        self
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rolled_back {
            true => write!(f, "{:?} (rolled back)", self.code()),
            false => write!(f, "{:?}", self.code()),
        }
    }
}

impl From<Error> for Code {
    fn from(err: Error) -> Self {
        err.code()
    }
}

impl From<Code> for Result<(), Error> {
    fn from(code: Code) -> Self {
        match code {
            Code::Success => Ok(()),
            e => Err(Error::new(e)),
        }
    }
}

impl<T> From<Result<T, Error>> for Code {
    fn from(res: Result<T, Error>) -> Self {
        match res {
            Ok(_) => Code::Success,
            Err(e) => e.code(),
        }
    }
}

impl From<u32> for Error {
    fn from(error: u32) -> Self {
        Self::new(Code::from(error))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.code() == other.code()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug(f)
    }
}

#[cfg(feature = "linux")]
impl std::error::Error for Error {
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_from_raw() {
        assert_eq!(Code::from(0u32), Code::Success);
        assert_eq!(Code::from(Code::NotReservable as u32), Code::NotReservable);
        assert_eq!(Code::from(0xFFFFu32), Code::Unspecified);
    }

    #[test]
    fn rollback_keeps_code() {
        let e = Error::new(Code::ReadFailed).with_rollback();
        assert_eq!(e.code(), Code::ReadFailed);
        assert!(e.rolled_back());
        assert_eq!(e, Error::new(Code::ReadFailed));
        assert!(!Error::new(Code::ReadFailed).rolled_back());
    }

    #[test]
    fn result_conversion() {
        let ok: Result<(), Error> = Code::Success.into();
        assert!(ok.is_ok());
        let res: Result<u32, Error> = Err(Error::new(Code::NoSpace));
        assert_eq!(Code::from(res), Code::NoSpace);
    }
}
