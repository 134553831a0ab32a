/*
 * Copyright (C) 2024 Nils Asmussen, Barkhausen Institut
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

use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;

use crate::chip::{Element, ElementType};
use crate::ops::ChipStrategy;

/// The per-element lifecycle operations
pub trait ElementOps {
    fn reserve(&mut self) -> Result<(), Error>;
    fn release(&mut self) -> Result<(), Error>;
    fn enable(&self, strategy: &mut dyn ChipStrategy) -> Result<(), Error>;
    fn disable(&self, strategy: &mut dyn ChipStrategy) -> Result<(), Error>;
}

fn invalid_type(elem: &Element) -> Error {
    log!(
        LogFlags::Error,
        "Element @ {:#x} has invalid type",
        elem.start_abs_pa()
    );
    Error::new(Code::InvArgs)
}

impl ElementOps for Element {
    fn reserve(&mut self) -> Result<(), Error> {
        match self.element_type() {
            // these are accessed directly and need a known base address
            ElementType::Perfmon | ElementType::Perfmux if self.start_abs_pa() == 0 => {
                log!(LogFlags::Error, "{:?} without base address", self.element_type());
                return Err(Error::new(Code::InvArgs));
            },
            ElementType::Perfmon
            | ElementType::Perfmux
            | ElementType::IpPerfmux
            | ElementType::IpBroadcast => {},
            ElementType::Invalid => return Err(invalid_type(self)),
        }

        if self.is_reserved() {
            return Err(Error::new(Code::AlreadyReserved));
        }

        log!(
            LogFlags::HwpmRes,
            "Reserving {:?} @ {:#x}",
            self.element_type(),
            self.start_abs_pa()
        );
        self.set_reserved(true);
        Ok(())
    }

    fn release(&mut self) -> Result<(), Error> {
        if self.element_type() == ElementType::Invalid {
            return Err(invalid_type(self));
        }

        if self.is_reserved() {
            log!(
                LogFlags::HwpmRes,
                "Releasing {:?} @ {:#x}",
                self.element_type(),
                self.start_abs_pa()
            );
            self.set_reserved(false);
        }
        Ok(())
    }

    fn enable(&self, strategy: &mut dyn ChipStrategy) -> Result<(), Error> {
        match self.element_type() {
            ElementType::Perfmon => strategy.perfmon_enable(self),
            // perfmuxes are enabled by the profiler on demand
            ElementType::Perfmux | ElementType::IpPerfmux | ElementType::IpBroadcast => Ok(()),
            ElementType::Invalid => Err(invalid_type(self)),
        }
    }

    fn disable(&self, strategy: &mut dyn ChipStrategy) -> Result<(), Error> {
        match self.element_type() {
            ElementType::Perfmon => strategy.perfmon_disable(self),
            ElementType::Perfmux | ElementType::IpPerfmux => strategy.perfmux_disable(self),
            ElementType::IpBroadcast => Ok(()),
            ElementType::Invalid => Err(invalid_type(self)),
        }
    }
}
