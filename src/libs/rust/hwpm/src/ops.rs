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

//! The interfaces to the hardware and the rest of the system

use base::cell::RefCell;
use base::errors::Error;
use base::io::LogFlags;
use base::log;
use base::rc::Rc;

use crate::alist;
use crate::chip::Element;

/// Access to the register bus
pub trait RegisterIo {
    fn read32(&mut self, addr: u64) -> Result<u32, Error>;
    fn write32(&mut self, addr: u64, val: u32) -> Result<(), Error>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for Rc<RefCell<T>> {
    fn read32(&mut self, addr: u64) -> Result<u32, Error> {
        self.borrow_mut().read32(addr)
    }

    fn write32(&mut self, addr: u64, val: u32) -> Result<(), Error> {
        self.borrow_mut().write32(addr, val)
    }
}

/// Tests whether an element is present by reading one of its registers
///
/// Floorswept elements are expected to fault on access; the caller therefore treats every error
/// as "element not present".
pub trait FloorsweepProbe {
    fn read_register(
        &mut self,
        ip_idx: u32,
        inst_idx: usize,
        elem: &Element,
        addr: u64,
    ) -> Result<u32, Error>;
}

impl<R: RegisterIo> FloorsweepProbe for R {
    fn read_register(
        &mut self,
        _ip_idx: u32,
        _inst_idx: usize,
        _elem: &Element,
        addr: u64,
    ) -> Result<u32, Error> {
        self.read32(addr)
    }
}

/// Enables and disables the power management of instances
pub trait PowerGate {
    /// Disables (`disable == true`) or re-enables the power management of the given instance
    fn handle_power_mgmt(&mut self, ip_idx: u32, inst_idx: usize, disable: bool)
        -> Result<(), Error>;
}

impl<T: PowerGate + ?Sized> PowerGate for Rc<RefCell<T>> {
    fn handle_power_mgmt(
        &mut self,
        ip_idx: u32,
        inst_idx: usize,
        disable: bool,
    ) -> Result<(), Error> {
        self.borrow_mut().handle_power_mgmt(ip_idx, inst_idx, disable)
    }
}

/// A power gate for chips without instance power management
#[derive(Default, Debug)]
pub struct NoPowerGate;

impl PowerGate for NoPowerGate {
    fn handle_power_mgmt(
        &mut self,
        _ip_idx: u32,
        _inst_idx: usize,
        _disable: bool,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Provides the layout of the chip's IP table
pub trait ChipTopology {
    /// Returns the number of IP indices to walk
    fn ip_max_idx(&self) -> u32;
    /// Returns the index of the router IP, which is released last
    fn router_ip_idx(&self) -> u32;
}

/// A topology with fixed values
#[derive(Copy, Clone, Debug)]
pub struct StaticTopology {
    ip_max: u32,
    router: u32,
}

impl StaticTopology {
    pub fn new(ip_max: u32, router: u32) -> Self {
        Self { ip_max, router }
    }
}

impl ChipTopology for StaticTopology {
    fn ip_max_idx(&self) -> u32 {
        self.ip_max
    }

    fn router_ip_idx(&self) -> u32 {
        self.router
    }
}

/// The chip-generation-specific register operations
pub trait ChipStrategy {
    /// Starts the given perfmon
    fn perfmon_enable(&mut self, elem: &Element) -> Result<(), Error>;
    /// Stops the given perfmon
    fn perfmon_disable(&mut self, elem: &Element) -> Result<(), Error>;
    /// Stops the given perfmux
    fn perfmux_disable(&mut self, elem: &Element) -> Result<(), Error>;
    /// Writes zero to all allow-list registers of `elem` that need to be cleared
    fn zero_alist_regs(&mut self, elem: &Element) -> Result<(), Error>;

    /// Copies the allow-list of `elem` as absolute addresses into `buf`, starting at `*cursor`
    fn copy_alist(&self, elem: &Element, buf: &mut [u64], cursor: &mut usize) -> Result<(), Error> {
        alist::copy_element_alist(elem, buf, cursor)
    }
}

/// The control registers used by [`GenericStrategy`], relative to an element's base address
#[derive(Copy, Clone, Debug)]
pub struct ControlRegs {
    /// The perfmon control register
    pub perfmon_ctrl: u64,
    /// The bits in the perfmon control register that enable counting
    pub perfmon_enable: u32,
    /// The perfmux control register
    pub perfmux_ctrl: u64,
}

/// A [`ChipStrategy`] that performs read-modify-write operations on fixed control registers
pub struct GenericStrategy<R: RegisterIo> {
    io: R,
    regs: ControlRegs,
}

impl<R: RegisterIo> GenericStrategy<R> {
    pub fn new(io: R, regs: ControlRegs) -> Self {
        Self { io, regs }
    }

    pub fn io(&mut self) -> &mut R {
        &mut self.io
    }

    fn update(&mut self, addr: u64, bits: u32, set: bool) -> Result<(), Error> {
        let val = self.io.read32(addr)?;
        let val = base::math::set_bit(val, bits, set);
        self.io.write32(addr, val)
    }
}

impl<R: RegisterIo> ChipStrategy for GenericStrategy<R> {
    fn perfmon_enable(&mut self, elem: &Element) -> Result<(), Error> {
        let addr = elem.start_abs_pa() + self.regs.perfmon_ctrl;
        log!(LogFlags::HwpmBind, "Enabling perfmon @ {:#x}", elem.start_abs_pa());
        self.update(addr, self.regs.perfmon_enable, true)
    }

    fn perfmon_disable(&mut self, elem: &Element) -> Result<(), Error> {
        let addr = elem.start_abs_pa() + self.regs.perfmon_ctrl;
        log!(LogFlags::HwpmBind, "Disabling perfmon @ {:#x}", elem.start_abs_pa());
        self.update(addr, self.regs.perfmon_enable, false)
    }

    fn perfmux_disable(&mut self, elem: &Element) -> Result<(), Error> {
        log!(LogFlags::HwpmBind, "Disabling perfmux @ {:#x}", elem.start_abs_pa());
        self.io.write32(elem.start_abs_pa() + self.regs.perfmux_ctrl, 0)
    }

    fn zero_alist_regs(&mut self, elem: &Element) -> Result<(), Error> {
        if let Some(alist) = elem.alist() {
            for entry in alist.iter().filter(|e| e.zero_at_init) {
                self.io.write32(elem.start_abs_pa() + entry.reg_offset, 0)?;
            }
        }
        Ok(())
    }
}
