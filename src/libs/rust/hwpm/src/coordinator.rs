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

//! The generic walker that executes one operation over the resource tree
//!
//! All lifecycle phases share the same top-down walk: IP block, then its present instances in
//! ascending order, then the aperture types of each instance, and finally the available elements
//! of each aperture type. Each level checks the guards of the operation; a guard that does not hold
//! skips the branch successfully. Errors abort the walk immediately.

use base::boxed::Box;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::math;

use crate::alist;
use crate::chip::{ApertureType, Chip, Element, Instance, IpBlock, ResourceStatus};
use crate::element::ElementOps;
use crate::floorsweep;
use crate::ops::{ChipStrategy, ChipTopology, FloorsweepProbe, PowerGate};
use crate::slots::{self, SlotAllocator};

/// The operations that can be executed over the resource tree
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Allocates the slot arrays and registers instances and elements
    InitStructures,
    /// Marks the instance at `base_addr` as (un)available, as announced by its IP driver
    MatchBaseAddress { base_addr: u64, available: bool },
    /// Probes the elements and updates the instance and IP availability
    UpdateInstMask,
    /// Sums the allow-list sizes of all available elements
    GetAlistSize,
    /// Copies the allow-lists of all available elements into the buffer
    CombineAlist,
    /// Reserves the IP block, rolling back on failure
    ReserveGivenResource,
    /// Releases all reserved IP blocks except the router
    ReleaseResources,
    /// Releases the router IP block
    ReleaseRouter,
    /// Clears and enables the elements of reserved IP blocks
    BindResources,
    /// Disables and clears the elements of reserved IP blocks
    UnbindResources,
    /// Frees the slot arrays
    ReleaseStructures,
}

/// The state of one walk
pub(crate) struct FuncArgs<'b> {
    op: Operation,
    alist_buf: Option<&'b mut [u64]>,
    alist_size: usize,
    cursor: usize,
    matched: bool,
}

impl<'b> FuncArgs<'b> {
    pub fn new(op: Operation, alist_buf: Option<&'b mut [u64]>, chip: &Chip) -> Self {
        Self {
            op,
            alist_buf,
            alist_size: chip.alist_size,
            cursor: chip.alist_cursor,
            matched: false,
        }
    }

    fn local(op: Operation) -> Self {
        Self {
            op,
            alist_buf: None,
            alist_size: 0,
            cursor: 0,
            matched: false,
        }
    }

    /// Returns true if a `MatchBaseAddress` walk found the instance
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Returns the number of allow-list entries written so far
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn store(&self, chip: &mut Chip) {
        chip.alist_size = self.alist_size;
        chip.alist_cursor = self.cursor;
    }
}

/// Executes operations using the injected hardware and system interfaces
pub struct Coordinator {
    strategy: Box<dyn ChipStrategy>,
    probe: Box<dyn FloorsweepProbe>,
    power: Box<dyn PowerGate>,
    topology: Box<dyn ChipTopology>,
    alloc: Box<dyn SlotAllocator>,
}

impl Coordinator {
    pub fn new(
        strategy: Box<dyn ChipStrategy>,
        probe: Box<dyn FloorsweepProbe>,
        power: Box<dyn PowerGate>,
        topology: Box<dyn ChipTopology>,
        alloc: Box<dyn SlotAllocator>,
    ) -> Self {
        Self {
            strategy,
            probe,
            power,
            topology,
            alloc,
        }
    }

    pub fn topology(&self) -> &dyn ChipTopology {
        &*self.topology
    }

    pub(crate) fn set_allocator(&mut self, alloc: Box<dyn SlotAllocator>) {
        self.alloc = alloc;
    }

    /// Executes `args.op` for all IP blocks of the chip
    ///
    /// The allow-list accumulator and cursor are reset once before the walk.
    pub(crate) fn func_all_ip(
        &mut self,
        chip: &mut Chip,
        args: &mut FuncArgs<'_>,
    ) -> Result<(), Error> {
        match args.op {
            Operation::GetAlistSize => args.alist_size = 0,
            Operation::CombineAlist => args.cursor = 0,
            _ => {},
        }

        let res = self.walk_ips(chip, args);
        args.store(chip);
        res
    }

    fn walk_ips(&mut self, chip: &mut Chip, args: &mut FuncArgs<'_>) -> Result<(), Error> {
        for ip_idx in 0..self.topology.ip_max_idx() {
            let ip = chip.ip_mut(ip_idx).map_err(|e| {
                log!(LogFlags::Error, "IP {} not populated", ip_idx);
                e
            })?;
            self.func_single_ip(args, ip_idx, ip)?;
        }
        Ok(())
    }

    /// Executes `args.op` for the given IP block
    pub(crate) fn func_ip(
        &mut self,
        chip: &mut Chip,
        ip_idx: u32,
        args: &mut FuncArgs<'_>,
    ) -> Result<(), Error> {
        let res = match chip.ip_mut(ip_idx) {
            Ok(ip) => self.func_single_ip(args, ip_idx, ip),
            Err(e) => {
                log!(LogFlags::Error, "IP {} not populated", ip_idx);
                Err(e)
            },
        };
        args.store(chip);
        res
    }

    fn func_single_ip(
        &mut self,
        args: &mut FuncArgs<'_>,
        ip_idx: u32,
        ip: &mut IpBlock,
    ) -> Result<(), Error> {
        let name = ip.name();
        match args.op {
            Operation::InitStructures => return self.init_ip(ip),
            Operation::ReleaseStructures => {
                self.release_ip_structures(ip);
                return Ok(());
            },
            Operation::MatchBaseAddress {
                base_addr,
                available,
            } => return self.match_base_addr(args, ip_idx, ip, base_addr, available),
            Operation::ReserveGivenResource => {
                if ip.reserved {
                    log!(LogFlags::HwpmRes, "{}: already reserved", name);
                    return Ok(());
                }
                if ip.override_enabled() || ip.status == ResourceStatus::Invalid {
                    log!(LogFlags::HwpmRes, "{}: not available for reservation", name);
                    return Ok(());
                }
                return self.reserve_ip(args, ip_idx, ip);
            },
            Operation::ReleaseResources | Operation::ReleaseRouter => {
                let is_router = ip_idx == self.topology.router_ip_idx();
                if (args.op == Operation::ReleaseRouter) != is_router {
                    return Ok(());
                }
                if !ip.reserved || ip.status == ResourceStatus::Invalid {
                    return Ok(());
                }
            },
            Operation::BindResources | Operation::UnbindResources => {
                if !ip.reserved {
                    return Ok(());
                }
            },
            Operation::UpdateInstMask => {
                if ip.status == ResourceStatus::Invalid {
                    return Ok(());
                }
                // the instance mask decides what release walks, so it is frozen while reserved
                if ip.reserved {
                    log!(LogFlags::HwpmFs, "{}: reserved, keeping instance mask", name);
                    return Ok(());
                }
            },
            Operation::GetAlistSize | Operation::CombineAlist => {
                if ip.status == ResourceStatus::Invalid {
                    return Ok(());
                }
            },
        }

        for inst_idx in 0..ip.instances.len() {
            let inst = &mut ip.instances[inst_idx];
            let hw_mask = inst.hw_inst_mask();
            if !math::is_bit_set(ip.inst_fs_mask, hw_mask) {
                continue;
            }

            self.func_single_inst(args, ip_idx, inst_idx, inst)?;

            if args.op == Operation::UpdateInstMask && inst.element_fs_mask == 0 {
                log!(LogFlags::HwpmFs, "{}: instance {} floorswept", name, inst_idx);
                ip.clear_inst(hw_mask);
            }
        }

        match args.op {
            Operation::ReleaseResources | Operation::ReleaseRouter => {
                log!(LogFlags::HwpmRes, "{}: released", name);
                ip.reserved = false;
            },
            Operation::UpdateInstMask => {
                log!(
                    LogFlags::HwpmFs,
                    "{}: inst_fs_mask {:#x}, status {:?}",
                    name,
                    ip.inst_fs_mask,
                    ip.status
                );
            },
            _ => {},
        }
        Ok(())
    }

    fn func_single_inst(
        &mut self,
        args: &mut FuncArgs<'_>,
        ip_idx: u32,
        inst_idx: usize,
        inst: &mut Instance,
    ) -> Result<(), Error> {
        match args.op {
            Operation::UpdateInstMask => {
                floorsweep::update_inst_mask(&mut *self.probe, ip_idx, inst_idx, inst)?;
                Ok(())
            },
            Operation::ReleaseResources | Operation::ReleaseRouter => {
                self.func_inst_apertures(args, inst)?;
                self.handle_power_mgmt(ip_idx, inst_idx, false)
            },
            _ => self.func_inst_apertures(args, inst),
        }
    }

    fn func_inst_apertures(
        &mut self,
        args: &mut FuncArgs<'_>,
        inst: &mut Instance,
    ) -> Result<(), Error> {
        for ty in ApertureType::ALL {
            self.func_aperture(args, inst, ty)?;
        }
        Ok(())
    }

    fn func_aperture(
        &mut self,
        args: &mut FuncArgs<'_>,
        inst: &mut Instance,
        ty: ApertureType,
    ) -> Result<(), Error> {
        let fs_mask = inst.element_fs_mask;
        let info = inst.aperture_mut(ty);
        if info.is_empty_range() {
            return Ok(());
        }

        for elem in info.elements_mut() {
            if !math::is_bit_set(fs_mask, elem.index_mask()) {
                continue;
            }
            self.func_single_element(args, elem)?;
        }
        Ok(())
    }

    fn func_single_element(
        &mut self,
        args: &mut FuncArgs<'_>,
        elem: &mut Element,
    ) -> Result<(), Error> {
        match args.op {
            Operation::GetAlistSize => {
                alist::add_element_alist_size(elem, &mut args.alist_size);
                Ok(())
            },
            Operation::CombineAlist => match args.alist_buf.as_deref_mut() {
                Some(buf) => self.strategy.copy_alist(elem, buf, &mut args.cursor),
                None => Err(Error::new(Code::InvArgs)),
            },
            Operation::ReserveGivenResource => elem.reserve(),
            Operation::ReleaseResources | Operation::ReleaseRouter => elem.release(),
            Operation::BindResources => {
                self.strategy.zero_alist_regs(elem)?;
                elem.enable(&mut *self.strategy)
            },
            Operation::UnbindResources => {
                elem.disable(&mut *self.strategy)?;
                self.strategy.zero_alist_regs(elem)
            },
            Operation::InitStructures
            | Operation::MatchBaseAddress { .. }
            | Operation::UpdateInstMask
            | Operation::ReleaseStructures => Ok(()),
        }
    }

    fn handle_power_mgmt(
        &mut self,
        ip_idx: u32,
        inst_idx: usize,
        disable: bool,
    ) -> Result<(), Error> {
        log!(
            LogFlags::HwpmPower,
            "IP {} inst {}: {} power management",
            ip_idx,
            inst_idx,
            if disable { "disabling" } else { "enabling" }
        );
        self.power.handle_power_mgmt(ip_idx, inst_idx, disable)
    }

    fn init_ip(&mut self, ip: &mut IpBlock) -> Result<(), Error> {
        slots::compute_instance_slots(&mut *self.alloc, ip)?;
        for inst in ip.instances.iter_mut() {
            for ty in ApertureType::ALL {
                slots::compute_element_slots(&mut *self.alloc, inst.aperture_mut(ty))?;
            }
        }
        Ok(())
    }

    fn release_ip_structures(&mut self, ip: &mut IpBlock) {
        for inst in ip.instances.iter_mut() {
            slots::free_element_slots(&mut *self.alloc, inst);
        }
        slots::free_instance_slots(&mut *self.alloc, ip);
        log!(LogFlags::HwpmInit, "{}: released structures", ip.name());
    }

    fn match_base_addr(
        &mut self,
        args: &mut FuncArgs<'_>,
        ip_idx: u32,
        ip: &mut IpBlock,
        base_addr: u64,
        available: bool,
    ) -> Result<(), Error> {
        let inst_idx = match ApertureType::ALL
            .iter()
            .find_map(|ty| slots::lookup_instance(&*ip, *ty, base_addr))
        {
            Some(idx) => idx,
            None => return Ok(()),
        };
        args.matched = true;

        if ip.reserved {
            log!(
                LogFlags::Error,
                "{}: cannot change availability of reserved IP",
                ip.name()
            );
            return Err(Error::new(Code::AlreadyReserved));
        }

        let hw_mask = ip.instances[inst_idx].hw_inst_mask();
        log!(
            LogFlags::HwpmFs,
            "{}: instance {} @ {:#x} {}",
            ip.name(),
            inst_idx,
            base_addr,
            if available { "registered" } else { "unregistered" }
        );

        if !available {
            ip.clear_inst(hw_mask);
            return Ok(());
        }

        ip.set_inst(hw_mask);
        let inst = &mut ip.instances[inst_idx];
        if !floorsweep::update_inst_mask(&mut *self.probe, ip_idx, inst_idx, inst)? {
            ip.clear_inst(hw_mask);
        }
        Ok(())
    }

    fn reserve_ip(
        &mut self,
        args: &mut FuncArgs<'_>,
        ip_idx: u32,
        ip: &mut IpBlock,
    ) -> Result<(), Error> {
        let name = ip.name();
        let mut reserved = 0u32;

        for inst_idx in 0..ip.instances.len() {
            let inst = &mut ip.instances[inst_idx];
            let hw_mask = inst.hw_inst_mask();
            if !math::is_bit_set(ip.inst_fs_mask, hw_mask) {
                continue;
            }

            if let Err(e) = self.reserve_inst(args, ip_idx, inst_idx, inst) {
                log!(
                    LogFlags::Error,
                    "{}: reserving instance {} failed: {:?}",
                    name,
                    inst_idx,
                    e
                );
                if reserved == 0 {
                    return Err(e);
                }
                self.rollback_ip(ip_idx, ip, reserved);
                return Err(e.with_rollback());
            }
            reserved |= hw_mask;
        }

        log!(LogFlags::HwpmRes, "{}: reserved (instances {:#x})", name, reserved);
        ip.reserved = true;
        Ok(())
    }

    /// Reserves all available elements of `inst` and disables its power management
    ///
    /// On failure, the elements reserved so far are released again, so that the instance is left
    /// untouched.
    fn reserve_inst(
        &mut self,
        args: &mut FuncArgs<'_>,
        ip_idx: u32,
        inst_idx: usize,
        inst: &mut Instance,
    ) -> Result<(), Error> {
        let res = self
            .func_inst_apertures(args, inst)
            .and_then(|_| self.handle_power_mgmt(ip_idx, inst_idx, true));
        if res.is_err() {
            if let Err(e) = self.release_inst_elements(inst) {
                log!(
                    LogFlags::Error,
                    "IP {} inst {}: releasing elements failed: {:?}",
                    ip_idx,
                    inst_idx,
                    e
                );
            }
        }
        res
    }

    fn release_inst_elements(&mut self, inst: &mut Instance) -> Result<(), Error> {
        let mut args = FuncArgs::local(Operation::ReleaseResources);
        self.func_inst_apertures(&mut args, inst)
    }

    /// Releases the instances in `reserved` in ascending order
    ///
    /// Errors are logged, but do not stop the rollback.
    fn rollback_ip(&mut self, ip_idx: u32, ip: &mut IpBlock, reserved: u32) {
        let name = ip.name();
        for inst_idx in 0..ip.instances.len() {
            let inst = &mut ip.instances[inst_idx];
            if !math::is_bit_set(reserved, inst.hw_inst_mask()) {
                continue;
            }

            log!(LogFlags::HwpmRes, "{}: rolling back instance {}", name, inst_idx);
            if let Err(e) = self.release_inst_elements(inst) {
                log!(
                    LogFlags::Error,
                    "{}: rollback of instance {} elements failed: {:?}",
                    name,
                    inst_idx,
                    e
                );
            }
            if let Err(e) = self.handle_power_mgmt(ip_idx, inst_idx, false) {
                log!(
                    LogFlags::Error,
                    "{}: rollback of instance {} power management failed: {:?}",
                    name,
                    inst_idx,
                    e
                );
            }
        }
    }
}
