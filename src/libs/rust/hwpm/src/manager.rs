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

use base::boxed::Box;
use base::col::Vec;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;

use crate::chip::{Chip, ResourceStatus};
use crate::coordinator::{Coordinator, FuncArgs, Operation};
use crate::ops::{ChipStrategy, ChipTopology, FloorsweepProbe, PowerGate};
use crate::slots::{HeapAllocator, SlotAllocator};

/// A summary of one IP block
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceInfo {
    pub ip_idx: u32,
    pub name: &'static str,
    pub status: ResourceStatus,
    pub reserved: bool,
    pub inst_fs_mask: u32,
}

/// The performance-monitoring resource manager
///
/// Owns the resource tree of one chip and drives it through its lifecycle: building the slot
/// arrays, discovering the present hardware, reserving IP blocks for a profiling session, binding
/// their counters, building the allow-list, and tearing everything down again.
pub struct Hwpm {
    chip: Chip,
    coord: Coordinator,
}

impl Hwpm {
    pub fn new(
        chip: Chip,
        strategy: Box<dyn ChipStrategy>,
        probe: Box<dyn FloorsweepProbe>,
        power: Box<dyn PowerGate>,
        topology: Box<dyn ChipTopology>,
    ) -> Self {
        Self {
            chip,
            coord: Coordinator::new(strategy, probe, power, topology, Box::new(HeapAllocator)),
        }
    }

    /// Uses `alloc` for the slot arrays instead of the heap
    pub fn with_allocator(mut self, alloc: Box<dyn SlotAllocator>) -> Self {
        self.coord.set_allocator(alloc);
        self
    }

    pub fn chip(&self) -> &Chip {
        &self.chip
    }

    /// Executes `op` for all IP blocks
    pub fn func_all_ip(&mut self, op: Operation) -> Result<(), Error> {
        let mut args = FuncArgs::new(op, None, &self.chip);
        self.coord.func_all_ip(&mut self.chip, &mut args)
    }

    /// Executes `op` for the IP block with index `ip_idx`
    pub fn func_ip(&mut self, ip_idx: u32, op: Operation) -> Result<(), Error> {
        let mut args = FuncArgs::new(op, None, &self.chip);
        self.coord.func_ip(&mut self.chip, ip_idx, &mut args)
    }

    /// Allocates the slot arrays of all IP blocks
    pub fn init_structures(&mut self) -> Result<(), Error> {
        log!(LogFlags::HwpmInit, "Initializing {} IPs", self.chip.ip_count());
        self.func_all_ip(Operation::InitStructures)
    }

    /// Discovers the present elements and instances of all IP blocks
    pub fn finalize_chip_info(&mut self) -> Result<(), Error> {
        self.func_all_ip(Operation::UpdateInstMask)
    }

    /// Frees the slot arrays of all IP blocks
    pub fn release_structures(&mut self) -> Result<(), Error> {
        self.func_all_ip(Operation::ReleaseStructures)
    }

    /// Marks the instance of IP `ip_idx` at `base_addr` as available or unavailable
    pub fn ip_register(
        &mut self,
        ip_idx: u32,
        base_addr: u64,
        available: bool,
    ) -> Result<(), Error> {
        let mut args = FuncArgs::new(
            Operation::MatchBaseAddress {
                base_addr,
                available,
            },
            None,
            &self.chip,
        );
        self.coord.func_ip(&mut self.chip, ip_idx, &mut args)?;

        if !args.matched() {
            log!(
                LogFlags::Error,
                "IP {}: no instance at {:#x}",
                ip_idx,
                base_addr
            );
            return Err(Error::new(Code::NotFound));
        }
        Ok(())
    }

    /// Reserves the IP block with index `ip_idx`
    ///
    /// If a later instance cannot be reserved, all instances reserved so far are released again
    /// and the error is flagged as rolled back.
    pub fn reserve_resource(&mut self, ip_idx: u32) -> Result<(), Error> {
        let ip = self.chip.ip(ip_idx)?;
        if ip.status() == ResourceStatus::Invalid || ip.override_enabled() {
            log!(LogFlags::Error, "{}: not reservable", ip.name());
            return Err(Error::new(Code::NotReservable));
        }
        self.func_ip(ip_idx, Operation::ReserveGivenResource)
    }

    /// Reserves the router IP block
    pub fn reserve_router(&mut self) -> Result<(), Error> {
        self.reserve_resource(self.coord.topology().router_ip_idx())
    }

    /// Releases all reserved IP blocks, the router last
    ///
    /// A router index without IP block has nothing to release and is skipped.
    pub fn release_resources(&mut self) -> Result<(), Error> {
        self.func_all_ip(Operation::ReleaseResources)?;
        let router = self.coord.topology().router_ip_idx();
        if self.chip.ip(router).is_err() {
            log!(LogFlags::HwpmRes, "Router IP {} not populated, skipping", router);
            return Ok(());
        }
        self.func_ip(router, Operation::ReleaseRouter)
    }

    /// Clears and enables the elements of all reserved IP blocks
    pub fn bind_resources(&mut self) -> Result<(), Error> {
        self.func_all_ip(Operation::BindResources)
    }

    /// Disables and clears the elements of all reserved IP blocks
    pub fn unbind_resources(&mut self) -> Result<(), Error> {
        self.func_all_ip(Operation::UnbindResources)
    }

    /// Returns the number of allow-list entries of all available elements
    pub fn get_alist_size(&mut self) -> Result<usize, Error> {
        self.func_all_ip(Operation::GetAlistSize)?;
        log!(LogFlags::HwpmAlist, "Allow-list size: {}", self.chip.alist_size());
        Ok(self.chip.alist_size())
    }

    /// Writes the allow-list of all available elements into `buf` and returns the number of entries
    ///
    /// If the size has been determined before, the number of written entries has to match it.
    pub fn combine_alist(&mut self, buf: &mut [u64]) -> Result<usize, Error> {
        let mut args = FuncArgs::new(Operation::CombineAlist, Some(buf), &self.chip);
        self.coord.func_all_ip(&mut self.chip, &mut args)?;

        let written = args.cursor();
        let expected = self.chip.alist_size();
        if expected != 0 && written != expected {
            log!(
                LogFlags::Error,
                "Allow-list mismatch: wrote {} entries, expected {}",
                written,
                expected
            );
            return Err(Error::new(Code::InvArgs));
        }
        Ok(written)
    }

    /// Returns a summary of all IP blocks
    pub fn resource_info(&self) -> Vec<ResourceInfo> {
        self.chip
            .ips()
            .iter()
            .enumerate()
            .map(|(idx, ip)| ResourceInfo {
                ip_idx: idx as u32,
                name: ip.name(),
                status: ip.status(),
                reserved: ip.is_reserved(),
                inst_fs_mask: ip.inst_fs_mask(),
            })
            .collect()
    }
}
