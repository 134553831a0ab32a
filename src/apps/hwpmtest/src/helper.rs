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
use base::cell::{Cell, RefCell};
use base::col::{BTreeMap, BTreeSet, Vec};
use base::errors::{Code, Error};
use base::rc::Rc;
use base::vec;
use base::wv_assert_ok;

use hwpm::ops::{ControlRegs, GenericStrategy, PowerGate, RegisterIo, StaticTopology};
use hwpm::slots::SlotAllocator;
use hwpm::{
    ApertureType, Chip, Element, ElementInfo, ElementType, Hwpm, Instance, IpBlock,
    RegOffsetEntry,
};

pub const MUX_BASE: u64 = 0x1000_0000;
pub const MON_BASE: u64 = 0x2000_0000;
pub const IP_SPACING: u64 = 0x10_0000;
pub const INST_STRIDE: u64 = 0x1000;

pub const CTRL: ControlRegs = ControlRegs {
    perfmon_ctrl: 0x8,
    perfmon_enable: 0x1,
    perfmux_ctrl: 0xc,
};

/// The allow-list entries of every perfmux and perfmon
pub const MUX_ALIST: usize = 2;
pub const MON_ALIST: usize = 3;

pub fn mux_addr(ip_idx: u32, inst_idx: usize) -> u64 {
    MUX_BASE + ip_idx as u64 * IP_SPACING + inst_idx as u64 * INST_STRIDE
}

pub fn mon_addr(ip_idx: u32, inst_idx: usize) -> u64 {
    MON_BASE + ip_idx as u64 * IP_SPACING + inst_idx as u64 * INST_STRIDE
}

/// A register file with addresses that fault on access
#[derive(Default)]
pub struct FakeRegs {
    regs: BTreeMap<u64, u32>,
    faulting: BTreeSet<u64>,
    reads: Vec<u64>,
    writes: Vec<(u64, u32)>,
}

impl FakeRegs {
    pub fn set(&mut self, addr: u64, val: u32) {
        self.regs.insert(addr, val);
    }

    pub fn get(&self, addr: u64) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    pub fn fault(&mut self, addr: u64) {
        self.faulting.insert(addr);
    }

    pub fn reads(&self) -> &[u64] {
        &self.reads
    }

    pub fn writes(&self) -> &[(u64, u32)] {
        &self.writes
    }

    pub fn clear_log(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }
}

impl RegisterIo for FakeRegs {
    fn read32(&mut self, addr: u64) -> Result<u32, Error> {
        self.reads.push(addr);
        if self.faulting.contains(&addr) {
            return Err(Error::new(Code::ReadFailed));
        }
        Ok(self.get(addr))
    }

    fn write32(&mut self, addr: u64, val: u32) -> Result<(), Error> {
        if self.faulting.contains(&addr) {
            return Err(Error::new(Code::WriteFailed));
        }
        self.writes.push((addr, val));
        self.regs.insert(addr, val);
        Ok(())
    }
}

/// Records power-management calls and fails on a chosen one
#[derive(Default)]
pub struct FakePower {
    calls: Vec<(u32, usize, bool)>,
    fail_on: Option<(u32, usize, bool)>,
}

impl FakePower {
    pub fn calls(&self) -> &[(u32, usize, bool)] {
        &self.calls
    }

    pub fn fail_on(&mut self, ip_idx: u32, inst_idx: usize, disable: bool) {
        self.fail_on = Some((ip_idx, inst_idx, disable));
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.fail_on = None;
    }
}

impl PowerGate for FakePower {
    fn handle_power_mgmt(
        &mut self,
        ip_idx: u32,
        inst_idx: usize,
        disable: bool,
    ) -> Result<(), Error> {
        self.calls.push((ip_idx, inst_idx, disable));
        if self.fail_on == Some((ip_idx, inst_idx, disable)) {
            return Err(Error::new(Code::WriteFailed));
        }
        Ok(())
    }
}

/// A slot allocator that fails after `budget` allocations and counts the outstanding arrays
pub struct LimitedAllocator {
    budget: usize,
    outstanding: Rc<Cell<usize>>,
}

impl LimitedAllocator {
    pub fn new(budget: usize, outstanding: Rc<Cell<usize>>) -> Self {
        Self {
            budget,
            outstanding,
        }
    }
}

impl SlotAllocator for LimitedAllocator {
    fn alloc_slots(&mut self, count: usize) -> Option<Vec<Option<usize>>> {
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        self.outstanding.set(self.outstanding.get() + 1);
        Some(vec![None; count])
    }

    fn free_slots(&mut self, _slots: Vec<Option<usize>>) {
        self.outstanding.set(self.outstanding.get() - 1);
    }
}

pub fn mux_alist() -> Vec<RegOffsetEntry> {
    vec![RegOffsetEntry::new(0x0, false), RegOffsetEntry::new(0x4, true)]
}

pub fn mon_alist() -> Vec<RegOffsetEntry> {
    vec![
        RegOffsetEntry::new(0x0, true),
        RegOffsetEntry::new(0x4, false),
        RegOffsetEntry::new(0x8, false),
    ]
}

/// Builds an instance with one multiplexer of type `mux_ty` and one perfmon, both with mask 0x1
pub fn build_inst(ip_idx: u32, inst_idx: usize, mux_ty: ElementType) -> Instance {
    let mux = mux_addr(ip_idx, inst_idx);
    let mon = mon_addr(ip_idx, inst_idx);
    Instance::new(1 << inst_idx)
        .with_element_fs_mask(0x1)
        .with_aperture(
            ApertureType::Perfmux,
            ElementInfo::new(mux, mux + INST_STRIDE - 1, INST_STRIDE)
                .with_element(Element::new(mux_ty, mux, 0x1).with_alist(mux_alist())),
        )
        .with_aperture(
            ApertureType::Perfmon,
            ElementInfo::new(mon, mon + INST_STRIDE - 1, INST_STRIDE).with_element(
                Element::new(ElementType::Perfmon, mon, 0x1).with_alist(mon_alist()),
            ),
        )
}

/// Builds an IP without instances, with room for `count` instances
pub fn empty_ip(name: &'static str, ip_idx: u32, count: usize) -> IpBlock {
    let end = count as u64 * INST_STRIDE - 1;
    IpBlock::new(name)
        .with_aperture(
            ApertureType::Perfmux,
            mux_addr(ip_idx, 0),
            mux_addr(ip_idx, 0) + end,
            INST_STRIDE,
        )
        .with_aperture(
            ApertureType::Perfmon,
            mon_addr(ip_idx, 0),
            mon_addr(ip_idx, 0) + end,
            INST_STRIDE,
        )
}

/// Builds an IP with `count` instances as created by [`build_inst`]
pub fn build_ip(name: &'static str, ip_idx: u32, count: usize, mux_ty: ElementType) -> IpBlock {
    let mut ip = empty_ip(name, ip_idx, count);
    for i in 0..count {
        ip = ip.with_instance(build_inst(ip_idx, i, mux_ty));
    }
    ip
}

pub struct Env {
    pub hwpm: Hwpm,
    pub regs: Rc<RefCell<FakeRegs>>,
    pub power: Rc<RefCell<FakePower>>,
}

/// Creates a manager for the given IPs, with `router` as router IP
pub fn setup(ips: Vec<IpBlock>, router: u32) -> Env {
    let count = ips.len() as u32;
    setup_with_topology(ips, count, router)
}

/// Creates a manager for the given IPs that walks the IP indices `0..ip_max`
pub fn setup_with_topology(ips: Vec<IpBlock>, ip_max: u32, router: u32) -> Env {
    let mut chip = Chip::new();
    for ip in ips {
        wv_assert_ok!(chip.add_ip(ip));
    }

    let regs = Rc::new(RefCell::new(FakeRegs::default()));
    let power = Rc::new(RefCell::new(FakePower::default()));
    let hwpm = Hwpm::new(
        chip,
        Box::new(GenericStrategy::new(regs.clone(), CTRL)),
        Box::new(regs.clone()),
        Box::new(power.clone()),
        Box::new(StaticTopology::new(ip_max, router)),
    );

    Env { hwpm, regs, power }
}

/// Creates the default chip: "vic" with two instances at index 0 and the router "pma" at index 1
pub fn setup_default() -> Env {
    setup(
        vec![
            build_ip("vic", 0, 2, ElementType::Perfmux),
            build_ip("pma", 1, 1, ElementType::Perfmux),
        ],
        1,
    )
}

/// Creates the default chip and initializes its structures
pub fn setup_initialized() -> Env {
    let mut env = setup_default();
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    env
}

/// Returns the elements of the given instance in walk order
pub fn elements(hwpm: &Hwpm, ip_idx: u32, inst_idx: usize) -> Vec<Element> {
    let ip = wv_assert_ok!(hwpm.chip().ip(ip_idx));
    let inst = &ip.instances()[inst_idx];
    ApertureType::ALL
        .iter()
        .flat_map(|ty| inst.aperture(*ty).elements().iter().cloned())
        .collect()
}

/// Returns true if any element of the given instance is reserved
pub fn inst_reserved(hwpm: &Hwpm, ip_idx: u32, inst_idx: usize) -> bool {
    elements(hwpm, ip_idx, inst_idx).iter().any(|e| e.is_reserved())
}
