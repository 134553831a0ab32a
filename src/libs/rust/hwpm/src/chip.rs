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

//! The resource tree: chip, IP blocks, instances, and elements
//!
//! The static part of the tree (address ranges, strides, element types, allow-lists) is supplied
//! by the caller when building the chip and never changes afterwards. The dynamic part consists of
//! the availability masks, the reservation state, and the slot arrays, which are indices into the
//! owning vectors of the parent node.

use base::col::Vec;
use base::const_assert;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::math;

use num_enum::{FromPrimitive, IntoPrimitive};

/// The maximum number of instances per IP block (one bit each in `inst_fs_mask`)
pub const MAX_INSTANCES: usize = 32;
/// The maximum number of elements per instance and aperture type
pub const MAX_ELEMENTS: usize = 32;
/// The number of aperture types
pub const APERTURE_TYPE_COUNT: usize = 3;

const_assert!(MAX_INSTANCES <= u32::BITS as usize);
const_assert!(MAX_ELEMENTS <= u32::BITS as usize);

/// The categories of address ranges
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(usize)]
pub enum ApertureType {
    /// Multiplexer (perfmux) registers, including the IP-local ones
    Perfmux,
    /// Broadcast registers
    Broadcast,
    /// Counter (perfmon) registers
    Perfmon,
}

impl ApertureType {
    /// All aperture types in walk order
    pub const ALL: [ApertureType; APERTURE_TYPE_COUNT] = [
        ApertureType::Perfmux,
        ApertureType::Broadcast,
        ApertureType::Perfmon,
    ];

    /// Returns the index of this aperture type in the per-aperture arrays
    pub fn idx(self) -> usize {
        self.into()
    }
}

/// The kinds of elements
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum ElementType {
    /// A counter unit
    Perfmon,
    /// The hub multiplexer of an instance
    Perfmux,
    /// An IP-local multiplexer, accessed on behalf of the IP driver
    IpPerfmux,
    /// An IP-local broadcast unit
    IpBroadcast,
    /// Unknown descriptor types end up here
    #[num_enum(default)]
    Invalid,
}

/// The availability of an IP block
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResourceStatus {
    Valid,
    Invalid,
}

/// A register that user space may access, relative to the element's base address
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegOffsetEntry {
    pub reg_offset: u64,
    pub zero_at_init: bool,
}

impl RegOffsetEntry {
    pub const fn new(reg_offset: u64, zero_at_init: bool) -> Self {
        Self {
            reg_offset,
            zero_at_init,
        }
    }
}

/// A performance-monitoring unit inside an instance
#[derive(Clone, Debug)]
pub struct Element {
    ty: ElementType,
    start_abs_pa: u64,
    index_mask: u32,
    alist: Option<Vec<RegOffsetEntry>>,
    reserved: bool,
}

impl Element {
    pub fn new(ty: ElementType, start_abs_pa: u64, index_mask: u32) -> Self {
        Self {
            ty,
            start_abs_pa,
            index_mask,
            alist: None,
            reserved: false,
        }
    }

    pub fn with_alist(mut self, alist: Vec<RegOffsetEntry>) -> Self {
        self.alist = Some(alist);
        self
    }

    pub fn element_type(&self) -> ElementType {
        self.ty
    }

    pub fn start_abs_pa(&self) -> u64 {
        self.start_abs_pa
    }

    /// Returns the absolute address of the register at `offset` within this element
    pub fn reg_addr(&self, offset: u64) -> Result<u64, Error> {
        self.start_abs_pa.checked_add(offset).ok_or_else(|| {
            log!(
                LogFlags::Error,
                "Element @ {:#x}: register offset {:#x} out of range",
                self.start_abs_pa,
                offset
            );
            Error::new(Code::InvArgs)
        })
    }

    /// Returns the bit of this element within its instance and aperture type
    pub fn index_mask(&self) -> u32 {
        self.index_mask
    }

    pub fn alist(&self) -> Option<&[RegOffsetEntry]> {
        self.alist.as_deref()
    }

    /// Returns the number of allow-list entries (0 if the element has no allow-list)
    pub fn alist_size(&self) -> usize {
        self.alist.as_ref().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub(crate) fn set_reserved(&mut self, reserved: bool) {
        self.reserved = reserved;
    }
}

/// The elements of one aperture type within an instance
#[derive(Clone, Debug, Default)]
pub struct ElementInfo {
    range_start: u64,
    range_end: u64,
    stride: u64,
    elements: Vec<Element>,
    pub(crate) slots: Vec<Option<usize>>,
}

impl ElementInfo {
    pub fn new(range_start: u64, range_end: u64, stride: u64) -> Self {
        Self {
            range_start,
            range_end,
            stride,
            elements: Vec::new(),
            slots: Vec::new(),
        }
    }

    pub fn with_element(mut self, elem: Element) -> Self {
        self.elements.push(elem);
        self
    }

    pub fn range_start(&self) -> u64 {
        self.range_start
    }

    pub fn range_end(&self) -> u64 {
        self.range_end
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Returns true if this aperture type is not used by the instance
    pub fn is_empty_range(&self) -> bool {
        self.range_end == 0
    }

    pub fn num_element_per_inst(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    /// Returns the dynamic element slots (empty until the structures are initialized)
    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    /// Returns the element registered at the given absolute address, if any
    pub fn element_at(&self, addr: u64) -> Option<&Element> {
        if self.slots.is_empty() || addr < self.range_start || self.stride == 0 {
            return None;
        }
        let idx = ((addr - self.range_start) / self.stride) as usize;
        match self.slots.get(idx) {
            Some(Some(e)) => self.elements.get(*e),
            _ => None,
        }
    }
}

/// One physical replica of an IP block
#[derive(Clone, Debug)]
pub struct Instance {
    hw_inst_mask: u32,
    fuse_fs_mask: u32,
    pub(crate) element_fs_mask: u32,
    infos: [ElementInfo; APERTURE_TYPE_COUNT],
}

impl Instance {
    pub fn new(hw_inst_mask: u32) -> Self {
        Self {
            hw_inst_mask,
            fuse_fs_mask: 0,
            element_fs_mask: 0,
            infos: Default::default(),
        }
    }

    /// Sets the fixed floorsweep pattern from the fuses (0 means "no fuse information")
    pub fn with_fuse_fs_mask(mut self, mask: u32) -> Self {
        self.fuse_fs_mask = mask;
        self
    }

    /// Sets the initial element availability
    pub fn with_element_fs_mask(mut self, mask: u32) -> Self {
        self.element_fs_mask = mask;
        self
    }

    pub fn with_aperture(mut self, ty: ApertureType, info: ElementInfo) -> Self {
        self.infos[ty.idx()] = info;
        self
    }

    pub fn hw_inst_mask(&self) -> u32 {
        self.hw_inst_mask
    }

    pub fn fuse_fs_mask(&self) -> u32 {
        self.fuse_fs_mask
    }

    /// Returns the mask of available elements
    pub fn element_fs_mask(&self) -> u32 {
        self.element_fs_mask
    }

    pub fn aperture(&self, ty: ApertureType) -> &ElementInfo {
        &self.infos[ty.idx()]
    }

    pub(crate) fn aperture_mut(&mut self, ty: ApertureType) -> &mut ElementInfo {
        &mut self.infos[ty.idx()]
    }

    /// Returns true if any element of this instance is reserved
    pub fn has_reserved_elements(&self) -> bool {
        self.infos
            .iter()
            .any(|info| info.elements.iter().any(|e| e.is_reserved()))
    }

    fn validate(&self, name: &str) -> Result<(), Error> {
        for ty in ApertureType::ALL {
            let info = self.aperture(ty);
            if info.elements.len() > MAX_ELEMENTS {
                log!(
                    LogFlags::Error,
                    "{}: too many {:?} elements ({})",
                    name,
                    ty,
                    info.elements.len()
                );
                return Err(Error::new(Code::InvArgs));
            }

            let mut seen = 0u32;
            for e in &info.elements {
                if !math::is_single_bit(e.index_mask) || math::is_bit_set(seen, e.index_mask) {
                    log!(
                        LogFlags::Error,
                        "{}: invalid element mask {:#x} for element @ {:#x}",
                        name,
                        e.index_mask,
                        e.start_abs_pa
                    );
                    return Err(Error::new(Code::InvArgs));
                }
                seen |= e.index_mask;
            }
        }
        Ok(())
    }
}

/// The instance address ranges of one aperture type within an IP block
#[derive(Clone, Debug, Default)]
pub struct InstApertureInfo {
    range_start: u64,
    range_end: u64,
    stride: u64,
    pub(crate) slots: Vec<Option<usize>>,
}

impl InstApertureInfo {
    pub fn range_start(&self) -> u64 {
        self.range_start
    }

    pub fn range_end(&self) -> u64 {
        self.range_end
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn is_empty_range(&self) -> bool {
        self.range_end == 0
    }

    /// Returns the dynamic instance slots (empty until the structures are initialized)
    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }
}

/// A hardware functional unit with one or more instances
#[derive(Clone, Debug)]
pub struct IpBlock {
    name: &'static str,
    pub(crate) inst_fs_mask: u32,
    pub(crate) status: ResourceStatus,
    pub(crate) reserved: bool,
    override_enable: bool,
    pub(crate) apertures: [InstApertureInfo; APERTURE_TYPE_COUNT],
    pub(crate) instances: Vec<Instance>,
}

impl IpBlock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inst_fs_mask: 0,
            status: ResourceStatus::Invalid,
            reserved: false,
            override_enable: false,
            apertures: Default::default(),
            instances: Vec::new(),
        }
    }

    pub fn with_aperture(
        mut self,
        ty: ApertureType,
        range_start: u64,
        range_end: u64,
        stride: u64,
    ) -> Self {
        self.apertures[ty.idx()] = InstApertureInfo {
            range_start,
            range_end,
            stride,
            slots: Vec::new(),
        };
        self
    }

    /// Adds the given instance and marks it present
    pub fn with_instance(mut self, inst: Instance) -> Self {
        self.inst_fs_mask |= inst.hw_inst_mask;
        self.instances.push(inst);
        self
    }

    /// Overrides the mask of present instances
    pub fn with_inst_fs_mask(mut self, mask: u32) -> Self {
        self.inst_fs_mask = mask;
        self
    }

    /// Excludes this IP from reservations (e.g., because it is managed elsewhere)
    pub fn with_override(mut self, enable: bool) -> Self {
        self.override_enable = enable;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Returns the mask of present instances
    pub fn inst_fs_mask(&self) -> u32 {
        self.inst_fs_mask
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn override_enabled(&self) -> bool {
        self.override_enable
    }

    pub fn aperture(&self, ty: ApertureType) -> &InstApertureInfo {
        &self.apertures[ty.idx()]
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, idx: usize) -> Option<&Instance> {
        self.instances.get(idx)
    }

    /// Returns true if the given instance is currently present
    pub fn is_inst_available(&self, inst: &Instance) -> bool {
        math::is_bit_set(self.inst_fs_mask, inst.hw_inst_mask)
    }

    /// Clears the given instance from the present instances and invalidates the IP if none are left
    pub(crate) fn clear_inst(&mut self, hw_inst_mask: u32) {
        self.inst_fs_mask = math::set_bit(self.inst_fs_mask, hw_inst_mask, false);
        if self.inst_fs_mask == 0 {
            log!(LogFlags::HwpmFs, "{}: no instances left, invalidating", self.name);
            self.status = ResourceStatus::Invalid;
        }
    }

    /// Marks the given instance as present and validates the IP
    pub(crate) fn set_inst(&mut self, hw_inst_mask: u32) {
        self.inst_fs_mask = math::set_bit(self.inst_fs_mask, hw_inst_mask, true);
        self.status = ResourceStatus::Valid;
    }

    fn validate(&self) -> Result<(), Error> {
        if self.instances.len() > MAX_INSTANCES {
            log!(
                LogFlags::Error,
                "{}: too many instances ({})",
                self.name,
                self.instances.len()
            );
            return Err(Error::new(Code::InvArgs));
        }

        let mut seen = 0u32;
        for inst in &self.instances {
            if !math::is_single_bit(inst.hw_inst_mask) || math::is_bit_set(seen, inst.hw_inst_mask)
            {
                log!(
                    LogFlags::Error,
                    "{}: invalid instance mask {:#x}",
                    self.name,
                    inst.hw_inst_mask
                );
                return Err(Error::new(Code::InvArgs));
            }
            seen |= inst.hw_inst_mask;
            inst.validate(self.name)?;
        }

        if (self.inst_fs_mask & !seen) != 0 {
            log!(
                LogFlags::Error,
                "{}: instance mask {:#x} refers to unknown instances",
                self.name,
                self.inst_fs_mask
            );
            return Err(Error::new(Code::InvArgs));
        }
        Ok(())
    }
}

/// The chip with all its IP blocks
#[derive(Debug, Default)]
pub struct Chip {
    ips: Vec<IpBlock>,
    pub(crate) alist_size: usize,
    pub(crate) alist_cursor: usize,
}

impl Chip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the given IP block and returns its index
    ///
    /// The IP is validated first: instance and element masks need to consist of exactly one bit
    /// that is unique among its siblings. The IP is valid if at least one instance is present.
    pub fn add_ip(&mut self, mut ip: IpBlock) -> Result<u32, Error> {
        ip.validate()?;
        ip.status = match ip.inst_fs_mask {
            0 => ResourceStatus::Invalid,
            _ => ResourceStatus::Valid,
        };
        self.ips.push(ip);
        Ok((self.ips.len() - 1) as u32)
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn ips(&self) -> &[IpBlock] {
        &self.ips
    }

    pub fn ip(&self, idx: u32) -> Result<&IpBlock, Error> {
        self.ips.get(idx as usize).ok_or_else(|| Error::new(Code::NotFound))
    }

    pub(crate) fn ip_mut(&mut self, idx: u32) -> Result<&mut IpBlock, Error> {
        self.ips
            .get_mut(idx as usize)
            .ok_or_else(|| Error::new(Code::NotFound))
    }

    /// Returns the allow-list size determined by the last walk
    pub fn alist_size(&self) -> usize {
        self.alist_size
    }
}
