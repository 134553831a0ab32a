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

//! Builds the dynamic slot arrays that map addresses to instances and elements
//!
//! Each aperture range `[range_start, range_end]` is partitioned into `stride`-sized slots. A slot
//! holds the index of the instance or element whose address falls into it, or `None` if there is
//! no such instance or element.

use base::col::Vec;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;

use crate::chip::{ApertureType, ElementInfo, Instance, IpBlock};

/// Allocates and frees slot arrays
pub trait SlotAllocator {
    /// Allocates `count` empty slots or returns `None` if the memory is not available
    fn alloc_slots(&mut self, count: usize) -> Option<Vec<Option<usize>>>;

    /// Frees the given slots
    fn free_slots(&mut self, slots: Vec<Option<usize>>);
}

/// The default allocator that uses the heap
#[derive(Default, Debug)]
pub struct HeapAllocator;

impl SlotAllocator for HeapAllocator {
    fn alloc_slots(&mut self, count: usize) -> Option<Vec<Option<usize>>> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(count).ok()?;
        slots.resize(count, None);
        Some(slots)
    }

    fn free_slots(&mut self, slots: Vec<Option<usize>>) {
        drop(slots);
    }
}

/// Returns the number of slots in the given range
pub fn slot_count(range_start: u64, range_end: u64, stride: u64) -> Result<usize, Error> {
    if stride == 0 || range_end < range_start {
        log!(
            LogFlags::Error,
            "Invalid range [{:#x}, {:#x}] with stride {:#x}",
            range_start,
            range_end,
            stride
        );
        return Err(Error::new(Code::InvArgs));
    }
    let size = (range_end - range_start).checked_add(1).ok_or_else(|| {
        log!(
            LogFlags::Error,
            "Range [{:#x}, {:#x}] covers the whole address space",
            range_start,
            range_end
        );
        Error::new(Code::InvArgs)
    })?;
    Ok((size / stride) as usize)
}

/// Returns the slot index of `addr` in a range starting at `range_start`
pub fn slot_index(addr: u64, range_start: u64, stride: u64, count: usize) -> Result<usize, Error> {
    if stride == 0 || addr < range_start {
        return Err(Error::new(Code::InvArgs));
    }
    let idx = (addr - range_start) / stride;
    if idx >= count as u64 {
        return Err(Error::new(Code::InvArgs));
    }
    Ok(idx as usize)
}

fn alloc(alloc: &mut dyn SlotAllocator, count: usize) -> Result<Vec<Option<usize>>, Error> {
    alloc.alloc_slots(count).ok_or_else(|| {
        log!(LogFlags::Error, "Unable to allocate {} slots", count);
        Error::new(Code::OutOfMem)
    })
}

/// Allocates the instance slots of all non-empty aperture types of `ip` and registers its
/// instances
///
/// Slot arrays that have been allocated before are kept. If the slots of an aperture type cannot
/// be allocated or filled, no array is assigned for it, but the arrays of the preceding aperture
/// types stay allocated; they are freed by [`free_instance_slots`].
pub fn compute_instance_slots(
    allocator: &mut dyn SlotAllocator,
    ip: &mut IpBlock,
) -> Result<(), Error> {
    let name = ip.name();
    for ty in ApertureType::ALL {
        let ap = &mut ip.apertures[ty.idx()];
        if ap.is_empty_range() || !ap.slots.is_empty() {
            continue;
        }

        let count = slot_count(ap.range_start(), ap.range_end(), ap.stride())?;
        let mut slots = alloc(allocator, count)?;

        log!(
            LogFlags::HwpmInit,
            "{}: {:?} instance slots: {} (stride {:#x})",
            name,
            ty,
            count,
            ap.stride()
        );

        for (idx, inst) in ip.instances.iter().enumerate() {
            let info = inst.aperture(ty);
            if info.is_empty_range() {
                continue;
            }
            match slot_index(info.range_start(), ap.range_start(), ap.stride(), count) {
                Ok(slot) => slots[slot] = Some(idx),
                Err(e) => {
                    log!(
                        LogFlags::Error,
                        "{}: instance {} @ {:#x} outside of {:?} range",
                        name,
                        idx,
                        info.range_start(),
                        ty
                    );
                    allocator.free_slots(slots);
                    return Err(e);
                },
            }
        }

        ap.slots = slots;
    }
    Ok(())
}

/// Allocates the element slots of one aperture type and registers its elements
pub fn compute_element_slots(
    allocator: &mut dyn SlotAllocator,
    info: &mut ElementInfo,
) -> Result<(), Error> {
    if info.is_empty_range() || !info.slots.is_empty() {
        return Ok(());
    }

    let count = slot_count(info.range_start(), info.range_end(), info.stride())?;
    let mut slots = alloc(allocator, count)?;

    for (idx, elem) in info.elements().iter().enumerate() {
        let slot = match slot_index(elem.start_abs_pa(), info.range_start(), info.stride(), count)
        {
            Ok(slot) => slot,
            Err(e) => {
                log!(
                    LogFlags::Error,
                    "Element @ {:#x} outside of range [{:#x}, {:#x}]",
                    elem.start_abs_pa(),
                    info.range_start(),
                    info.range_end()
                );
                allocator.free_slots(slots);
                return Err(e);
            },
        };
        slots[slot] = Some(idx);
    }

    info.slots = slots;
    Ok(())
}

/// Frees the instance slots of all aperture types of `ip`
pub fn free_instance_slots(allocator: &mut dyn SlotAllocator, ip: &mut IpBlock) {
    for ap in ip.apertures.iter_mut() {
        if !ap.slots.is_empty() {
            allocator.free_slots(core::mem::take(&mut ap.slots));
        }
    }
}

/// Frees the element slots of all aperture types of `inst`
pub fn free_element_slots(allocator: &mut dyn SlotAllocator, inst: &mut Instance) {
    for ty in ApertureType::ALL {
        let info = inst.aperture_mut(ty);
        if !info.slots.is_empty() {
            allocator.free_slots(core::mem::take(&mut info.slots));
        }
    }
}

/// Returns the index of the instance of `ip` whose `ty` range contains `addr`
pub fn lookup_instance(ip: &IpBlock, ty: ApertureType, addr: u64) -> Option<usize> {
    let ap = ip.aperture(ty);
    if ap.is_empty_range() || addr > ap.range_end() {
        return None;
    }
    let idx = slot_index(addr, ap.range_start(), ap.stride(), ap.slots().len()).ok()?;
    ap.slots()[idx]
}
