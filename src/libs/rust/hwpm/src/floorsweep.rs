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

//! Discovers which elements of an instance are present
//!
//! Only the perfmux aperture is inspected: the perfmuxes of an instance decide whether the whole
//! instance is usable. Elements of the other aperture types share the resulting mask.

use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::math;

use crate::chip::{ApertureType, Element, ElementType, Instance};
use crate::ops::FloorsweepProbe;

/// Returns the absolute address that is read to test whether `elem` is present
pub fn probe_addr(elem: &Element) -> Result<u64, Error> {
    match elem.alist().and_then(|a| a.first()) {
        Some(entry) => elem.reg_addr(entry.reg_offset),
        None => {
            log!(
                LogFlags::Error,
                "Element @ {:#x} has no allow-list to probe",
                elem.start_abs_pa()
            );
            Err(Error::new(Code::InvArgs))
        },
    }
}

/// Updates the element availability of `inst` and returns true if any element is left
pub fn update_inst_mask(
    probe: &mut dyn FloorsweepProbe,
    ip_idx: u32,
    inst_idx: usize,
    inst: &mut Instance,
) -> Result<bool, Error> {
    let fuse_mask = inst.fuse_fs_mask();
    let mut fs_mask = inst.element_fs_mask;

    let info = inst.aperture(ApertureType::Perfmux);
    if !info.is_empty_range() {
        for elem in info.elements() {
            let bit = elem.index_mask();
            let present = if elem.element_type() == ElementType::Perfmux {
                true
            }
            else if fuse_mask != 0 && !math::is_bit_set(fuse_mask, bit) {
                log!(
                    LogFlags::HwpmFs,
                    "IP {} inst {}: element {:#x} fused off",
                    ip_idx,
                    inst_idx,
                    bit
                );
                false
            }
            else {
                let addr = probe_addr(elem)?;
                match probe.read_register(ip_idx, inst_idx, elem, addr) {
                    Ok(_) => true,
                    Err(e) => {
                        log!(
                            LogFlags::HwpmFs,
                            "IP {} inst {}: element {:#x} @ {:#x} not responding ({:?})",
                            ip_idx,
                            inst_idx,
                            bit,
                            addr,
                            e
                        );
                        false
                    },
                }
            };
            fs_mask = math::set_bit(fs_mask, bit, present);
        }
    }

    log!(
        LogFlags::HwpmFs,
        "IP {} inst {}: element_fs_mask {:#x} -> {:#x}",
        ip_idx,
        inst_idx,
        inst.element_fs_mask,
        fs_mask
    );
    inst.element_fs_mask = fs_mask;
    Ok(fs_mask != 0)
}
