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

//! Builds the allow-list of registers that user space may access

use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;

use crate::chip::Element;

/// Adds the allow-list size of `elem` to `total`
pub fn add_element_alist_size(elem: &Element, total: &mut usize) {
    log!(
        LogFlags::HwpmAlist,
        "Element @ {:#x}: {} allow-list entries",
        elem.start_abs_pa(),
        elem.alist_size()
    );
    *total += elem.alist_size();
}

/// Copies the allow-list of `elem` as absolute addresses into `buf`, starting at `*cursor`
///
/// `*cursor` is advanced by the number of copied entries.
pub fn copy_element_alist(
    elem: &Element,
    buf: &mut [u64],
    cursor: &mut usize,
) -> Result<(), Error> {
    let alist = match elem.alist() {
        Some(alist) => alist,
        None => {
            log!(
                LogFlags::Error,
                "Element @ {:#x} has no allow-list",
                elem.start_abs_pa()
            );
            return Err(Error::new(Code::InvArgs));
        },
    };

    let end = *cursor + alist.len();
    if end > buf.len() {
        log!(
            LogFlags::Error,
            "Allow-list buffer too small ({} entries, need {})",
            buf.len(),
            end
        );
        return Err(Error::new(Code::NoSpace));
    }

    for (dst, entry) in buf[*cursor..end].iter_mut().zip(alist.iter()) {
        *dst = elem.reg_addr(entry.reg_offset)?;
    }
    *cursor = end;
    Ok(())
}
