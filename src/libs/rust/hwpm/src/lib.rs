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

//! The hardware performance-monitoring (HWPM) resource manager
//!
//! The chip is modeled as a tree: IP blocks contain instances, instances contain elements
//! (perfmons, perfmuxes, and broadcast units), grouped by aperture type. All lifecycle phases are
//! implemented as operations that are executed by a single generic walk over this tree (see
//! [`coordinator`]). Register access, power management, and the chip layout are provided by the
//! caller via the traits in [`ops`].

#![cfg_attr(not(test), no_std)]

pub mod alist;
pub mod chip;
pub mod coordinator;
pub mod element;
pub mod floorsweep;
pub mod manager;
pub mod ops;
pub mod slots;

pub use chip::{
    ApertureType, Chip, Element, ElementInfo, ElementType, Instance, IpBlock, RegOffsetEntry,
    ResourceStatus,
};
pub use coordinator::Operation;
pub use manager::{Hwpm, ResourceInfo};
