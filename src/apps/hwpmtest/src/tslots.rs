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
use base::cell::Cell;
use base::errors::Code;
use base::rc::Rc;
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use hwpm::slots;
use hwpm::{ApertureType, ElementType};

use crate::helper::{self, LimitedAllocator, INST_STRIDE};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, slot_arithmetic);
    wv_run_test!(t, init_registers_instances);
    wv_run_test!(t, init_registers_elements);
    wv_run_test!(t, empty_apertures);
    wv_run_test!(t, init_twice);
    wv_run_test!(t, release_and_reinit);
    wv_run_test!(t, out_of_memory);
    wv_run_test!(t, instance_outside_range);
}

fn slot_arithmetic(t: &mut dyn WvTester) {
    wv_assert_eq!(t, slots::slot_count(0x1000, 0x1fff, 0x100), Ok(16));
    wv_assert_eq!(t, slots::slot_count(0x1000, 0x1000, 0x1), Ok(1));
    wv_assert_err!(t, slots::slot_count(0x1000, 0x1fff, 0), Code::InvArgs);
    wv_assert_err!(t, slots::slot_count(0x2000, 0x1fff, 0x100), Code::InvArgs);
    wv_assert_err!(t, slots::slot_count(0, u64::MAX, 0x1000), Code::InvArgs);

    wv_assert_eq!(t, slots::slot_index(0x1234, 0x1000, 0x100, 16), Ok(2));
    wv_assert_eq!(t, slots::slot_index(0x1fff, 0x1000, 0x100, 16), Ok(15));
    wv_assert_err!(t, slots::slot_index(0x2000, 0x1000, 0x100, 16), Code::InvArgs);
    wv_assert_err!(t, slots::slot_index(0xfff, 0x1000, 0x100, 16), Code::InvArgs);
}

fn init_registers_instances(t: &mut dyn WvTester) {
    let mut env = helper::setup_default();
    wv_assert_ok!(env.hwpm.init_structures());

    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    for ty in [ApertureType::Perfmux, ApertureType::Perfmon] {
        wv_assert_eq!(t, ip.aperture(ty).slots(), &[Some(0), Some(1)][..]);
    }

    wv_assert_eq!(
        t,
        slots::lookup_instance(ip, ApertureType::Perfmux, helper::mux_addr(0, 1)),
        Some(1)
    );
    wv_assert_eq!(
        t,
        slots::lookup_instance(ip, ApertureType::Perfmon, helper::mon_addr(0, 0) + 0x10),
        Some(0)
    );
    wv_assert_eq!(
        t,
        slots::lookup_instance(ip, ApertureType::Perfmux, helper::mux_addr(0, 2)),
        None
    );
    wv_assert_eq!(
        t,
        slots::lookup_instance(ip, ApertureType::Broadcast, helper::mux_addr(0, 0)),
        None
    );
}

fn init_registers_elements(t: &mut dyn WvTester) {
    let mut env = helper::setup_default();
    wv_assert_ok!(env.hwpm.init_structures());

    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    let inst = wv_assert_some!(ip.instance(1));
    let mons = inst.aperture(ApertureType::Perfmon);
    wv_assert_eq!(t, mons.slots(), &[Some(0)][..]);
    wv_assert_eq!(t, mons.num_element_per_inst(), 1);

    let elem = wv_assert_some!(mons.element_at(helper::mon_addr(0, 1) + 0x8));
    wv_assert_eq!(t, elem.element_type(), ElementType::Perfmon);
    wv_assert_eq!(t, elem.start_abs_pa(), helper::mon_addr(0, 1));
    wv_assert!(t, mons.element_at(helper::mon_addr(0, 1) + INST_STRIDE).is_none());
}

fn empty_apertures(t: &mut dyn WvTester) {
    let mut env = helper::setup_default();
    wv_assert_ok!(env.hwpm.init_structures());

    for ip in env.hwpm.chip().ips() {
        let bcast = ip.aperture(ApertureType::Broadcast);
        wv_assert!(t, bcast.is_empty_range());
        wv_assert!(t, bcast.slots().is_empty());
        for inst in ip.instances() {
            wv_assert!(t, inst.aperture(ApertureType::Broadcast).slots().is_empty());
        }
    }

    // all other operations ignore the empty apertures as well
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_ok!(env.hwpm.bind_resources());
    wv_assert_ok!(env.hwpm.unbind_resources());
    wv_assert_ok!(env.hwpm.release_resources());
}

fn init_twice(t: &mut dyn WvTester) {
    let outstanding = Rc::new(Cell::new(0));
    let mut env = helper::setup_default();
    env.hwpm = env
        .hwpm
        .with_allocator(Box::new(LimitedAllocator::new(100, outstanding.clone())));

    wv_assert_ok!(env.hwpm.init_structures());
    // 2 instance arrays and 2 element arrays per instance; 3 instances in total
    wv_assert_eq!(t, outstanding.get(), 2 * 2 + 3 * 2);

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_eq!(t, outstanding.get(), 2 * 2 + 3 * 2);

    wv_assert_ok!(env.hwpm.release_structures());
    wv_assert_eq!(t, outstanding.get(), 0);
}

fn release_and_reinit(t: &mut dyn WvTester) {
    let mut env = helper::setup_default();
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.release_structures());

    for ip in env.hwpm.chip().ips() {
        wv_assert!(t, ip.aperture(ApertureType::Perfmux).slots().is_empty());
        for inst in ip.instances() {
            wv_assert!(t, inst.aperture(ApertureType::Perfmon).slots().is_empty());
        }
    }

    // releasing again is harmless
    wv_assert_ok!(env.hwpm.release_structures());

    wv_assert_ok!(env.hwpm.init_structures());
    let ip = wv_assert_ok!(env.hwpm.chip().ip(1));
    wv_assert_eq!(t, ip.aperture(ApertureType::Perfmux).slots(), &[Some(0)][..]);
}

fn out_of_memory(t: &mut dyn WvTester) {
    let outstanding = Rc::new(Cell::new(0));
    let mut env = helper::setup_default();
    env.hwpm = env
        .hwpm
        .with_allocator(Box::new(LimitedAllocator::new(1, outstanding.clone())));

    wv_assert_err!(t, env.hwpm.init_structures(), Code::OutOfMem);
    // the perfmux array stays allocated until the structures are released
    wv_assert_eq!(t, outstanding.get(), 1);
    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    wv_assert_eq!(t, ip.aperture(ApertureType::Perfmux).slots().len(), 2);
    wv_assert!(t, ip.aperture(ApertureType::Perfmon).slots().is_empty());

    wv_assert_ok!(env.hwpm.release_structures());
    wv_assert_eq!(t, outstanding.get(), 0);
}

fn instance_outside_range(t: &mut dyn WvTester) {
    let ip = helper::build_ip("vic", 0, 2, ElementType::Perfmux).with_aperture(
        ApertureType::Perfmux,
        helper::mux_addr(0, 0),
        helper::mux_addr(0, 0) + INST_STRIDE - 1,
        INST_STRIDE,
    );
    let outstanding = Rc::new(Cell::new(0));
    let mut env = helper::setup(base::vec![ip], 0);
    env.hwpm = env
        .hwpm
        .with_allocator(Box::new(LimitedAllocator::new(16, outstanding.clone())));

    wv_assert_err!(t, env.hwpm.init_structures(), Code::InvArgs);
    // the partially filled array is not kept
    wv_assert_eq!(t, outstanding.get(), 0);
    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    wv_assert!(t, ip.aperture(ApertureType::Perfmux).slots().is_empty());

    // and the next attempt detects the invalid layout again
    wv_assert_err!(t, env.hwpm.init_structures(), Code::InvArgs);
    wv_assert_eq!(t, outstanding.get(), 0);

    wv_assert_ok!(env.hwpm.release_structures());
}
