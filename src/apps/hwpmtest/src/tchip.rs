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

use base::errors::Code;
use base::test::WvTester;
use base::{vec, wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use hwpm::floorsweep;
use hwpm::{
    ApertureType, Chip, Element, ElementType, Instance, IpBlock, Operation, RegOffsetEntry,
    ResourceStatus,
};

use crate::helper::{self, INST_STRIDE};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, invalid_layouts);
    wv_run_test!(t, unpopulated_ip);
    wv_run_test!(t, walk_stops_at_first_error);
    wv_run_test!(t, guards_skip);
    wv_run_test!(t, combine_without_buffer);
    wv_run_test!(t, lifecycle);
    wv_run_test!(t, register_addresses);
}

fn invalid_layouts(t: &mut dyn WvTester) {
    let mut chip = Chip::new();

    // instance masks need exactly one bit
    let ip = IpBlock::new("vic").with_instance(Instance::new(0x3));
    wv_assert_err!(t, chip.add_ip(ip), Code::InvArgs);

    let ip = IpBlock::new("vic")
        .with_instance(Instance::new(0x1))
        .with_instance(Instance::new(0x1));
    wv_assert_err!(t, chip.add_ip(ip), Code::InvArgs);

    let ip = IpBlock::new("vic")
        .with_instance(Instance::new(0x1))
        .with_inst_fs_mask(0x3);
    wv_assert_err!(t, chip.add_ip(ip), Code::InvArgs);

    // element masks need to be unique within an aperture type
    let inst = helper::build_inst(0, 0, ElementType::Perfmux);
    let mux = inst.aperture(ApertureType::Perfmux).clone();
    let dup = mux.clone().with_element(mux.elements()[0].clone());
    let ip = helper::empty_ip("vic", 0, 1)
        .with_instance(inst.with_aperture(ApertureType::Perfmux, dup));
    wv_assert_err!(t, chip.add_ip(ip), Code::InvArgs);

    wv_assert_eq!(t, chip.ip_count(), 0);

    let idx = wv_assert_ok!(chip.add_ip(IpBlock::new("empty")));
    wv_assert_eq!(t, idx, 0);
    wv_assert_eq!(t, wv_assert_ok!(chip.ip(0)).status(), ResourceStatus::Invalid);
    wv_assert_err!(t, chip.ip(1), Code::NotFound);
}

fn unpopulated_ip(t: &mut dyn WvTester) {
    let mut env = helper::setup_with_topology(
        vec![
            helper::build_ip("vic", 0, 2, ElementType::Perfmux),
            helper::build_ip("pma", 1, 1, ElementType::Perfmux),
        ],
        3,
        1,
    );

    wv_assert_err!(t, env.hwpm.init_structures(), Code::NotFound);
    // the populated IPs have been initialized before
    let ip = wv_assert_ok!(env.hwpm.chip().ip(1));
    wv_assert_eq!(t, ip.aperture(ApertureType::Perfmux).slots().len(), 1);
}

fn walk_stops_at_first_error(t: &mut dyn WvTester) {
    let broken = helper::build_ip("vic", 0, 2, ElementType::Perfmux).with_aperture(
        ApertureType::Perfmon,
        helper::mon_addr(0, 0),
        helper::mon_addr(0, 0) + INST_STRIDE - 1,
        INST_STRIDE,
    );
    let mut env = helper::setup(
        vec![broken, helper::build_ip("pma", 1, 1, ElementType::Perfmux)],
        1,
    );

    wv_assert_err!(t, env.hwpm.init_structures(), Code::InvArgs);
    let ip = wv_assert_ok!(env.hwpm.chip().ip(1));
    wv_assert!(t, ip.aperture(ApertureType::Perfmux).slots().is_empty());
}

fn guards_skip(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![
            helper::build_ip("vic", 0, 1, ElementType::Perfmux).with_override(true),
            helper::build_ip("pma", 1, 1, ElementType::Perfmux),
        ],
        1,
    );
    wv_assert_ok!(env.hwpm.init_structures());

    // the walk skips IPs that cannot be reserved instead of failing
    wv_assert_ok!(env.hwpm.func_ip(0, Operation::ReserveGivenResource));
    wv_assert!(t, !wv_assert_ok!(env.hwpm.chip().ip(0)).is_reserved());
    wv_assert_err!(t, env.hwpm.reserve_resource(0), Code::NotReservable);

    // reserving all IPs at once only reserves the router
    wv_assert_ok!(env.hwpm.func_all_ip(Operation::ReserveGivenResource));
    let info = env.hwpm.resource_info();
    wv_assert!(t, !info[0].reserved);
    wv_assert!(t, info[1].reserved);

    // the router is not released by the general release
    wv_assert_ok!(env.hwpm.func_all_ip(Operation::ReleaseResources));
    wv_assert!(t, wv_assert_ok!(env.hwpm.chip().ip(1)).is_reserved());
    wv_assert_ok!(env.hwpm.func_all_ip(Operation::ReleaseRouter));
    wv_assert!(t, !wv_assert_ok!(env.hwpm.chip().ip(1)).is_reserved());

    // binding without reservation does nothing
    wv_assert_ok!(env.hwpm.bind_resources());
    wv_assert!(t, env.regs.borrow().writes().is_empty());
}

fn combine_without_buffer(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_err!(t, env.hwpm.func_all_ip(Operation::CombineAlist), Code::InvArgs);

    wv_assert_ok!(env.hwpm.func_all_ip(Operation::GetAlistSize));
    wv_assert_eq!(t, env.hwpm.chip().alist_size(), 15);
}

fn lifecycle(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![
            helper::build_ip("nvenc", 0, 3, ElementType::IpPerfmux),
            helper::build_ip("pma", 1, 1, ElementType::Perfmux),
        ],
        1,
    );
    env.regs.borrow_mut().fault(helper::mux_addr(0, 1));

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_ok!(env.hwpm.reserve_router());
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_ok!(env.hwpm.bind_resources());

    let size = wv_assert_ok!(env.hwpm.get_alist_size());
    wv_assert_eq!(t, size, 3 * (helper::MUX_ALIST + helper::MON_ALIST));
    let mut buf = vec![0u64; size];
    wv_assert_eq!(t, env.hwpm.combine_alist(&mut buf), Ok(size));

    wv_assert_ok!(env.hwpm.unbind_resources());
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert_ok!(env.hwpm.release_structures());

    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[
            (1, 0, true),
            (0, 0, true),
            (0, 2, true),
            (0, 0, false),
            (0, 2, false),
            (1, 0, false)
        ][..]
    );
    for info in env.hwpm.resource_info() {
        wv_assert!(t, !info.reserved);
        wv_assert_eq!(t, info.status, ResourceStatus::Valid);
    }
    wv_assert_eq!(t, wv_assert_ok!(env.hwpm.chip().ip(0)).inst_fs_mask(), 0x5);
}

fn register_addresses(t: &mut dyn WvTester) {
    let top = Element::new(ElementType::Perfmon, u64::MAX - 3, 0x1);
    wv_assert_eq!(t, top.reg_addr(0x3), Ok(u64::MAX));
    wv_assert_err!(t, top.reg_addr(0x4), Code::InvArgs);

    // probing and the allow-list reject offsets beyond the address space
    let elem = top.with_alist(vec![RegOffsetEntry::new(0x8, false)]);
    wv_assert_err!(t, floorsweep::probe_addr(&elem), Code::InvArgs);
    let mut buf = vec![0u64; 1];
    let mut cursor = 0;
    wv_assert_err!(
        t,
        hwpm::alist::copy_element_alist(&elem, &mut buf, &mut cursor),
        Code::InvArgs
    );
}
