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

use base::col::Vec;
use base::errors::Code;
use base::test::WvTester;
use base::{vec, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use hwpm::{ApertureType, Element, ElementInfo, ElementType, Instance};

use crate::helper::{self, INST_STRIDE, MON_ALIST, MUX_ALIST};

const PER_INST: usize = MUX_ALIST + MON_ALIST;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, size);
    wv_run_test!(t, size_ignores_reservation);
    wv_run_test!(t, combine);
    wv_run_test!(t, combine_matches_size);
    wv_run_test!(t, buffer_too_small);
    wv_run_test!(t, missing_alist);
    wv_run_test!(t, stale_size);
}

fn inst_alist(ip_idx: u32, inst_idx: usize) -> Vec<u64> {
    let mux = helper::mux_addr(ip_idx, inst_idx);
    let mon = helper::mon_addr(ip_idx, inst_idx);
    vec![mux, mux + 0x4, mon, mon + 0x4, mon + 0x8]
}

fn size(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(3 * PER_INST));
    // the size is recomputed from scratch on every call
    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(3 * PER_INST));
    wv_assert_eq!(t, env.hwpm.chip().alist_size(), 3 * PER_INST);
}

fn size_ignores_reservation(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(3 * PER_INST));
}

fn combine(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    let mut buf = vec![0u64; 3 * PER_INST];

    wv_assert_eq!(t, env.hwpm.combine_alist(&mut buf), Ok(3 * PER_INST));

    let mut expected = inst_alist(0, 0);
    expected.extend(inst_alist(0, 1));
    expected.extend(inst_alist(1, 0));
    wv_assert_eq!(t, buf, expected);
}

fn combine_matches_size(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 0), false));

    let size = wv_assert_ok!(env.hwpm.get_alist_size());
    wv_assert_eq!(t, size, 2 * PER_INST);

    // the buffer may be larger than needed
    let mut buf = vec![0u64; size + 4];
    wv_assert_eq!(t, env.hwpm.combine_alist(&mut buf), Ok(size));

    let mut expected = inst_alist(0, 1);
    expected.extend(inst_alist(1, 0));
    expected.extend([0u64; 4]);
    wv_assert_eq!(t, buf, expected);
}

fn buffer_too_small(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    let mut buf = vec![0u64; 3 * PER_INST - 1];
    wv_assert_err!(t, env.hwpm.combine_alist(&mut buf), Code::NoSpace);

    // the entries that fit have been written
    wv_assert_eq!(t, buf[..PER_INST], inst_alist(0, 0)[..]);
}

fn missing_alist(t: &mut dyn WvTester) {
    let mon = helper::mon_addr(0, 0);
    let inst = Instance::new(0x1).with_element_fs_mask(0x1).with_aperture(
        ApertureType::Perfmon,
        ElementInfo::new(mon, mon + INST_STRIDE - 1, INST_STRIDE)
            .with_element(Element::new(ElementType::Perfmon, mon, 0x1)),
    );
    let ip = helper::empty_ip("nvjpg", 0, 1).with_instance(inst);
    let mut env = helper::setup(vec![ip], 0);
    wv_assert_ok!(env.hwpm.init_structures());

    // elements without allow-list do not contribute to the size, but cannot be combined
    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(0));
    let mut buf = vec![0u64; 4];
    wv_assert_err!(t, env.hwpm.combine_alist(&mut buf), Code::InvArgs);
}

fn stale_size(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(3 * PER_INST));

    // the availability changed after the size has been determined
    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 1), false));
    let mut buf = vec![0u64; 3 * PER_INST];
    wv_assert_err!(t, env.hwpm.combine_alist(&mut buf), Code::InvArgs);

    wv_assert_eq!(t, env.hwpm.get_alist_size(), Ok(2 * PER_INST));
    wv_assert_eq!(t, env.hwpm.combine_alist(&mut buf), Ok(2 * PER_INST));
}
