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

use hwpm::ElementType;

use crate::helper::{self, CTRL};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, bind_reserved_only);
    wv_run_test!(t, bind_keeps_control_bits);
    wv_run_test!(t, unbind_order);
    wv_run_test!(t, bind_skips_unavailable);
    wv_run_test!(t, bind_fault);
}

fn bind_reserved_only(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_ok!(env.hwpm.reserve_resource(0));

    wv_assert_ok!(env.hwpm.bind_resources());

    let mut expected = vec![];
    for i in 0..2 {
        let mux = helper::mux_addr(0, i);
        let mon = helper::mon_addr(0, i);
        expected.push((mux + 0x4, 0));
        expected.push((mon + 0x0, 0));
        expected.push((mon + CTRL.perfmon_ctrl, CTRL.perfmon_enable));
    }
    // the router has not been reserved and stays untouched
    wv_assert_eq!(t, env.regs.borrow().writes(), &expected[..]);
}

fn bind_keeps_control_bits(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    let ctrl = helper::mon_addr(1, 0) + CTRL.perfmon_ctrl;
    env.regs.borrow_mut().set(ctrl, 0x10);
    wv_assert_ok!(env.hwpm.reserve_router());

    wv_assert_ok!(env.hwpm.bind_resources());
    wv_assert_eq!(t, env.regs.borrow().get(ctrl), 0x11);

    wv_assert_ok!(env.hwpm.unbind_resources());
    wv_assert_eq!(t, env.regs.borrow().get(ctrl), 0x10);
}

fn unbind_order(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    wv_assert_ok!(env.hwpm.reserve_router());
    wv_assert_ok!(env.hwpm.bind_resources());
    env.regs.borrow_mut().clear_log();

    wv_assert_ok!(env.hwpm.unbind_resources());

    let mux = helper::mux_addr(1, 0);
    let mon = helper::mon_addr(1, 0);
    // elements are disabled first and cleared afterwards
    wv_assert_eq!(
        t,
        env.regs.borrow().writes(),
        &[
            (mux + CTRL.perfmux_ctrl, 0),
            (mux + 0x4, 0),
            (mon + CTRL.perfmon_ctrl, 0),
            (mon + 0x0, 0),
        ][..]
    );
    wv_assert_eq!(t, env.regs.borrow().reads(), &[mon + CTRL.perfmon_ctrl][..]);

    // unbinding does not release the reservation
    wv_assert!(t, wv_assert_ok!(env.hwpm.chip().ip(1)).is_reserved());
}

fn bind_skips_unavailable(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![helper::build_ip("nvenc", 0, 2, ElementType::IpPerfmux)],
        0,
    );
    env.regs.borrow_mut().fault(helper::mux_addr(0, 0));
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    env.regs.borrow_mut().clear_log();

    wv_assert_ok!(env.hwpm.bind_resources());

    let mon = helper::mon_addr(0, 1);
    wv_assert_eq!(
        t,
        env.regs.borrow().writes(),
        &[
            (helper::mux_addr(0, 1) + 0x4, 0),
            (mon + 0x0, 0),
            (mon + CTRL.perfmon_ctrl, CTRL.perfmon_enable),
        ][..]
    );
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
}

fn bind_fault(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    env.regs
        .borrow_mut()
        .fault(helper::mon_addr(0, 0) + CTRL.perfmon_ctrl);
    wv_assert_ok!(env.hwpm.reserve_resource(0));

    wv_assert_err!(t, env.hwpm.bind_resources(), Code::ReadFailed);
    // the walk stopped at the perfmon of the first instance
    wv_assert_eq!(
        t,
        env.regs.borrow().writes(),
        &[
            (helper::mux_addr(0, 0) + 0x4, 0),
            (helper::mon_addr(0, 0), 0)
        ][..]
    );
}
