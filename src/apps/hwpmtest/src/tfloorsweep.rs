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

use hwpm::{ElementType, ResourceStatus};

use crate::helper;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, hub_perfmux_not_probed);
    wv_run_test!(t, probe_decides_presence);
    wv_run_test!(t, fuse_mask_skips_probe);
    wv_run_test!(t, preclear_instance);
    wv_run_test!(t, all_instances_floorswept);
    wv_run_test!(t, reserved_ip_not_rediscovered);
    wv_run_test!(t, register_instances);
    wv_run_test!(t, register_other_aperture);
    wv_run_test!(t, register_with_probe);
    wv_run_test!(t, register_errors);
}

fn fs_mask(env: &helper::Env, ip_idx: u32, inst_idx: usize) -> u32 {
    let ip = wv_assert_ok!(env.hwpm.chip().ip(ip_idx));
    ip.instances()[inst_idx].element_fs_mask()
}

fn inst_mask(env: &helper::Env, ip_idx: u32) -> u32 {
    wv_assert_ok!(env.hwpm.chip().ip(ip_idx)).inst_fs_mask()
}

fn status(env: &helper::Env, ip_idx: u32) -> ResourceStatus {
    wv_assert_ok!(env.hwpm.chip().ip(ip_idx)).status()
}

fn hub_perfmux_not_probed(t: &mut dyn WvTester) {
    let mut env = helper::setup_default();
    env.regs.borrow_mut().fault(helper::mux_addr(0, 0));

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    wv_assert!(t, env.regs.borrow().reads().is_empty());
    wv_assert_eq!(t, fs_mask(&env, 0, 0), 0x1);
    wv_assert_eq!(t, inst_mask(&env, 0), 0x3);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Valid);
}

fn probe_decides_presence(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![helper::build_ip("nvenc", 0, 2, ElementType::IpPerfmux)],
        0,
    );
    env.regs.borrow_mut().fault(helper::mux_addr(0, 1));

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    // the probe reads the first allow-list entry
    wv_assert_eq!(
        t,
        env.regs.borrow().reads(),
        &[helper::mux_addr(0, 0), helper::mux_addr(0, 1)][..]
    );
    wv_assert_eq!(t, fs_mask(&env, 0, 0), 0x1);
    wv_assert_eq!(t, fs_mask(&env, 0, 1), 0x0);
    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Valid);

    // the floorswept instance does not contribute to the allow-list
    wv_assert_eq!(
        t,
        env.hwpm.get_alist_size(),
        Ok(helper::MUX_ALIST + helper::MON_ALIST)
    );
}

fn fuse_mask_skips_probe(t: &mut dyn WvTester) {
    let ip = helper::empty_ip("ofa", 0, 2)
        .with_instance(helper::build_inst(0, 0, ElementType::IpPerfmux).with_fuse_fs_mask(0x2))
        .with_instance(helper::build_inst(0, 1, ElementType::IpPerfmux).with_fuse_fs_mask(0x1));
    let mut env = helper::setup(vec![ip], 0);

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    // instance 0 is fused off without touching the hardware
    wv_assert_eq!(t, env.regs.borrow().reads(), &[helper::mux_addr(0, 1)][..]);
    wv_assert_eq!(t, fs_mask(&env, 0, 0), 0x0);
    wv_assert_eq!(t, fs_mask(&env, 0, 1), 0x1);
    wv_assert_eq!(t, inst_mask(&env, 0), 0x2);
}

fn preclear_instance(t: &mut dyn WvTester) {
    let ip = helper::build_ip("vic", 0, 2, ElementType::Perfmux).with_inst_fs_mask(0x1);
    let mut env = helper::setup(vec![ip], 0);

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Valid);
    // instance 1 is not visited at all
    wv_assert_eq!(t, fs_mask(&env, 0, 1), 0x1);
}

fn reserved_ip_not_rediscovered(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![helper::build_ip("nvenc", 0, 2, ElementType::IpPerfmux)],
        0,
    );
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_ok!(env.hwpm.reserve_resource(0));

    // instance 1 disappears while the IP is reserved
    env.regs.borrow_mut().fault(helper::mux_addr(0, 1));
    env.regs.borrow_mut().clear_log();
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert!(t, env.regs.borrow().reads().is_empty());
    wv_assert_eq!(t, inst_mask(&env, 0), 0x3);
    wv_assert_eq!(t, fs_mask(&env, 0, 1), 0x1);

    // so that release still reaches both instances
    env.power.borrow_mut().clear();
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 1));
    wv_assert_eq!(t, env.power.borrow().calls(), &[(0, 0, false), (0, 1, false)][..]);

    // once released, the next discovery takes the instance away
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
}

fn all_instances_floorswept(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![
            helper::build_ip("nvdec", 0, 2, ElementType::IpPerfmux),
            helper::build_ip("pma", 1, 1, ElementType::Perfmux),
        ],
        1,
    );
    env.regs.borrow_mut().fault(helper::mux_addr(0, 0));
    env.regs.borrow_mut().fault(helper::mux_addr(0, 1));

    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    wv_assert_eq!(t, inst_mask(&env, 0), 0x0);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Invalid);
    wv_assert_eq!(t, status(&env, 1), ResourceStatus::Valid);

    wv_assert_err!(t, env.hwpm.reserve_resource(0), Code::NotReservable);
    wv_assert_eq!(
        t,
        env.hwpm.get_alist_size(),
        Ok(helper::MUX_ALIST + helper::MON_ALIST)
    );

    let info = env.hwpm.resource_info();
    wv_assert_eq!(t, info.len(), 2);
    wv_assert_eq!(t, info[0].name, "nvdec");
    wv_assert_eq!(t, info[0].status, ResourceStatus::Invalid);
    wv_assert_eq!(t, info[1].inst_fs_mask, 0x1);
}

fn register_instances(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 1), false));
    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Valid);

    // addresses within the instance range resolve to the same instance
    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 0) + 0x40, false));
    wv_assert_eq!(t, inst_mask(&env, 0), 0x0);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Invalid);

    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 1), true));
    wv_assert_eq!(t, inst_mask(&env, 0), 0x2);
    wv_assert_eq!(t, status(&env, 0), ResourceStatus::Valid);

    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 0), true));
    wv_assert_eq!(t, inst_mask(&env, 0), 0x3);
}

fn register_other_aperture(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.ip_register(0, helper::mon_addr(0, 1), false));
    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
}

fn register_with_probe(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![helper::build_ip("nvjpg", 0, 2, ElementType::IpPerfmux)],
        0,
    );
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 1), false));

    // the instance is probed again and turns out to be floorswept
    env.regs.borrow_mut().fault(helper::mux_addr(0, 1));
    env.regs.borrow_mut().clear_log();
    wv_assert_ok!(env.hwpm.ip_register(0, helper::mux_addr(0, 1), true));
    wv_assert_eq!(t, env.regs.borrow().reads(), &[helper::mux_addr(0, 1)][..]);
    wv_assert_eq!(t, fs_mask(&env, 0, 1), 0x0);
    wv_assert_eq!(t, inst_mask(&env, 0), 0x1);
}

fn register_errors(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_err!(
        t,
        env.hwpm.ip_register(0, helper::mux_addr(0, 2), false),
        Code::NotFound
    );
    wv_assert_err!(
        t,
        env.hwpm.ip_register(0, helper::mux_addr(1, 0), false),
        Code::NotFound
    );
    wv_assert_err!(
        t,
        env.hwpm.ip_register(5, helper::mux_addr(0, 0), false),
        Code::NotFound
    );

    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_err!(
        t,
        env.hwpm.ip_register(0, helper::mux_addr(0, 0), false),
        Code::AlreadyReserved
    );
    wv_assert_eq!(t, inst_mask(&env, 0), 0x3);
}
