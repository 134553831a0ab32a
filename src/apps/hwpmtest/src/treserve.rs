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

use hwpm::{ApertureType, Element, ElementInfo, ElementType, Instance, ResourceStatus};

use crate::helper::{self, INST_STRIDE};

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, single_available_instance);
    wv_run_test!(t, round_trip);
    wv_run_test!(t, reserve_twice);
    wv_run_test!(t, rollback_at_later_instance);
    wv_run_test!(t, failure_at_first_instance);
    wv_run_test!(t, rollback_after_element_failure);
    wv_run_test!(t, not_reservable);
    wv_run_test!(t, router_released_last);
    wv_run_test!(t, router_not_populated);
    wv_run_test!(t, release_failure);
}

fn single_available_instance(t: &mut dyn WvTester) {
    let ip = helper::build_ip("vic", 0, 2, ElementType::Perfmux).with_inst_fs_mask(0x1);
    let mut env = helper::setup(vec![ip], 0);
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    {
        let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
        wv_assert_eq!(t, ip.inst_fs_mask(), 0x1);
        wv_assert_eq!(t, ip.status(), ResourceStatus::Valid);
    }

    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_eq!(t, env.power.borrow().calls(), &[(0, 0, true)][..]);
    wv_assert!(t, helper::elements(&env.hwpm, 0, 0).iter().all(|e| e.is_reserved()));
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 1));

    // the only IP is the router as well
    wv_assert_ok!(env.hwpm.release_resources());
    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    wv_assert!(t, !ip.is_reserved());
    wv_assert_eq!(t, ip.inst_fs_mask(), 0x1);
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[(0, 0, true), (0, 0, false)][..]
    );
}

fn round_trip(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.reserve_resource(0));
    {
        let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
        wv_assert!(t, ip.is_reserved());
        for inst in ip.instances() {
            wv_assert!(t, inst.has_reserved_elements());
            wv_assert_eq!(t, inst.element_fs_mask(), 0x1);
        }
    }

    wv_assert_ok!(env.hwpm.release_resources());
    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    wv_assert!(t, !ip.is_reserved());
    for inst in ip.instances() {
        wv_assert!(t, !inst.has_reserved_elements());
        wv_assert_eq!(t, inst.element_fs_mask(), 0x1);
    }
    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[(0, 0, true), (0, 1, true), (0, 0, false), (0, 1, false)][..]
    );
}

fn reserve_twice(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_eq!(t, env.power.borrow().calls().len(), 2);

    // releasing unreserved IPs does nothing
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert_eq!(t, env.power.borrow().calls().len(), 4);
}

fn rollback_at_later_instance(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![helper::build_ip("nvenc", 0, 4, ElementType::Perfmux)],
        0,
    );
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());
    env.power.borrow_mut().fail_on(0, 2, true);

    let err = match env.hwpm.reserve_resource(0) {
        Err(e) => e,
        Ok(_) => panic!("reservation succeeded"),
    };
    wv_assert_eq!(t, err.code(), Code::WriteFailed);
    wv_assert!(t, err.rolled_back());

    let ip = wv_assert_ok!(env.hwpm.chip().ip(0));
    wv_assert!(t, !ip.is_reserved());
    wv_assert_eq!(t, ip.inst_fs_mask(), 0xf);
    for i in 0..4 {
        wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, i));
    }

    // the reserved instances are released in ascending order; instance 3 is never touched
    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[
            (0, 0, true),
            (0, 1, true),
            (0, 2, true),
            (0, 0, false),
            (0, 1, false)
        ][..]
    );

    // the IP can be reserved once the failure is gone
    env.power.borrow_mut().clear();
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert_eq!(t, env.power.borrow().calls().len(), 4);
}

fn failure_at_first_instance(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();
    env.power.borrow_mut().fail_on(0, 0, true);

    let err = match env.hwpm.reserve_resource(0) {
        Err(e) => e,
        Ok(_) => panic!("reservation succeeded"),
    };
    wv_assert_eq!(t, err.code(), Code::WriteFailed);
    wv_assert!(t, !err.rolled_back());
    wv_assert_eq!(t, env.power.borrow().calls(), &[(0, 0, true)][..]);
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
    wv_assert!(t, !wv_assert_ok!(env.hwpm.chip().ip(0)).is_reserved());
}

fn rollback_after_element_failure(t: &mut dyn WvTester) {
    let mon = helper::mon_addr(0, 1);
    // unknown descriptor types are turned into invalid elements
    let broken = Instance::new(0x2)
        .with_element_fs_mask(0x1)
        .with_aperture(
            ApertureType::Perfmux,
            helper::build_inst(0, 1, ElementType::Perfmux)
                .aperture(ApertureType::Perfmux)
                .clone(),
        )
        .with_aperture(
            ApertureType::Perfmon,
            ElementInfo::new(mon, mon + INST_STRIDE - 1, INST_STRIDE).with_element(
                Element::new(ElementType::from(0x42u32), mon, 0x1).with_alist(helper::mon_alist()),
            ),
        );
    let ip = helper::empty_ip("nvdec", 0, 2)
        .with_instance(helper::build_inst(0, 0, ElementType::Perfmux))
        .with_instance(broken);
    let mut env = helper::setup(vec![ip], 0);
    wv_assert_ok!(env.hwpm.init_structures());

    let err = match env.hwpm.reserve_resource(0) {
        Err(e) => e,
        Ok(_) => panic!("reservation succeeded"),
    };
    wv_assert_eq!(t, err.code(), Code::InvArgs);
    wv_assert!(t, err.rolled_back());

    // the perfmux of the broken instance has been released again
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 1));
    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[(0, 0, true), (0, 0, false)][..]
    );
}

fn not_reservable(t: &mut dyn WvTester) {
    let mut env = helper::setup(
        vec![
            helper::build_ip("vic", 0, 1, ElementType::Perfmux).with_override(true),
            helper::build_ip("pma", 1, 1, ElementType::Perfmux).with_inst_fs_mask(0),
        ],
        1,
    );
    wv_assert_ok!(env.hwpm.init_structures());

    wv_assert_err!(t, env.hwpm.reserve_resource(0), Code::NotReservable);
    wv_assert_err!(t, env.hwpm.reserve_router(), Code::NotReservable);
    wv_assert_err!(t, env.hwpm.reserve_resource(2), Code::NotFound);
    wv_assert!(t, env.power.borrow().calls().is_empty());
}

fn router_released_last(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.reserve_router());
    wv_assert_ok!(env.hwpm.reserve_resource(0));
    wv_assert!(t, wv_assert_ok!(env.hwpm.chip().ip(1)).is_reserved());

    env.power.borrow_mut().clear();
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert_eq!(
        t,
        env.power.borrow().calls(),
        &[(0, 0, false), (0, 1, false), (1, 0, false)][..]
    );
    for info in env.hwpm.resource_info() {
        wv_assert!(t, !info.reserved);
    }
}

fn router_not_populated(t: &mut dyn WvTester) {
    let mut env = helper::setup(vec![helper::build_ip("vic", 0, 1, ElementType::Perfmux)], 5);
    wv_assert_ok!(env.hwpm.init_structures());
    wv_assert_ok!(env.hwpm.finalize_chip_info());

    wv_assert_err!(t, env.hwpm.reserve_router(), Code::NotFound);
    wv_assert_ok!(env.hwpm.reserve_resource(0));

    // the populated IPs are released and the missing router is skipped
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert!(t, !wv_assert_ok!(env.hwpm.chip().ip(0)).is_reserved());
    wv_assert!(t, !helper::inst_reserved(&env.hwpm, 0, 0));
    wv_assert_eq!(t, env.power.borrow().calls(), &[(0, 0, true), (0, 0, false)][..]);
}

fn release_failure(t: &mut dyn WvTester) {
    let mut env = helper::setup_initialized();

    wv_assert_ok!(env.hwpm.reserve_resource(0));
    env.power.borrow_mut().fail_on(0, 1, false);
    wv_assert_err!(t, env.hwpm.release_resources(), Code::WriteFailed);
    wv_assert!(t, wv_assert_ok!(env.hwpm.chip().ip(0)).is_reserved());

    env.power.borrow_mut().clear();
    wv_assert_ok!(env.hwpm.release_resources());
    wv_assert!(t, !wv_assert_ok!(env.hwpm.chip().ip(0)).is_reserved());
}
