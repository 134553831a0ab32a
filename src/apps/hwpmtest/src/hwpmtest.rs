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

//! The test suites for the HWPM resource manager
//!
//! The suites run against fake register, power, and allocator backends (see [`helper`]). Set
//! `HWPM_LOG` (e.g., `HWPM_LOG=Error|HwpmRes|HwpmFs`) to see the manager's log output.

mod helper;
mod talist;
mod tbind;
mod tchip;
mod tfloorsweep;
mod treserve;
mod tslots;

use base::println;
use base::test::{DefaultWvTester, WvTester};
use base::wv_run_suite;

/// Runs all test suites and returns the tester with the results
pub fn run() -> DefaultWvTester {
    base::io::init_stderr();

    let mut tester = DefaultWvTester::default();
    wv_run_suite!(tester, tslots::run);
    wv_run_suite!(tester, tfloorsweep::run);
    wv_run_suite!(tester, treserve::run);
    wv_run_suite!(tester, talist::run);
    wv_run_suite!(tester, tbind::run);
    wv_run_suite!(tester, tchip::run);
    println!("{}", tester);
    tester
}

#[cfg(test)]
mod tests {
    #[test]
    fn hwpm() {
        let tester = super::run();
        assert!(tester.tests() > 0);
        assert_eq!(tester.failures(), 0);
    }
}
