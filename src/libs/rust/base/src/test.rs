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

//! Contains unittest utilities inspired by WvTest <https://github.com/apenwarr/wvtest>
//!
//! Every check counts as one test. Failed checks are reported with their source location and the
//! enclosing test is remembered, so that the summary can name all failed tests at the end.

use core::fmt;

use crate::col::{String, ToString, Vec};

/// Runs the tests
pub trait WvTester {
    /// Runs the given test suite
    fn run_suite(&mut self, name: &str, f: &dyn Fn(&mut dyn WvTester));
    /// Runs the given test
    fn run_test(&mut self, name: &str, file: &str, f: &dyn Fn(&mut dyn WvTester));
    /// Is called on succeeded checks
    fn test_succeeded(&mut self);
    /// Is called on failed checks with the location and a description of the failure
    fn test_failed(&mut self, file: &str, line: u32, msg: fmt::Arguments<'_>);
}

/// The default implementation for the [`WvTester`]
#[derive(Default, Clone, Debug)]
pub struct DefaultWvTester {
    tests: u64,
    fails: u64,
    suite: String,
    test: String,
    failed_tests: Vec<String>,
}

impl DefaultWvTester {
    pub fn tests(&self) -> u64 {
        self.tests
    }

    pub fn failures(&self) -> u64 {
        self.fails
    }

    pub fn successes(&self) -> u64 {
        self.tests - self.fails
    }

    /// Returns the tests with at least one failed check as "suite::test"
    pub fn failed_tests(&self) -> &[String] {
        &self.failed_tests
    }

    fn current(&self) -> String {
        let mut name = self.suite.clone();
        name.push_str("::");
        name.push_str(&self.test);
        name
    }
}

impl WvTester for DefaultWvTester {
    fn run_suite(&mut self, name: &str, f: &dyn Fn(&mut dyn WvTester)) {
        crate::println!("Running test suite {} ...\n", name);
        self.suite = name.to_string();
        f(self);
        self.suite.clear();
        crate::println!();
    }

    fn run_test(&mut self, name: &str, file: &str, f: &dyn Fn(&mut dyn WvTester)) {
        crate::println!("Testing \"{}\" in {}:", name, file);
        self.test = name.to_string();
        f(self);
        self.test.clear();
        crate::println!();
    }

    fn test_succeeded(&mut self) {
        self.tests += 1;
    }

    fn test_failed(&mut self, file: &str, line: u32, msg: fmt::Arguments<'_>) {
        crate::println!("! {}:{}  {} FAILED", file, line, msg);
        self.tests += 1;
        self.fails += 1;

        let name = self.current();
        if self.failed_tests.last() != Some(&name) {
            self.failed_tests.push(name);
        }
    }
}

impl fmt::Display for DefaultWvTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.failed_tests {
            writeln!(f, "  failed: {}", name)?;
        }
        write!(
            f,
            "\x1B[1mSUMMARY: {} tests, {} succeeded, {} failed\x1B[0m",
            self.tests(),
            self.successes(),
            self.failures()
        )
    }
}

/// Reports a fatal failure at the given location and stops the tests
#[doc(hidden)]
#[cold]
pub fn abort(file: &str, line: u32, msg: fmt::Arguments<'_>) -> ! {
    crate::println!("! {}:{}  {} FAILED", file, line, msg);
    panic!("Stopping tests here.")
}

/// Convenience macro that calls [`WvTester::run_suite`](WvTester::run_suite) and uses the function
/// name as suite name
#[macro_export]
macro_rules! wv_run_suite {
    ($t:expr, $func:path) => {
        $t.run_suite(stringify!($func), &$func)
    };
}

/// Convenience macro that calls [`WvTester::run_test`](WvTester::run_test) and uses the function
/// name as test name
#[macro_export]
macro_rules! wv_run_test {
    ($t:expr, $func:path) => {
        $t.run_test(stringify!($func), file!(), &$func)
    };
}

/// Tests whether $a is true
#[macro_export]
macro_rules! wv_assert {
    ($t:expr, $a:expr) => {{
        match (&$a) {
            (a_val) => {
                if !*a_val {
                    $t.test_failed(file!(), line!(), format_args!("{}", stringify!($a)));
                }
                else {
                    $t.test_succeeded();
                }
            },
        }
    }};
}

/// Tests whether $a and $b are equal
///
/// The optional trailing arguments replace the default failure message.
#[macro_export]
macro_rules! wv_assert_eq {
    ($t:expr, $a:expr, $b:expr) => {{
        // match keeps temporaries in $a and $b alive until the comparison is done
        match (&$a, &$b) {
            (a_val, b_val) => {
                if *a_val != *b_val {
                    $t.test_failed(
                        file!(),
                        line!(),
                        format_args!("{:?} == {:?}", &*a_val, &*b_val),
                    );
                }
                else {
                    $t.test_succeeded();
                }
            },
        }
    }};

    ($t:expr, $a:expr, $b:expr, $($arg:tt)+) => {{
        match (&$a, &$b) {
            (a_val, b_val) => {
                if *a_val != *b_val {
                    $t.test_failed(file!(), line!(), format_args!($($arg)+));
                }
                else {
                    $t.test_succeeded();
                }
            },
        }
    }};
}

/// Returns the value inside the [`Ok`] or stops the tests
#[macro_export]
macro_rules! wv_assert_ok {
    ($res:expr) => {
        match $res {
            Ok(r) => r,
            Err(e) => $crate::test::abort(
                file!(),
                line!(),
                format_args!("expected Ok for {}, got {:?}", stringify!($res), e),
            ),
        }
    };
}

/// Returns the value inside the [`Some`] or stops the tests
#[macro_export]
macro_rules! wv_assert_some {
    ($res:expr) => {
        match $res {
            Some(r) => r,
            None => $crate::test::abort(
                file!(),
                line!(),
                format_args!("expected Some for {}, received None", stringify!($res)),
            ),
        }
    };
}

/// Tests whether $res is an [`Err`] with the error code $err
#[macro_export]
macro_rules! wv_assert_err {
    ($t:expr, $res:expr, $err:expr) => {
        match $res {
            Ok(r) => $t.test_failed(file!(), line!(), format_args!("received okay: {:?}", r)),
            Err(ref e) if e.code() != $err => $t.test_failed(
                file!(),
                line!(),
                format_args!("received error {:?}, expected {:?}", e, $err),
            ),
            Err(_) => $t.test_succeeded(),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(t: &mut dyn WvTester) {
        crate::wv_assert!(t, 1 + 1 == 2);
        crate::wv_assert_eq!(t, 4, 2 * 2);

        // borrows of temporaries live until the comparison
        let cell = crate::cell::RefCell::new(crate::vec![1, 2]);
        crate::wv_assert_eq!(t, cell.borrow().as_slice(), &[1, 2][..]);
    }

    fn failing(t: &mut dyn WvTester) {
        crate::wv_assert_eq!(t, 1, 2);
        crate::wv_assert!(t, false);
    }

    fn suite(t: &mut dyn WvTester) {
        crate::wv_run_test!(t, passing);
        crate::wv_run_test!(t, failing);
    }

    #[test]
    fn counts_and_names_failures() {
        let mut t = DefaultWvTester::default();
        crate::wv_run_suite!(t, suite);
        assert_eq!(t.tests(), 5);
        assert_eq!(t.failures(), 2);
        assert_eq!(t.failed_tests(), &[String::from("suite::failing")]);
    }
}
