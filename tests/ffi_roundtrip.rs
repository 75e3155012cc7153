//! FFI round-trip tests: call the `extern "C"` functions directly from Rust
//! to catch marshalling bugs before a host language enters the picture.
//!
//! These mirror `solver.rs` but go through the raw pointer / handle-based
//! boundary.

use std::ptr;

use gpa::ffi::*;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

unsafe fn create_handle(epsilon: f64) -> *mut GpaHandle {
    let h = gpa_create(epsilon);
    assert!(!h.is_null(), "gpa_create returned null: {}", get_last_error());
    h
}

fn get_last_error() -> String {
    let mut buf = vec![0u8; 1024];
    let n = unsafe { gpa_last_error(buf.as_mut_ptr(), buf.len()) };
    if n <= 0 {
        return String::from("(no error)");
    }
    String::from_utf8_lossy(&buf[..n as usize]).to_string()
}

unsafe fn add_variable(h: *mut GpaHandle, values: &[f64]) -> usize {
    let index = gpa_add_variable(h, values.as_ptr(), values.len());
    assert!(index >= 0, "add_variable failed: {}", get_last_error());
    index as usize
}

unsafe fn read(h: *mut GpaHandle, variable: usize, len: usize) -> Vec<f64> {
    let mut out = vec![0.0; len];
    let rc = gpa_read_variable(h, variable, out.as_mut_ptr(), len);
    assert_eq!(rc, 0, "read_variable failed: {}", get_last_error());
    out
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

// ─────────────────────────────────────────────────────────────
//  Test: create / free round-trip
// ─────────────────────────────────────────────────────────────

#[test]
fn ffi_create_and_free() {
    unsafe {
        let h = create_handle(0.1);
        gpa_free(h);
    }
    // Also verify freeing null is safe
    unsafe {
        gpa_free(ptr::null_mut());
    }
}

#[test]
fn ffi_create_rejects_negative_epsilon() {
    let h = gpa_create(-1.0);
    assert!(h.is_null());
    assert!(get_last_error().contains("invalid option"));
}

// ─────────────────────────────────────────────────────────────
//  Test: anchored variable through FFI
// ─────────────────────────────────────────────────────────────

#[test]
fn ffi_anchor_moves_towards_target() {
    unsafe {
        let h = create_handle(0.1);
        let v = add_variable(h, &[0.0]);
        let target = [1.0];
        let rc = gpa_add_anchor_energy(h, v, target.as_ptr(), target.len(), 1.0);
        assert_eq!(rc, 0, "add_anchor_energy failed: {}", get_last_error());

        assert_eq!(gpa_initialise(h), 0, "initialise failed: {}", get_last_error());

        let mut step = f64::NAN;
        let rc = gpa_run_iteration(h, false, &mut step as *mut f64);
        assert_eq!(rc, 0, "run_iteration failed: {}", get_last_error());

        let x = read(h, v, 1)[0];
        assert!((x - 1.0 / 1.01).abs() < 1e-14, "x = {x}");
        assert!((step - x).abs() < 1e-14, "step = {step}");

        gpa_free(h);
    }
}

// ─────────────────────────────────────────────────────────────
//  Test: length constraints through FFI
// ─────────────────────────────────────────────────────────────

#[test]
fn ffi_length_constraints_converge() {
    unsafe {
        let h = create_handle(0.1);
        let a = add_variable(h, &[0.0, 0.0]);
        let b = add_variable(h, &[2.0, 0.5]);
        let c = add_variable(h, &[0.3, 1.8]);

        let origin = [0.0, 0.0];
        assert_eq!(gpa_add_anchor_energy(h, a, origin.as_ptr(), 2, 1.0), 0);
        assert_eq!(
            gpa_add_squared_length_constraint(h, a, b, 1.0, 1.0),
            0,
            "squared length failed: {}",
            get_last_error()
        );
        assert_eq!(
            gpa_add_length_constraint(h, a, c, 1.0, 1.0),
            0,
            "length failed: {}",
            get_last_error()
        );
        assert_eq!(gpa_initialise(h), 0);

        for _ in 0..30 {
            // null step-norm output is allowed
            let rc = gpa_run_iteration(h, true, ptr::null_mut());
            assert_eq!(rc, 0, "run_iteration failed: {}", get_last_error());
        }

        let pa = read(h, a, 2);
        let pb = read(h, b, 2);
        let pc = read(h, c, 2);
        assert!((distance(&pa, &pb) - 1.0).abs() < 1e-8);
        assert!((distance(&pa, &pc) - 1.0).abs() < 1e-8);
        assert!(pa.iter().all(|x| x.abs() < 1e-8));

        gpa_free(h);
    }
}

// ─────────────────────────────────────────────────────────────
//  Test: error reporting
// ─────────────────────────────────────────────────────────────

#[test]
fn ffi_errors_are_reported() {
    unsafe {
        let h = create_handle(0.1);
        let v = add_variable(h, &[1.0, 2.0]);

        // unknown variable index
        let target = [0.0, 0.0];
        let rc = gpa_add_anchor_energy(h, 5, target.as_ptr(), 2, 1.0);
        assert_eq!(rc, -1);
        assert!(get_last_error().contains("out of range"));

        // wrong target length
        let rc = gpa_add_anchor_energy(h, v, target.as_ptr(), 1, 1.0);
        assert_eq!(rc, -1);
        assert!(get_last_error().contains("dimension mismatch"));

        // run before initialise
        let rc = gpa_run_iteration(h, false, ptr::null_mut());
        assert_eq!(rc, -1);
        assert!(get_last_error().contains("not initialised"));

        assert_eq!(gpa_initialise(h), 0);
        assert_eq!(get_last_error(), "(no error)");
        assert_eq!(gpa_initialise(h), -1);
        assert!(get_last_error().contains("already initialised"));

        // layout is frozen after initialise
        let late = [3.0];
        assert_eq!(gpa_add_variable(h, late.as_ptr(), 1), -1);

        // output buffer of the wrong size
        let mut out = [0.0; 3];
        assert_eq!(gpa_read_variable(h, v, out.as_mut_ptr(), 3), -1);
        assert_eq!(read(h, v, 2), vec![1.0, 2.0]);

        gpa_free(h);
    }
}

#[test]
fn ffi_null_handle_is_an_error() {
    unsafe {
        assert_eq!(gpa_initialise(ptr::null_mut()), -1);
        assert!(get_last_error().contains("null solver handle"));
        assert_eq!(gpa_add_variable(ptr::null_mut(), ptr::null(), 0), -1);
        assert_eq!(gpa_last_error(ptr::null_mut(), 0), -1);
    }
}

#[test]
fn ffi_last_error_truncates() {
    unsafe {
        assert_eq!(gpa_initialise(ptr::null_mut()), -1);
        let mut buf = [0u8; 4];
        let n = gpa_last_error(buf.as_mut_ptr(), buf.len());
        assert_eq!(n, 4);
        assert_eq!(&buf, b"inva");
    }
}
