//! C-compatible FFI for host applications (C, C# P/Invoke, Python ctypes).
//!
//! All functions are `#[no_mangle] extern "C"`.
//!
//! Memory convention:
//!   - Caller allocates flat arrays and passes pointers + lengths.
//!   - The opaque `*mut GpaHandle` is created by Rust and freed by Rust via
//!     `gpa_free`.
//!   - Status-returning functions give 0 on success and a negative code on
//!     error; the message is kept per thread and read with `gpa_last_error`.

use crate::model::Constraint;
use crate::models::{anchor_energies, Length, SquaredLength};
use crate::solver::GpaSolver;
use crate::types::{GpaError, Result, SolverOptions};
use crate::variable::Variable;
use std::cell::RefCell;
use std::slice;

// ─────────────────────────────────────────────────────────────
//  Error channel
// ─────────────────────────────────────────────────────────────

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

fn set_last_error(message: String) {
    LAST_ERROR.with(|e| *e.borrow_mut() = message);
}

fn clear_last_error() {
    LAST_ERROR.with(|e| e.borrow_mut().clear());
}

/// 0 on success, -1 with the message recorded on failure.
fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error(e.to_string());
            -1
        }
    }
}

/// Copy the last error message (UTF-8, not NUL-terminated) into `buf`.
///
/// Returns the number of bytes written, 0 when no error is recorded, or -1
/// if `buf` is null.  Messages longer than `len` are truncated.
///
/// # Safety
/// `buf` must be valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn gpa_last_error(buf: *mut u8, len: usize) -> i32 {
    if buf.is_null() {
        return -1;
    }
    LAST_ERROR.with(|e| {
        let message = e.borrow();
        let n = message.len().min(len).min(i32::MAX as usize);
        slice::from_raw_parts_mut(buf, len)[..n].copy_from_slice(&message.as_bytes()[..n]);
        n as i32
    })
}

// ─────────────────────────────────────────────────────────────
//  Opaque handle
// ─────────────────────────────────────────────────────────────

/// Solver handle that owns the solver and the variables created through it.
pub struct GpaHandle {
    pub solver: GpaSolver,
    pub variables: Vec<Variable>,
}

impl GpaHandle {
    fn variable(&self, index: usize) -> Result<&Variable> {
        self.variables.get(index).ok_or(GpaError::IndexOutOfRange {
            context: "ffi variable handle",
            index,
            bound: self.variables.len(),
        })
    }
}

unsafe fn handle_mut<'a>(handle: *mut GpaHandle) -> Result<&'a mut GpaHandle> {
    handle
        .as_mut()
        .ok_or_else(|| GpaError::InvalidOption("null solver handle".into()))
}

unsafe fn input<'a>(ptr: *const f64, len: usize) -> Result<&'a [f64]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(GpaError::InvalidOption("null input array".into()));
    }
    Ok(slice::from_raw_parts(ptr, len))
}

/// Create a solver with damping `epsilon` (default ordering).
///
/// Returns null on invalid options.
#[no_mangle]
pub extern "C" fn gpa_create(epsilon: f64) -> *mut GpaHandle {
    match GpaSolver::new(SolverOptions::with_epsilon(epsilon)) {
        Ok(solver) => {
            clear_last_error();
            Box::into_raw(Box::new(GpaHandle {
                solver,
                variables: Vec::new(),
            }))
        }
        Err(e) => {
            set_last_error(e.to_string());
            std::ptr::null_mut()
        }
    }
}

/// Free a handle.
///
/// # Safety
/// `handle` must be a pointer returned by `gpa_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn gpa_free(handle: *mut GpaHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ─────────────────────────────────────────────────────────────
//  Registration
// ─────────────────────────────────────────────────────────────

/// Create and register a variable holding `values[..len]`.
///
/// Returns the variable's index (used by the other calls), or -1.
///
/// # Safety
/// Valid handle; `values` valid for `len` doubles.
#[no_mangle]
pub unsafe extern "C" fn gpa_add_variable(handle: *mut GpaHandle, values: *const f64, len: usize) -> i64 {
    let result = (|| -> Result<usize> {
        let h = handle_mut(handle)?;
        let variable = Variable::from_slice(input(values, len)?);
        h.solver.add_variable(&variable)?;
        h.variables.push(variable);
        Ok(h.variables.len() - 1)
    })();
    match result {
        Ok(index) => {
            clear_last_error();
            index as i64
        }
        Err(e) => {
            set_last_error(e.to_string());
            -1
        }
    }
}

/// Pin every component of a variable to `targets[..len]`.
///
/// # Safety
/// Valid handle; `targets` valid for `len` doubles.
#[no_mangle]
pub unsafe extern "C" fn gpa_add_anchor_energy(
    handle: *mut GpaHandle,
    variable: usize,
    targets: *const f64,
    len: usize,
    weight: f64,
) -> i32 {
    status((|| -> Result<()> {
        let h = handle_mut(handle)?;
        let energies = anchor_energies(h.variable(variable)?, input(targets, len)?, weight)?;
        h.solver.add_energies(energies)?;
        Ok(())
    })())
}

/// `|a − b|² = length²` between two variables of equal dimension.
///
/// # Safety
/// Valid handle.
#[no_mangle]
pub unsafe extern "C" fn gpa_add_squared_length_constraint(
    handle: *mut GpaHandle,
    a: usize,
    b: usize,
    length: f64,
    weight: f64,
) -> i32 {
    status((|| -> Result<()> {
        let h = handle_mut(handle)?;
        let (model, refs) = SquaredLength::between(h.variable(a)?, h.variable(b)?, length)?;
        h.solver.add_constraint(Constraint::new(model, refs, weight)?)?;
        Ok(())
    })())
}

/// `|a − b| = length`, re-linearised every iteration.
///
/// # Safety
/// Valid handle.
#[no_mangle]
pub unsafe extern "C" fn gpa_add_length_constraint(
    handle: *mut GpaHandle,
    a: usize,
    b: usize,
    length: f64,
    weight: f64,
) -> i32 {
    status((|| -> Result<()> {
        let h = handle_mut(handle)?;
        let (model, refs) = Length::between(h.variable(a)?, h.variable(b)?, length)?;
        h.solver.add_constraint(Constraint::new(model, refs, weight)?)?;
        Ok(())
    })())
}

// ─────────────────────────────────────────────────────────────
//  Solve
// ─────────────────────────────────────────────────────────────

/// Freeze the layout.  Call once, after every variable is registered.
///
/// # Safety
/// Valid handle.
#[no_mangle]
pub unsafe extern "C" fn gpa_initialise(handle: *mut GpaHandle) -> i32 {
    status(handle_mut(handle).and_then(|h| h.solver.initialise_x()))
}

/// Run one iteration.  `out_step_norm` may be null.
///
/// # Safety
/// Valid handle; `out_step_norm` null or writable.
#[no_mangle]
pub unsafe extern "C" fn gpa_run_iteration(handle: *mut GpaHandle, parallel: bool, out_step_norm: *mut f64) -> i32 {
    status((|| -> Result<()> {
        let h = handle_mut(handle)?;
        let report = h.solver.run_iteration(parallel)?;
        if let Some(out) = out_step_norm.as_mut() {
            *out = report.step_norm;
        }
        Ok(())
    })())
}

/// Copy a variable's current values into `out[..len]`; `len` must equal
/// its dimension.
///
/// # Safety
/// Valid handle; `out` writable for `len` doubles.
#[no_mangle]
pub unsafe extern "C" fn gpa_read_variable(handle: *mut GpaHandle, variable: usize, out: *mut f64, len: usize) -> i32 {
    status((|| -> Result<()> {
        let h = handle_mut(handle)?;
        let values = h.variable(variable)?.values();
        if values.len() != len {
            return Err(GpaError::DimensionMismatch {
                context: "gpa_read_variable",
                expected: values.len(),
                actual: len,
            });
        }
        if len > 0 {
            if out.is_null() {
                return Err(GpaError::InvalidOption("null output array".into()));
            }
            slice::from_raw_parts_mut(out, len).copy_from_slice(&values);
        }
        Ok(())
    })())
}
