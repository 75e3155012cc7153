//! The Guided Projection solver.
//!
//! Lifecycle: register variables, energies and constraints, call
//! [`GpaSolver::initialise_x`] once to freeze the layout, then call
//! [`GpaSolver::run_iteration`] as often as needed.  Each iteration
//! linearises every constraint at the current point, assembles
//!
//! ```text
//! (HᵗH + KᵗK + ε²I) · x = Hᵗr + Kᵗs + ε²·x_prev
//! ```
//!
//! and overwrites the global array with its Cholesky solution.

use crate::assembly::{self, join_if, Block};
use crate::model::{Constraint, Energy};
use crate::types::{GpaError, IterationReport, Result, SolverOptions};
use crate::variable::{Arena, Variable, VariableRef, VariableSet};
use hashbrown::HashSet;
use tracing::{debug, info, warn};

/// Handle returned by [`GpaSolver::add_energy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnergyId(pub usize);

/// Handle returned by [`GpaSolver::add_constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub usize);

/// Weight as a function of the zero-based index of the iteration about to run.
pub type WeightSchedule = Box<dyn Fn(usize) -> f64 + Send + Sync>;

pub struct GpaSolver {
    options: SolverOptions,
    variables: Vec<Variable>,
    known: HashSet<Variable>,
    energies: Vec<Energy>,
    constraints: Vec<Constraint>,
    energy_schedules: Vec<(usize, WeightSchedule)>,
    constraint_schedules: Vec<(usize, WeightSchedule)>,
    arena: Option<Arena>,
    iteration: usize,
}

impl GpaSolver {
    pub fn new(options: SolverOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            variables: Vec::new(),
            known: HashSet::new(),
            energies: Vec::new(),
            constraints: Vec::new(),
            energy_schedules: Vec::new(),
            constraint_schedules: Vec::new(),
            arena: None,
            iteration: 0,
        })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    // ── Registration ─────────────────────────────────────────

    /// Register a variable.  Registering the same handle twice is a no-op.
    pub fn add_variable(&mut self, variable: &Variable) -> Result<()> {
        if self.known.contains(variable) {
            return Ok(());
        }
        if self.arena.is_some() || variable.is_bound() {
            return Err(GpaError::LayoutFrozen);
        }
        self.known.insert(variable.clone());
        self.variables.push(variable.clone());
        Ok(())
    }

    pub fn add_variable_set(&mut self, set: &VariableSet) -> Result<()> {
        set.iter().try_for_each(|v| self.add_variable(v))
    }

    /// Register every variable behind `refs`, or none of them.
    fn register_refs(&mut self, refs: &[VariableRef]) -> Result<()> {
        let frozen = self.arena.is_some();
        for r in refs {
            let v = r.variable();
            if !self.known.contains(v) && (frozen || v.is_bound()) {
                return Err(GpaError::LayoutFrozen);
            }
        }
        refs.iter().try_for_each(|r| self.add_variable(r.variable()))
    }

    /// Register an energy, along with any of its variables not yet known.
    ///
    /// After `initialise_x` this still works, provided every bound variable
    /// is already part of the layout.
    pub fn add_energy(&mut self, mut energy: Energy) -> Result<EnergyId> {
        self.register_refs(energy.variables())?;
        if self.arena.is_some() {
            energy.resolve()?;
        }
        self.energies.push(energy);
        Ok(EnergyId(self.energies.len() - 1))
    }

    pub fn add_energies(&mut self, energies: Vec<Energy>) -> Result<Vec<EnergyId>> {
        energies.into_iter().map(|e| self.add_energy(e)).collect()
    }

    pub fn add_constraint(&mut self, mut constraint: Constraint) -> Result<ConstraintId> {
        self.register_refs(constraint.variables())?;
        if self.arena.is_some() {
            constraint.resolve()?;
        }
        self.constraints.push(constraint);
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    // ── Weights ──────────────────────────────────────────────

    fn check_energy(&self, id: EnergyId) -> Result<()> {
        if id.0 >= self.energies.len() {
            return Err(GpaError::IndexOutOfRange {
                context: "energy id",
                index: id.0,
                bound: self.energies.len(),
            });
        }
        Ok(())
    }

    fn check_constraint(&self, id: ConstraintId) -> Result<()> {
        if id.0 >= self.constraints.len() {
            return Err(GpaError::IndexOutOfRange {
                context: "constraint id",
                index: id.0,
                bound: self.constraints.len(),
            });
        }
        Ok(())
    }

    pub fn set_energy_weight(&mut self, id: EnergyId, weight: f64) -> Result<()> {
        self.check_energy(id)?;
        self.energies[id.0].set_weight(weight)
    }

    pub fn set_constraint_weight(&mut self, id: ConstraintId, weight: f64) -> Result<()> {
        self.check_constraint(id)?;
        self.constraints[id.0].set_weight(weight)
    }

    /// Recompute this energy's weight from `schedule` at the top of every
    /// iteration.  Replaces any earlier schedule for the same energy.
    pub fn schedule_energy_weight<F>(&mut self, id: EnergyId, schedule: F) -> Result<()>
    where
        F: Fn(usize) -> f64 + Send + Sync + 'static,
    {
        self.check_energy(id)?;
        self.energy_schedules.retain(|(target, _)| *target != id.0);
        self.energy_schedules.push((id.0, Box::new(schedule)));
        Ok(())
    }

    pub fn schedule_constraint_weight<F>(&mut self, id: ConstraintId, schedule: F) -> Result<()>
    where
        F: Fn(usize) -> f64 + Send + Sync + 'static,
    {
        self.check_constraint(id)?;
        self.constraint_schedules.retain(|(target, _)| *target != id.0);
        self.constraint_schedules.push((id.0, Box::new(schedule)));
        Ok(())
    }

    fn apply_schedules(&mut self) -> Result<()> {
        let k = self.iteration;
        for (target, schedule) in &self.energy_schedules {
            self.energies[*target].set_weight(schedule(k))?;
        }
        for (target, schedule) in &self.constraint_schedules {
            self.constraints[*target].set_weight(schedule(k))?;
        }
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Allocate the global array, move every variable into it and freeze
    /// the layout.  Variables are laid out in registration order.
    pub fn initialise_x(&mut self) -> Result<()> {
        if self.arena.is_some() {
            return Err(GpaError::AlreadyInitialised);
        }
        if self.variables.iter().any(Variable::is_bound) {
            return Err(GpaError::LayoutFrozen);
        }
        let total: usize = self.variables.iter().map(Variable::dimension).sum();
        let arena = Arena::new(vec![0.0; total]);
        let mut offset = 0;
        for v in &self.variables {
            v.bind(&arena, offset)?;
            offset += v.dimension();
        }
        self.arena = Some(arena);

        for e in &mut self.energies {
            e.resolve()?;
        }
        for c in &mut self.constraints {
            c.resolve()?;
        }
        info!(
            variables = self.variables.len(),
            unknowns = total,
            energies = self.energies.len(),
            constraints = self.constraints.len(),
            "gpa layout frozen"
        );
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.arena.is_some()
    }

    /// One assemble → solve → update step.
    ///
    /// On any failure the global array and the iteration counter are left
    /// exactly as they were.
    pub fn run_iteration(&mut self, parallel: bool) -> Result<IterationReport> {
        let arena = self.arena.clone().ok_or(GpaError::NotInitialised)?;
        let result = self.step(&arena, parallel);
        match &result {
            Ok(report) => debug!(
                iteration = report.iteration,
                constraint_rows = report.constraint_rows,
                energy_rows = report.energy_rows,
                residual = report.constraint_residual,
                step = report.step_norm,
                parallel,
                "gpa iteration"
            ),
            Err(e) => warn!(iteration = self.iteration, error = %e, "gpa iteration failed"),
        }
        result
    }

    fn step(&mut self, arena: &Arena, parallel: bool) -> Result<IterationReport> {
        let x_prev = arena.read().clone();

        assembly::refresh_constraints(&mut self.constraints, &x_prev, parallel)?;
        self.apply_schedules()?;

        let (h_rows, k_rows) = join_if(
            parallel,
            || assembly::constraint_rows(&self.constraints, &x_prev, parallel),
            || assembly::energy_rows(&self.energies, parallel),
        );
        let h_rows = h_rows?;

        let n = x_prev.len();
        let h = Block::from_rows(&h_rows, n)?;
        let k = Block::from_rows(&k_rows, n)?;
        let system = assembly::normal_equations(
            h.as_ref(),
            k.as_ref(),
            &x_prev,
            self.options.epsilon,
            parallel,
        )?;
        let x_new = system.lhs.cholesky(self.options.ordering)?.solve(&system.rhs)?;

        let step_norm = x_new
            .iter()
            .zip(&x_prev)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let report = IterationReport {
            iteration: self.iteration,
            constraint_rows: h_rows.len(),
            energy_rows: k_rows.len(),
            constraint_residual: assembly::residual_norm(&h_rows, &x_prev),
            step_norm,
        };

        let values = x_new.to_vec();
        arena.write().copy_from_slice(&values);
        self.iteration += 1;
        Ok(report)
    }

    // ── Queries ──────────────────────────────────────────────

    /// Snapshot of the global array, once initialised.
    pub fn x(&self) -> Option<Vec<f64>> {
        self.arena.as_ref().map(|a| a.read().clone())
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn energy_count(&self) -> usize {
        self.energies.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn energy(&self, id: EnergyId) -> Option<&Energy> {
        self.energies.get(id.0)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.0)
    }
}
