//! Variables: handles onto runs of scalars in the solver's global array.
//!
//! A [`Variable`] starts out owning its values privately.  When the solver
//! freezes its layout the values are moved into the shared [`Arena`] and
//! the handle is repointed at a fixed offset, so every clone of the handle
//! (including the one the caller kept) observes the solver's updates.

use crate::types::{GpaError, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────
//  Arena
// ─────────────────────────────────────────────────────────────

/// The one scalar buffer behind every bound variable.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena(Arc<RwLock<Vec<f64>>>);

impl Arena {
    pub fn new(values: Vec<f64>) -> Self {
        Self(Arc::new(RwLock::new(values)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f64>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f64>> {
        self.0.write()
    }
}

// ─────────────────────────────────────────────────────────────
//  Variable
// ─────────────────────────────────────────────────────────────

enum Binding {
    Private(Vec<f64>),
    Bound { arena: Arena, offset: usize },
}

struct Slot {
    dimension: usize,
    // lock order: binding, then arena
    binding: RwLock<Binding>,
}

/// Opaque handle over `dimension` contiguous scalars.
///
/// Cloning shares the same underlying run; equality and hashing are by
/// identity of that run, never by value.
#[derive(Clone)]
pub struct Variable {
    slot: Arc<Slot>,
}

impl Variable {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            slot: Arc::new(Slot {
                dimension: values.len(),
                binding: RwLock::new(Binding::Private(values)),
            }),
        }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self::new(values.to_vec())
    }

    pub fn dimension(&self) -> usize {
        self.slot.dimension
    }

    /// Copy of the current values.
    pub fn values(&self) -> Vec<f64> {
        match &*self.slot.binding.read() {
            Binding::Private(values) => values.clone(),
            Binding::Bound { arena, offset } => {
                arena.read()[*offset..*offset + self.slot.dimension].to_vec()
            }
        }
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        if index >= self.slot.dimension {
            return Err(GpaError::IndexOutOfRange {
                context: "Variable::get",
                index,
                bound: self.slot.dimension,
            });
        }
        Ok(match &*self.slot.binding.read() {
            Binding::Private(values) => values[index],
            Binding::Bound { arena, offset } => arena.read()[offset + index],
        })
    }

    /// Overwrite every component; the dimension never changes.
    pub fn set_values(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.slot.dimension {
            return Err(GpaError::DimensionMismatch {
                context: "Variable::set_values",
                expected: self.slot.dimension,
                actual: values.len(),
            });
        }
        match &mut *self.slot.binding.write() {
            Binding::Private(own) => own.copy_from_slice(values),
            Binding::Bound { arena, offset } => {
                arena.write()[*offset..*offset + values.len()].copy_from_slice(values)
            }
        }
        Ok(())
    }

    /// Position in the global array, once bound.
    pub fn offset(&self) -> Option<usize> {
        match &*self.slot.binding.read() {
            Binding::Private(_) => None,
            Binding::Bound { offset, .. } => Some(*offset),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.offset().is_some()
    }

    /// Read-only view of the components at `indices`, in that order.
    pub fn subvariable(&self, indices: Vec<usize>) -> Result<SubVariable> {
        SubVariable::new(self.clone(), indices)
    }

    /// Move the private values into `arena[offset..]` and repoint.
    ///
    /// One-way: a variable already living in an arena cannot be rebound.
    pub(crate) fn bind(&self, arena: &Arena, offset: usize) -> Result<()> {
        let mut binding = self.slot.binding.write();
        let values = match &*binding {
            Binding::Private(values) => values,
            Binding::Bound { .. } => return Err(GpaError::LayoutFrozen),
        };
        {
            let mut global = arena.write();
            let end = offset + self.slot.dimension;
            if end > global.len() {
                return Err(GpaError::IndexOutOfRange {
                    context: "Variable::bind",
                    index: end,
                    bound: global.len(),
                });
            }
            global[offset..end].copy_from_slice(values);
        }
        *binding = Binding::Bound {
            arena: arena.clone(),
            offset,
        };
        Ok(())
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.slot) as usize
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("dimension", &self.slot.dimension)
            .field("offset", &self.offset())
            .field("values", &self.values())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────
//  SubVariable
// ─────────────────────────────────────────────────────────────

/// Index subset (or permutation) of a parent variable.
///
/// Holds no values of its own, so it always reflects the parent's current
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubVariable {
    parent: Variable,
    indices: Vec<usize>,
}

impl SubVariable {
    pub fn new(parent: Variable, indices: Vec<usize>) -> Result<Self> {
        let bound = parent.dimension();
        let mut seen = vec![false; bound];
        for &index in &indices {
            if index >= bound {
                return Err(GpaError::IndexOutOfRange {
                    context: "SubVariable::new",
                    index,
                    bound,
                });
            }
            if seen[index] {
                return Err(GpaError::DuplicateIndex { index });
            }
            seen[index] = true;
        }
        Ok(Self { parent, indices })
    }

    pub fn parent(&self) -> &Variable {
        &self.parent
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn dimension(&self) -> usize {
        self.indices.len()
    }

    pub fn values(&self) -> Vec<f64> {
        let all = self.parent.values();
        self.indices.iter().map(|&i| all[i]).collect()
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        match self.indices.get(index) {
            Some(&i) => self.parent.get(i),
            None => Err(GpaError::IndexOutOfRange {
                context: "SubVariable::get",
                index,
                bound: self.indices.len(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  VariableRef  (what energies and constraints bind to)
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableRef {
    Whole(Variable),
    Sub(SubVariable),
}

impl VariableRef {
    /// The variable that owns the storage.
    pub fn variable(&self) -> &Variable {
        match self {
            VariableRef::Whole(v) => v,
            VariableRef::Sub(s) => s.parent(),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            VariableRef::Whole(v) => v.dimension(),
            VariableRef::Sub(s) => s.dimension(),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        match self {
            VariableRef::Whole(v) => v.values(),
            VariableRef::Sub(s) => s.values(),
        }
    }

    /// Global array positions of each local component.
    pub(crate) fn global_indices(&self) -> Result<Vec<usize>> {
        let offset = self.variable().offset().ok_or(GpaError::NotInitialised)?;
        Ok(match self {
            VariableRef::Whole(v) => (offset..offset + v.dimension()).collect(),
            VariableRef::Sub(s) => s.indices().iter().map(|&i| offset + i).collect(),
        })
    }
}

impl From<Variable> for VariableRef {
    fn from(v: Variable) -> Self {
        VariableRef::Whole(v)
    }
}

impl From<&Variable> for VariableRef {
    fn from(v: &Variable) -> Self {
        VariableRef::Whole(v.clone())
    }
}

impl From<SubVariable> for VariableRef {
    fn from(s: SubVariable) -> Self {
        VariableRef::Sub(s)
    }
}

// ─────────────────────────────────────────────────────────────
//  VariableSet
// ─────────────────────────────────────────────────────────────

/// Named collection of variables sharing one dimension, e.g. the vertex
/// positions of a mesh.
#[derive(Debug, Clone)]
pub struct VariableSet {
    name: String,
    dimension: usize,
    variables: Vec<Variable>,
}

impl VariableSet {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            variables: Vec::new(),
        }
    }

    /// Split `values` into consecutive variables of `dimension` scalars.
    pub fn from_flat(name: impl Into<String>, dimension: usize, values: &[f64]) -> Result<Self> {
        if dimension == 0 {
            return Err(GpaError::InvalidOption(
                "variable set dimension must be positive".into(),
            ));
        }
        if values.len() % dimension != 0 {
            return Err(GpaError::DimensionMismatch {
                context: "VariableSet::from_flat (length not a multiple of dimension)",
                expected: values.len().next_multiple_of(dimension),
                actual: values.len(),
            });
        }
        let mut set = Self::new(name, dimension);
        set.variables = values.chunks(dimension).map(Variable::from_slice).collect();
        Ok(set)
    }

    pub fn push(&mut self, values: Vec<f64>) -> Result<Variable> {
        if values.len() != self.dimension {
            return Err(GpaError::DimensionMismatch {
                context: "VariableSet::push",
                expected: self.dimension,
                actual: values.len(),
            });
        }
        let variable = Variable::new(values);
        self.variables.push(variable.clone());
        Ok(variable)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.variables.iter()
    }
}
