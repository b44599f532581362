// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental Cassowary simplex solver.
//!
//! Every constraint `expr REL 0` becomes one tableau row. Inequalities get a
//! slack symbol, optional constraints get error symbols that are minimized in
//! the objective, required equalities get a dummy marker. Rows are kept in
//! basic form (`basic = constant + sum(coeff * parametric)`), with every
//! restricted basic symbol non-negative between public calls.
//!
//! Rows are stored in ordered maps so pivot choices, and therefore solutions,
//! are reproducible run to run.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::expr::{Expression, Variable};
use crate::types::Relation;

const EPSILON: f64 = 1.0e-8;

fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
enum SymbolKind {
    External,
    Slack,
    Error,
    Dummy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
struct Symbol {
    id: u32,
    kind: SymbolKind,
}

impl Symbol {
    fn is_restricted(self) -> bool {
        self.kind != SymbolKind::External
    }

    fn is_pivotable(self) -> bool {
        matches!(self.kind, SymbolKind::Slack | SymbolKind::Error)
    }
}

#[derive(Clone, Debug, Default)]
struct Row {
    cells: BTreeMap<Symbol, f64>,
    constant: f64,
}

impl Row {
    fn new(constant: f64) -> Self {
        Self {
            cells: BTreeMap::new(),
            constant,
        }
    }

    fn coefficient_for(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    fn insert_symbol(&mut self, symbol: Symbol, coefficient: f64) {
        let entry = self.cells.entry(symbol).or_insert(0.0);
        *entry += coefficient;
        if near_zero(*entry) {
            self.cells.remove(&symbol);
        }
    }

    fn insert_row(&mut self, other: &Self, coefficient: f64) {
        self.constant += other.constant * coefficient;
        for (&s, &c) in &other.cells {
            self.insert_symbol(s, c * coefficient);
        }
    }

    fn remove(&mut self, symbol: Symbol) {
        self.cells.remove(&symbol);
    }

    fn reverse_sign(&mut self) {
        self.constant = -self.constant;
        for c in self.cells.values_mut() {
            *c = -*c;
        }
    }

    /// Rewrite `0 = self` as `symbol = ...`; `symbol` must be present.
    fn solve_for(&mut self, symbol: Symbol) {
        let Some(c) = self.cells.remove(&symbol) else {
            debug_assert!(false, "solve_for on a symbol outside the row");
            return;
        };
        let scale = -1.0 / c;
        self.constant *= scale;
        for v in self.cells.values_mut() {
            *v *= scale;
        }
    }

    /// Rewrite `lhs = self` as `rhs = ...`.
    fn solve_for_symbols(&mut self, lhs: Symbol, rhs: Symbol) {
        self.insert_symbol(lhs, -1.0);
        self.solve_for(rhs);
    }

    fn substitute(&mut self, symbol: Symbol, row: &Self) {
        if let Some(c) = self.cells.remove(&symbol) {
            self.insert_row(row, c);
        }
    }

    fn all_dummies(&self) -> bool {
        self.cells.keys().all(|s| s.kind == SymbolKind::Dummy)
    }
}

#[derive(Copy, Clone, Debug)]
struct Tag {
    marker: Symbol,
    other: Option<Symbol>,
    /// Coefficient of `marker` in the unreversed constraint row.
    marker_coefficient: f64,
    /// Objective weight, `None` for required constraints.
    weight: Option<f64>,
}

/// Failures reported by the tableau.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SolverError {
    /// The key is already present.
    Duplicate,
    /// The key is not present.
    Unknown,
    /// The required subset has no solution.
    Unsatisfiable,
    /// The objective is unbounded; an internal invariant was broken.
    Unbounded,
}

/// Tableau and bookkeeping for one solve set.
#[derive(Debug)]
pub(crate) struct Solver<K> {
    rows: BTreeMap<Symbol, Row>,
    tags: HashMap<K, Tag>,
    variables: HashMap<Variable, Symbol>,
    infeasible: Vec<Symbol>,
    objective: Row,
    artificial: Option<Row>,
    next_symbol: u32,
}

impl<K: Copy + Eq + Hash> Default for Solver<K> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            tags: HashMap::new(),
            variables: HashMap::new(),
            infeasible: Vec::new(),
            objective: Row::default(),
            artificial: None,
            next_symbol: 0,
        }
    }
}

impl<K: Copy + Eq + Hash> Solver<K> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: K) -> bool {
        self.tags.contains_key(&key)
    }

    /// Add `expr REL 0`. `weight` is `None` for required constraints.
    pub(crate) fn add_constraint(
        &mut self,
        key: K,
        expr: &Expression,
        relation: Relation,
        weight: Option<f64>,
    ) -> Result<(), SolverError> {
        if self.tags.contains_key(&key) {
            return Err(SolverError::Duplicate);
        }
        let (mut row, tag) = self.create_row(expr, relation, weight);
        let mut subject = Self::choose_subject(&row, &tag);
        if subject.is_none() && row.all_dummies() {
            if !near_zero(row.constant) {
                self.retract_objective_terms(&tag);
                return Err(SolverError::Unsatisfiable);
            }
            subject = Some(tag.marker);
        }
        match subject {
            Some(subject) => {
                row.solve_for(subject);
                self.substitute(subject, &row);
                self.rows.insert(subject, row);
            }
            None => {
                if !self.add_with_artificial_variable(row)? {
                    self.retract_objective_terms(&tag);
                    return Err(SolverError::Unsatisfiable);
                }
            }
        }
        self.tags.insert(key, tag);
        self.optimize_objective()
    }

    pub(crate) fn remove_constraint(&mut self, key: K) -> Result<(), SolverError> {
        let tag = self.tags.remove(&key).ok_or(SolverError::Unknown)?;
        self.retract_objective_terms(&tag);
        if self.rows.remove(&tag.marker).is_none() {
            let leaving = self
                .marker_leaving_symbol(tag.marker)
                .ok_or(SolverError::Unbounded)?;
            if let Some(mut row) = self.rows.remove(&leaving) {
                row.solve_for_symbols(leaving, tag.marker);
                self.substitute(tag.marker, &row);
            }
        }
        self.optimize_objective()
    }

    /// Shift the constant of an attached constraint's expression by `delta`.
    ///
    /// The marker symbol absorbs the shift, so only rows that mention it are
    /// touched before a dual simplex pass restores feasibility. On failure
    /// the previous system is restored.
    pub(crate) fn change_constant(&mut self, key: K, delta: f64) -> Result<(), SolverError> {
        let tag = *self.tags.get(&key).ok_or(SolverError::Unknown)?;
        if near_zero(delta) {
            return Ok(());
        }
        let shift = delta / tag.marker_coefficient;
        self.shift_marker(tag.marker, shift);
        if self.settle_dummies() && self.dual_optimize().is_ok() {
            return Ok(());
        }
        self.infeasible.clear();
        self.shift_marker(tag.marker, -shift);
        let restored = self.settle_dummies() && self.dual_optimize().is_ok();
        debug_assert!(restored, "reverting a constant shift must be feasible");
        self.optimize_objective()?;
        Err(SolverError::Unsatisfiable)
    }

    /// Current value of `variable`; zero if it is unknown or parametric.
    pub(crate) fn value_of(&self, variable: Variable) -> f64 {
        self.variables
            .get(&variable)
            .and_then(|s| self.rows.get(s))
            .map_or(0.0, |r| r.constant)
    }

    /// Whether some other optimal solution assigns `variable` a different value.
    ///
    /// Looks for a non-dummy parametric symbol with zero reduced cost that
    /// moves `variable` and can step away from its bound without making a
    /// restricted row negative.
    pub(crate) fn is_ambiguous(&self, variable: Variable) -> bool {
        let Some(&symbol) = self.variables.get(&variable) else {
            return true;
        };
        let own_row = self.rows.get(&symbol);
        let candidates: Vec<(Symbol, f64)> = match own_row {
            Some(row) => row.cells.iter().map(|(&s, &c)| (s, c)).collect(),
            None => alloc::vec![(symbol, 1.0)],
        };
        candidates.into_iter().any(|(p, effect)| {
            if p.kind == SymbolKind::Dummy || near_zero(effect) {
                return false;
            }
            if !near_zero(self.objective.coefficient_for(p)) {
                return false;
            }
            let can_step = |direction: f64| {
                self.rows.iter().all(|(&basic, row)| {
                    if !basic.is_restricted() || basic.kind == SymbolKind::Dummy {
                        return true;
                    }
                    let c = row.coefficient_for(p) * direction;
                    c >= 0.0 || row.constant > EPSILON
                })
            };
            if p.is_restricted() {
                can_step(1.0)
            } else {
                can_step(1.0) || can_step(-1.0)
            }
        })
    }

    /// Forget a variable that no attached constraint references anymore.
    pub(crate) fn remove_variable(&mut self, variable: Variable) {
        if let Some(symbol) = self.variables.remove(&variable) {
            self.rows.remove(&symbol);
        }
    }

    fn new_symbol(&mut self, kind: SymbolKind) -> Symbol {
        self.next_symbol += 1;
        Symbol {
            id: self.next_symbol,
            kind,
        }
    }

    fn variable_symbol(&mut self, variable: Variable) -> Symbol {
        if let Some(&s) = self.variables.get(&variable) {
            return s;
        }
        let s = self.new_symbol(SymbolKind::External);
        self.variables.insert(variable, s);
        s
    }

    fn create_row(
        &mut self,
        expr: &Expression,
        relation: Relation,
        weight: Option<f64>,
    ) -> (Row, Tag) {
        let mut row = Row::new(expr.constant);
        for term in &expr.terms {
            if near_zero(term.coefficient) {
                continue;
            }
            let symbol = self.variable_symbol(term.variable);
            if let Some(basic) = self.rows.get(&symbol) {
                row.insert_row(basic, term.coefficient);
            } else {
                row.insert_symbol(symbol, term.coefficient);
            }
        }
        let tag = match relation {
            Relation::LessOrEqual | Relation::GreaterOrEqual => {
                let coefficient = if relation == Relation::LessOrEqual {
                    1.0
                } else {
                    -1.0
                };
                let slack = self.new_symbol(SymbolKind::Slack);
                row.insert_symbol(slack, coefficient);
                let other = weight.map(|w| {
                    let error = self.new_symbol(SymbolKind::Error);
                    row.insert_symbol(error, -coefficient);
                    self.objective.insert_symbol(error, w);
                    error
                });
                Tag {
                    marker: slack,
                    other,
                    marker_coefficient: coefficient,
                    weight,
                }
            }
            Relation::Equal => match weight {
                Some(w) => {
                    let plus = self.new_symbol(SymbolKind::Error);
                    let minus = self.new_symbol(SymbolKind::Error);
                    row.insert_symbol(plus, -1.0);
                    row.insert_symbol(minus, 1.0);
                    self.objective.insert_symbol(plus, w);
                    self.objective.insert_symbol(minus, w);
                    Tag {
                        marker: plus,
                        other: Some(minus),
                        marker_coefficient: -1.0,
                        weight,
                    }
                }
                None => {
                    let dummy = self.new_symbol(SymbolKind::Dummy);
                    row.insert_symbol(dummy, 1.0);
                    Tag {
                        marker: dummy,
                        other: None,
                        marker_coefficient: 1.0,
                        weight,
                    }
                }
            },
        };
        if row.constant < 0.0 {
            row.reverse_sign();
        }
        (row, tag)
    }

    fn choose_subject(row: &Row, tag: &Tag) -> Option<Symbol> {
        if let Some(&s) = row.cells.keys().find(|s| s.kind == SymbolKind::External) {
            return Some(s);
        }
        if tag.marker.is_pivotable() && row.coefficient_for(tag.marker) < 0.0 {
            return Some(tag.marker);
        }
        tag.other
            .filter(|o| o.is_pivotable() && row.coefficient_for(*o) < 0.0)
    }

    /// Add `row` through phase one of the two-phase simplex.
    ///
    /// Returns `Ok(false)` when the row cannot hold together with the rows
    /// already present. The tableau is then exactly as it was before the call.
    fn add_with_artificial_variable(&mut self, row: Row) -> Result<bool, SolverError> {
        let saved = (self.rows.clone(), self.objective.clone());

        let art = self.new_symbol(SymbolKind::Slack);
        self.rows.insert(art, row.clone());
        self.artificial = Some(row);
        let optimized = self.optimize(true);
        let success = self
            .artificial
            .take()
            .is_some_and(|a| near_zero(a.constant));
        if let Err(err) = optimized {
            self.restore(saved);
            return Err(err);
        }
        if !success {
            self.restore(saved);
            return Ok(false);
        }

        if let Some(mut row) = self.rows.remove(&art) {
            if row.cells.is_empty() {
                return Ok(true);
            }
            let Some(&entering) = row.cells.keys().find(|s| s.is_pivotable()) else {
                self.restore(saved);
                return Ok(false);
            };
            row.solve_for_symbols(art, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
        for row in self.rows.values_mut() {
            row.remove(art);
        }
        self.objective.remove(art);
        Ok(true)
    }

    fn restore(&mut self, (rows, objective): (BTreeMap<Symbol, Row>, Row)) {
        self.rows = rows;
        self.objective = objective;
        self.infeasible.clear();
        self.artificial = None;
    }

    fn retract_objective_terms(&mut self, tag: &Tag) {
        let Some(weight) = tag.weight else {
            return;
        };
        for symbol in core::iter::once(tag.marker).chain(tag.other) {
            if symbol.kind != SymbolKind::Error {
                continue;
            }
            if let Some(row) = self.rows.get(&symbol) {
                self.objective.insert_row(row, -weight);
            } else {
                self.objective.insert_symbol(symbol, -weight);
            }
        }
    }

    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        for (&basic, r) in &mut self.rows {
            r.substitute(symbol, row);
            if basic.is_restricted() && r.constant < 0.0 {
                self.infeasible.push(basic);
            }
        }
        self.objective.substitute(symbol, row);
        if let Some(a) = &mut self.artificial {
            a.substitute(symbol, row);
        }
    }

    fn optimize_objective(&mut self) -> Result<(), SolverError> {
        self.optimize(false)
    }

    fn optimize(&mut self, artificial: bool) -> Result<(), SolverError> {
        loop {
            let objective = if artificial {
                match &self.artificial {
                    Some(a) => a,
                    None => return Ok(()),
                }
            } else {
                &self.objective
            };
            let entering = objective
                .cells
                .iter()
                .find(|(s, c)| s.kind != SymbolKind::Dummy && **c < 0.0)
                .map(|(s, _)| *s);
            let Some(entering) = entering else {
                return Ok(());
            };
            let leaving = self
                .leaving_symbol(entering)
                .ok_or(SolverError::Unbounded)?;
            if let Some(mut row) = self.rows.remove(&leaving) {
                row.solve_for_symbols(leaving, entering);
                self.substitute(entering, &row);
                self.rows.insert(entering, row);
            }
        }
    }

    fn leaving_symbol(&self, entering: Symbol) -> Option<Symbol> {
        let mut ratio = f64::MAX;
        let mut found = None;
        for (&s, row) in &self.rows {
            if !s.is_restricted() {
                continue;
            }
            let c = row.coefficient_for(entering);
            if c < 0.0 {
                let r = -row.constant / c;
                if r < ratio {
                    ratio = r;
                    found = Some(s);
                }
            }
        }
        found
    }

    fn marker_leaving_symbol(&self, marker: Symbol) -> Option<Symbol> {
        let mut r1 = f64::MAX;
        let mut r2 = f64::MAX;
        let (mut first, mut second, mut third) = (None, None, None);
        for (&s, row) in &self.rows {
            let c = row.coefficient_for(marker);
            if c == 0.0 {
                continue;
            }
            if !s.is_restricted() {
                third = Some(s);
            } else if c < 0.0 {
                let r = -row.constant / c;
                if r < r1 {
                    r1 = r;
                    first = Some(s);
                }
            } else {
                let r = row.constant / c;
                if r < r2 {
                    r2 = r;
                    second = Some(s);
                }
            }
        }
        first.or(second).or(third)
    }

    /// Replace `marker` by `marker' + shift` throughout the tableau.
    fn shift_marker(&mut self, marker: Symbol, shift: f64) {
        if let Some(row) = self.rows.get_mut(&marker) {
            row.constant -= shift;
            if marker.is_restricted() && row.constant < 0.0 {
                self.infeasible.push(marker);
            }
            return;
        }
        for (&basic, row) in &mut self.rows {
            let c = row.coefficient_for(marker);
            if c == 0.0 {
                continue;
            }
            row.constant += c * shift;
            if basic.is_restricted() && row.constant < 0.0 {
                self.infeasible.push(basic);
            }
        }
    }

    /// Basic dummies must stay at zero. Pivot them out where possible.
    fn settle_dummies(&mut self) -> bool {
        let offending: Vec<Symbol> = self
            .rows
            .iter()
            .filter(|(s, r)| s.kind == SymbolKind::Dummy && !near_zero(r.constant))
            .map(|(s, _)| *s)
            .collect();
        for dummy in offending {
            let Some(mut row) = self.rows.remove(&dummy) else {
                continue;
            };
            let Some(&entering) = row.cells.keys().find(|s| s.kind != SymbolKind::Dummy) else {
                self.rows.insert(dummy, row);
                return false;
            };
            row.solve_for_symbols(dummy, entering);
            self.substitute(entering, &row);
            if entering.is_restricted() && row.constant < 0.0 {
                self.infeasible.push(entering);
            }
            self.rows.insert(entering, row);
        }
        true
    }

    fn dual_optimize(&mut self) -> Result<(), SolverError> {
        while let Some(leaving) = self.infeasible.pop() {
            let Some(row) = self.rows.get(&leaving) else {
                continue;
            };
            if near_zero(row.constant) || row.constant >= 0.0 {
                continue;
            }
            let mut ratio = f64::MAX;
            let mut entering = None;
            for (&s, &c) in &row.cells {
                if c > 0.0 && s.kind != SymbolKind::Dummy {
                    let r = self.objective.coefficient_for(s) / c;
                    if r < ratio {
                        ratio = r;
                        entering = Some(s);
                    }
                }
            }
            let Some(entering) = entering else {
                self.infeasible.clear();
                return Err(SolverError::Unsatisfiable);
            };
            if let Some(mut row) = self.rows.remove(&leaving) {
                row.solve_for_symbols(leaving, entering);
                self.substitute(entering, &row);
                self.rows.insert(entering, row);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(terms: &[(u32, f64)], constant: f64) -> Expression {
        let mut e = Expression::from_constant(constant);
        for &(v, c) in terms {
            e.add_term(Variable(v), c);
        }
        e
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1.0e-6
    }

    #[test]
    fn required_equality_pins_value() {
        let mut s = Solver::new();
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        assert!(close(s.value_of(Variable(0)), 10.0));
    }

    #[test]
    fn conflicting_required_equalities_fail() {
        let mut s = Solver::new();
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        let err = s
            .add_constraint(1, &expr(&[(0, 1.0)], -20.0), Relation::Equal, None)
            .unwrap_err();
        assert_eq!(err, SolverError::Unsatisfiable);
        assert!(close(s.value_of(Variable(0)), 10.0));
        assert!(!s.contains(1));
    }

    #[test]
    fn conflicting_required_inequalities_fail() {
        let mut s = Solver::new();
        // x >= 10
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::GreaterOrEqual, None)
            .unwrap();
        // x <= 5
        let err = s
            .add_constraint(1, &expr(&[(0, 1.0)], -5.0), Relation::LessOrEqual, None)
            .unwrap_err();
        assert_eq!(err, SolverError::Unsatisfiable);
        assert!(!s.contains(1));
        assert!(s.value_of(Variable(0)) >= 10.0 - 1.0e-6);
        // The rejected bound must not linger in the tableau.
        s.add_constraint(2, &expr(&[(0, 1.0)], -30.0), Relation::Equal, Some(1.0))
            .unwrap();
        assert!(close(s.value_of(Variable(0)), 30.0));
        s.add_constraint(3, &expr(&[(0, 1.0)], -40.0), Relation::LessOrEqual, None)
            .unwrap();
        assert!(close(s.value_of(Variable(0)), 30.0));
    }

    #[test]
    fn rejected_inequality_against_two_variables_leaves_tableau_intact() {
        let mut s = Solver::new();
        // x >= 10, y == x + 5
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::GreaterOrEqual, None)
            .unwrap();
        s.add_constraint(1, &expr(&[(1, 1.0), (0, -1.0)], -5.0), Relation::Equal, None)
            .unwrap();
        // y <= 12 forces x <= 7.
        assert_eq!(
            s.add_constraint(2, &expr(&[(1, 1.0)], -12.0), Relation::LessOrEqual, None),
            Err(SolverError::Unsatisfiable)
        );
        let x = s.value_of(Variable(0));
        let y = s.value_of(Variable(1));
        assert!(x >= 10.0 - 1.0e-6, "x = {x}");
        assert!(close(y, x + 5.0), "x = {x}, y = {y}");
        // y <= 20 is compatible and still accepted.
        s.add_constraint(3, &expr(&[(1, 1.0)], -20.0), Relation::LessOrEqual, None)
            .unwrap();
        let x = s.value_of(Variable(0));
        assert!((10.0 - 1.0e-6..=15.0 + 1.0e-6).contains(&x), "x = {x}");
    }

    #[test]
    fn stronger_optional_wins() {
        let mut s = Solver::new();
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::Equal, Some(250.0))
            .unwrap();
        s.add_constraint(1, &expr(&[(0, 1.0)], -20.0), Relation::Equal, Some(750.0))
            .unwrap();
        assert!(close(s.value_of(Variable(0)), 20.0));
        s.remove_constraint(1).unwrap();
        assert!(close(s.value_of(Variable(0)), 10.0));
    }

    #[test]
    fn optional_inequality_respects_required_bound() {
        let mut s = Solver::new();
        // x <= 100 (required), x == 150 (optional)
        s.add_constraint(0, &expr(&[(0, 1.0)], -100.0), Relation::LessOrEqual, None)
            .unwrap();
        s.add_constraint(1, &expr(&[(0, 1.0)], -150.0), Relation::Equal, Some(500.0))
            .unwrap();
        assert!(close(s.value_of(Variable(0)), 100.0));
    }

    #[test]
    fn change_constant_moves_solution() {
        let mut s = Solver::new();
        // x == 10, y == x + 5
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        s.add_constraint(1, &expr(&[(1, 1.0), (0, -1.0)], -5.0), Relation::Equal, None)
            .unwrap();
        s.change_constant(0, -20.0).unwrap();
        assert!(close(s.value_of(Variable(0)), 30.0));
        assert!(close(s.value_of(Variable(1)), 35.0));
    }

    #[test]
    fn change_constant_conflict_is_reverted() {
        let mut s = Solver::new();
        // x >= 10, x <= 20
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::GreaterOrEqual, None)
            .unwrap();
        s.add_constraint(1, &expr(&[(0, 1.0)], -20.0), Relation::LessOrEqual, None)
            .unwrap();
        // Raise the lower bound to 30.
        let err = s.change_constant(0, -20.0).unwrap_err();
        assert_eq!(err, SolverError::Unsatisfiable);
        let x = s.value_of(Variable(0));
        assert!((10.0 - 1.0e-6..=20.0 + 1.0e-6).contains(&x), "x = {x}");
        // Still usable afterwards.
        s.change_constant(0, -5.0).unwrap();
        assert!(s.value_of(Variable(0)) >= 15.0 - 1.0e-6);
    }

    #[test]
    fn redundant_equality_then_shift_conflicts() {
        let mut s = Solver::new();
        s.add_constraint(0, &expr(&[(0, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        s.add_constraint(1, &expr(&[(0, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        assert_eq!(s.change_constant(1, -5.0), Err(SolverError::Unsatisfiable));
        assert!(close(s.value_of(Variable(0)), 10.0));
        s.remove_constraint(1).unwrap();
        s.change_constant(0, -5.0).unwrap();
        assert!(close(s.value_of(Variable(0)), 15.0));
    }

    #[test]
    fn unknown_and_duplicate_keys() {
        let mut s: Solver<u32> = Solver::new();
        assert_eq!(s.remove_constraint(7), Err(SolverError::Unknown));
        s.add_constraint(7, &expr(&[(0, 1.0)], 0.0), Relation::Equal, None)
            .unwrap();
        assert_eq!(
            s.add_constraint(7, &expr(&[(0, 1.0)], 0.0), Relation::Equal, None),
            Err(SolverError::Duplicate)
        );
    }

    #[test]
    fn ambiguity_detection() {
        let mut s = Solver::new();
        // x + y == 10 leaves a free direction.
        s.add_constraint(0, &expr(&[(0, 1.0), (1, 1.0)], -10.0), Relation::Equal, None)
            .unwrap();
        assert!(s.is_ambiguous(Variable(0)));
        s.add_constraint(1, &expr(&[(1, 1.0)], -4.0), Relation::Equal, None)
            .unwrap();
        assert!(!s.is_ambiguous(Variable(0)));
        assert!(close(s.value_of(Variable(0)), 6.0));
        assert!(s.is_ambiguous(Variable(9)));
    }
}
