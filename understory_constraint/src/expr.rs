// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linear expressions over solver variables.

use smallvec::SmallVec;

use crate::types::LayoutAttribute;

/// An unknown of the linear system. Each item owns four: x, y, width, height.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub(crate) struct Variable(pub(crate) u32);

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Term {
    pub(crate) variable: Variable,
    pub(crate) coefficient: f64,
}

/// `sum(coefficient * variable) + constant`
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Expression {
    pub(crate) terms: SmallVec<[Term; 4]>,
    pub(crate) constant: f64,
}

impl Expression {
    #[cfg(test)]
    pub(crate) fn from_constant(constant: f64) -> Self {
        Self {
            terms: SmallVec::new(),
            constant,
        }
    }

    pub(crate) fn add_term(&mut self, variable: Variable, coefficient: f64) {
        if let Some(t) = self.terms.iter_mut().find(|t| t.variable == variable) {
            t.coefficient += coefficient;
        } else {
            self.terms.push(Term {
                variable,
                coefficient,
            });
        }
    }

    /// `self += other * scale`
    pub(crate) fn add_scaled(&mut self, other: &Self, scale: f64) {
        for t in &other.terms {
            self.add_term(t.variable, t.coefficient * scale);
        }
        self.constant += other.constant * scale;
    }

    /// Evaluate against a value lookup.
    pub(crate) fn evaluate(&self, mut value_of: impl FnMut(Variable) -> f64) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, t| acc + t.coefficient * value_of(t.variable))
    }
}

/// The four variables of one item.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ItemVariables {
    pub(crate) x: Variable,
    pub(crate) y: Variable,
    pub(crate) width: Variable,
    pub(crate) height: Variable,
}

impl ItemVariables {
    /// Express `attribute` of this item.
    ///
    /// With `mirrored` set, horizontal locations are measured from the right
    /// so that leading and trailing read forward in right-to-left layouts.
    /// `baseline` is the offset of the baseline below the top edge; `None`
    /// places it on the bottom edge.
    pub(crate) fn expression(
        &self,
        attribute: LayoutAttribute,
        mirrored: bool,
        baseline: Option<f64>,
    ) -> Expression {
        let mut e = Expression::default();
        let sign = if mirrored { -1.0 } else { 1.0 };
        match attribute {
            LayoutAttribute::Left => e.add_term(self.x, 1.0),
            LayoutAttribute::Right => {
                e.add_term(self.x, 1.0);
                e.add_term(self.width, 1.0);
            }
            LayoutAttribute::Leading if mirrored => {
                e.add_term(self.x, -1.0);
                e.add_term(self.width, -1.0);
            }
            LayoutAttribute::Leading => e.add_term(self.x, 1.0),
            LayoutAttribute::Trailing if mirrored => e.add_term(self.x, -1.0),
            LayoutAttribute::Trailing => {
                e.add_term(self.x, 1.0);
                e.add_term(self.width, 1.0);
            }
            LayoutAttribute::CenterX => {
                e.add_term(self.x, sign);
                e.add_term(self.width, 0.5 * sign);
            }
            LayoutAttribute::Top => e.add_term(self.y, 1.0),
            LayoutAttribute::Bottom => {
                e.add_term(self.y, 1.0);
                e.add_term(self.height, 1.0);
            }
            LayoutAttribute::CenterY => {
                e.add_term(self.y, 1.0);
                e.add_term(self.height, 0.5);
            }
            LayoutAttribute::Baseline => match baseline {
                Some(offset) => {
                    e.add_term(self.y, 1.0);
                    e.constant = offset;
                }
                None => {
                    e.add_term(self.y, 1.0);
                    e.add_term(self.height, 1.0);
                }
            },
            LayoutAttribute::Width => e.add_term(self.width, 1.0),
            LayoutAttribute::Height => e.add_term(self.height, 1.0),
            LayoutAttribute::NotAnAttribute => {}
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> ItemVariables {
        ItemVariables {
            x: Variable(0),
            y: Variable(1),
            width: Variable(2),
            height: Variable(3),
        }
    }

    fn eval(e: &Expression) -> f64 {
        // x = 10, y = 20, w = 30, h = 40
        e.evaluate(|v| [10.0, 20.0, 30.0, 40.0][v.0 as usize])
    }

    #[test]
    fn edges_and_centers() {
        let v = vars();
        assert_eq!(eval(&v.expression(LayoutAttribute::Right, false, None)), 40.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::CenterX, false, None)), 25.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::CenterY, false, None)), 40.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::Bottom, false, None)), 60.0);
    }

    #[test]
    fn mirrored_leading_is_negated_right_edge() {
        let v = vars();
        assert_eq!(eval(&v.expression(LayoutAttribute::Leading, true, None)), -40.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::Trailing, true, None)), -10.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::Leading, false, None)), 10.0);
    }

    #[test]
    fn baseline_uses_offset_or_bottom() {
        let v = vars();
        assert_eq!(eval(&v.expression(LayoutAttribute::Baseline, false, Some(12.0))), 32.0);
        assert_eq!(eval(&v.expression(LayoutAttribute::Baseline, false, None)), 60.0);
    }

    #[test]
    fn add_scaled_merges_terms() {
        let v = vars();
        let mut e = v.expression(LayoutAttribute::Right, false, None);
        e.add_scaled(&v.expression(LayoutAttribute::Left, false, None), -1.0);
        assert_eq!(eval(&e), 30.0);
        assert!(
            e.terms
                .iter()
                .any(|t| t.variable == v.x && t.coefficient == 0.0),
            "x cancels but keeps its slot"
        );
    }
}
