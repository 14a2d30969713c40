use crate::korat_assert_moderate;

/// Trailed bounds store for the finite-domain variables. Bounds only ever
/// tighten during search; every change records the previous bounds so that
/// backtracking restores them exactly.
#[derive(Default, Debug)]
pub(crate) struct DomainStore {
    lower_bounds: Vec<i64>,
    upper_bounds: Vec<i64>,
    trail: Vec<BoundsChange>,
}

#[derive(Clone, Copy, Debug)]
struct BoundsChange {
    variable: usize,
    previous_lower: i64,
    previous_upper: i64,
    decision_level: usize,
}

/// A bound update shrank a domain to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EmptyDomain;

impl DomainStore {
    pub(crate) fn new_domain(&mut self, lower_bound: i64, upper_bound: i64) -> usize {
        korat_assert_moderate!(lower_bound <= upper_bound);
        self.lower_bounds.push(lower_bound);
        self.upper_bounds.push(upper_bound);
        self.lower_bounds.len() - 1
    }

    pub(crate) fn num_domains(&self) -> usize {
        self.lower_bounds.len()
    }

    pub(crate) fn lower_bound(&self, variable: usize) -> i64 {
        self.lower_bounds[variable]
    }

    pub(crate) fn upper_bound(&self, variable: usize) -> i64 {
        self.upper_bounds[variable]
    }

    pub(crate) fn is_fixed(&self, variable: usize) -> bool {
        self.lower_bounds[variable] == self.upper_bounds[variable]
    }

    pub(crate) fn fixed_value(&self, variable: usize) -> Option<i64> {
        if self.is_fixed(variable) {
            Some(self.lower_bounds[variable])
        } else {
            None
        }
    }

    pub(crate) fn tighten_lower_bound(
        &mut self,
        variable: usize,
        bound: i64,
        decision_level: usize,
    ) -> Result<bool, EmptyDomain> {
        if bound <= self.lower_bounds[variable] {
            return Ok(false);
        }
        self.trail.push(BoundsChange {
            variable,
            previous_lower: self.lower_bounds[variable],
            previous_upper: self.upper_bounds[variable],
            decision_level,
        });
        self.lower_bounds[variable] = bound;
        if bound > self.upper_bounds[variable] {
            Err(EmptyDomain)
        } else {
            Ok(true)
        }
    }

    pub(crate) fn tighten_upper_bound(
        &mut self,
        variable: usize,
        bound: i64,
        decision_level: usize,
    ) -> Result<bool, EmptyDomain> {
        if bound >= self.upper_bounds[variable] {
            return Ok(false);
        }
        self.trail.push(BoundsChange {
            variable,
            previous_lower: self.lower_bounds[variable],
            previous_upper: self.upper_bounds[variable],
            decision_level,
        });
        self.upper_bounds[variable] = bound;
        if bound < self.lower_bounds[variable] {
            Err(EmptyDomain)
        } else {
            Ok(true)
        }
    }

    pub(crate) fn backtrack(&mut self, level: usize) {
        while let Some(change) = self.trail.last() {
            if change.decision_level <= level {
                break;
            }
            let change = self.trail.pop().expect("checked non-empty");
            self.lower_bounds[change.variable] = change.previous_lower;
            self.upper_bounds[change.variable] = change.previous_upper;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_restore_on_backtrack() {
        let mut domains = DomainStore::default();
        let x = domains.new_domain(-3, 7);

        assert_eq!(domains.tighten_lower_bound(x, 2, 1), Ok(true));
        assert_eq!(domains.tighten_upper_bound(x, 5, 2), Ok(true));
        assert_eq!(domains.lower_bound(x), 2);
        assert_eq!(domains.upper_bound(x), 5);

        domains.backtrack(1);
        assert_eq!(domains.lower_bound(x), 2);
        assert_eq!(domains.upper_bound(x), 7);

        domains.backtrack(0);
        assert_eq!(domains.lower_bound(x), -3);
    }

    #[test]
    fn emptying_a_domain_is_reported() {
        let mut domains = DomainStore::default();
        let x = domains.new_domain(0, 3);
        assert_eq!(domains.tighten_lower_bound(x, 4, 1), Err(EmptyDomain));
    }
}
