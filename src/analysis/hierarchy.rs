//! Direction-vector hierarchy search.
//!
//! Starting from `[*, *, ...]`, each feasible vector has its first `*`
//! refined into `<`, `>` and `=`; infeasible vectors are pruned along with
//! their whole subtree, since refining only adds constraints. Leaves that
//! survive form the direction set, minus those whose first non-`=` entry
//! points backwards.

use std::collections::BTreeSet;

use log::trace;

use crate::analysis::dependence_tester::FourierMotzkinDependenceTester;
use crate::analysis::direction::{Direction, DirectionVector};
use crate::utils::errors::AnalysisResult;

/// Enumerates the feasible direction vectors for one write/read pair.
#[derive(Debug, Clone)]
pub struct DirectionHierarchyTester<'a> {
    tester: &'a FourierMotzkinDependenceTester,
    lower_bounds: Vec<i64>,
    upper_bounds: Vec<i64>,
    write_coefficients: Vec<Vec<i64>>,
    read_coefficients: Vec<Vec<i64>>,
    num_scalars: usize,
}

impl<'a> DirectionHierarchyTester<'a> {
    /// Coefficient rows are `[constant, induction coefficients..., scalar coefficients...]`;
    /// there is one bound pair per common loop.
    pub fn new(
        tester: &'a FourierMotzkinDependenceTester,
        lower_bounds: Vec<i64>,
        upper_bounds: Vec<i64>,
        write_coefficients: Vec<Vec<i64>>,
        read_coefficients: Vec<Vec<i64>>,
        num_scalars: usize,
    ) -> Self {
        debug_assert_eq!(lower_bounds.len(), upper_bounds.len());
        Self {
            tester,
            lower_bounds,
            upper_bounds,
            write_coefficients,
            read_coefficients,
            num_scalars,
        }
    }

    /// Every forward direction vector under which a dependence may exist.
    pub fn possible_dependence_directions(&self) -> AnalysisResult<BTreeSet<DirectionVector>> {
        let mut leaves = BTreeSet::new();
        self.refine(DirectionVector::any(self.lower_bounds.len()), &mut leaves)?;
        leaves.retain(DirectionVector::is_forward);
        Ok(leaves)
    }

    fn refine(&self, vector: DirectionVector, leaves: &mut BTreeSet<DirectionVector>) -> AnalysisResult<()> {
        let feasible = self.tester.test(
            &self.lower_bounds,
            &self.upper_bounds,
            &self.write_coefficients,
            &self.read_coefficients,
            self.num_scalars,
            &vector,
        )?;
        if !feasible {
            trace!("pruned {}", vector);
            return Ok(());
        }
        match vector.first_any() {
            None => {
                leaves.insert(vector);
            }
            Some(i) => {
                for d in [Direction::Lt, Direction::Gt, Direction::Eq] {
                    self.refine(vector.with(i, d), leaves)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::*;

    fn directions(read: Vec<Vec<i64>>) -> BTreeSet<DirectionVector> {
        let tester = FourierMotzkinDependenceTester::default();
        DirectionHierarchyTester::new(
            &tester,
            vec![1, 1],
            vec![100, 100],
            vec![vec![0, 1, 0], vec![0, 0, 1]],
            read,
            0,
        )
        .possible_dependence_directions()
        .unwrap()
    }

    fn set(vectors: &[&[Direction]]) -> BTreeSet<DirectionVector> {
        vectors.iter().map(|v| DirectionVector::new(v.to_vec())).collect()
    }

    #[test]
    fn test_both_loops_carry() {
        // a[i][j] = a[i-1][j-1]
        assert_eq!(directions(vec![vec![-1, 1, 0], vec![-1, 0, 1]]), set(&[&[Lt, Lt]]));
    }

    #[test]
    fn test_outer_loop_carries() {
        assert_eq!(directions(vec![vec![-1, 1, 0], vec![0, 0, 1]]), set(&[&[Lt, Eq]]));
        assert_eq!(directions(vec![vec![-1, 1, 0], vec![1, 0, 1]]), set(&[&[Lt, Gt]]));
    }

    #[test]
    fn test_inner_loop_carries() {
        assert_eq!(directions(vec![vec![0, 1, 0], vec![-1, 0, 1]]), set(&[&[Eq, Lt]]));
    }

    #[test]
    fn test_loop_independent() {
        assert_eq!(directions(vec![vec![0, 1, 0], vec![0, 0, 1]]), set(&[&[Eq, Eq]]));
    }

    #[test]
    fn test_backward_only_is_dropped() {
        // a[i][j] = a[i][j+1]: only [=, >] is feasible
        assert!(directions(vec![vec![0, 1, 0], vec![1, 0, 1]]).is_empty());
    }

    #[test]
    fn test_unrelated_subscripts_cover_everything_forward() {
        // a[i] vs a[j] in a single loop pair
        let tester = FourierMotzkinDependenceTester::default();
        let found = DirectionHierarchyTester::new(&tester, vec![1], vec![10], vec![vec![0, 1]], vec![vec![0, 0]], 0)
            .possible_dependence_directions()
            .unwrap();
        // the read is the constant 0, outside [1, 10]
        assert!(found.is_empty());

        let found = DirectionHierarchyTester::new(&tester, vec![0], vec![10], vec![vec![0, 1]], vec![vec![5, 0]], 0)
            .possible_dependence_directions()
            .unwrap();
        assert_eq!(found, set(&[&[Lt], &[Eq]]));
    }

    #[test]
    fn test_no_loops() {
        let tester = FourierMotzkinDependenceTester::default();
        let found = DirectionHierarchyTester::new(&tester, vec![], vec![], vec![vec![1]], vec![vec![1]], 0)
            .possible_dependence_directions()
            .unwrap();
        assert_eq!(found, set(&[&[]]));
    }
}
