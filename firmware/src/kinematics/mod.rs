//! Kinematics matrix storage for the `KINEMATICS_INIT` phase.
//!
//! The matrices live in a `StaticCell` that can be claimed exactly once. The
//! first initialization claims it; later runs zero the matrices in place. A
//! cell that was claimed elsewhere surfaces as
//! [`AllocationError::StorageUnavailable`], which the sequencer reports as a
//! failed self-test.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use selftest_core::sequencer::{AllocationError, KinematicsSolver};
use static_cell::StaticCell;

use crate::diagnostics;

/// Joints tracked by the solver.
pub const JOINT_COUNT: usize = 3;

pub type Matrix = [[f32; JOINT_COUNT]; JOINT_COUNT];

/// Working matrices used by the kinematics solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicsMatrices {
    pub jacobian: Matrix,
    pub inverse: Matrix,
}

impl KinematicsMatrices {
    pub const ZERO: Self = Self {
        jacobian: [[0.0; JOINT_COUNT]; JOINT_COUNT],
        inverse: [[0.0; JOINT_COUNT]; JOINT_COUNT],
    };
}

/// Backing storage handed to [`StaticKinematics`].
pub type KinematicsStorage = StaticCell<KinematicsMatrices>;

/// [`KinematicsSolver`] backed by statically allocated matrices.
pub struct StaticKinematics {
    cell: &'static KinematicsStorage,
    matrices: Option<&'static mut KinematicsMatrices>,
    initializations: u32,
}

impl StaticKinematics {
    pub const fn new(cell: &'static KinematicsStorage) -> Self {
        Self {
            cell,
            matrices: None,
            initializations: 0,
        }
    }

    /// Matrices claimed by the last successful initialization.
    pub fn matrices(&self) -> Option<&KinematicsMatrices> {
        self.matrices.as_deref()
    }

    pub const fn initializations(&self) -> u32 {
        self.initializations
    }
}

impl KinematicsSolver for StaticKinematics {
    fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
        let first = match self.matrices.as_deref_mut() {
            Some(matrices) => {
                *matrices = KinematicsMatrices::ZERO;
                false
            }
            None => {
                let matrices = self
                    .cell
                    .try_init(KinematicsMatrices::ZERO)
                    .ok_or(AllocationError::StorageUnavailable)?;
                self.matrices = Some(matrices);
                true
            }
        };

        self.initializations = self.initializations.wrapping_add(1);
        diagnostics::log_kinematics_init(self.initializations, first);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_storage_once_then_zeroes_in_place() {
        static STORAGE: KinematicsStorage = StaticCell::new();
        let mut solver = StaticKinematics::new(&STORAGE);
        assert!(solver.matrices().is_none());

        solver.initialize_matrices().unwrap();
        if let Some(matrices) = solver.matrices.as_deref_mut() {
            matrices.jacobian[1][1] = 4.0;
        }

        solver.initialize_matrices().unwrap();
        assert_eq!(solver.matrices(), Some(&KinematicsMatrices::ZERO));
        assert_eq!(solver.initializations(), 2);
    }

    #[test]
    fn claimed_storage_reports_allocation_failure() {
        static STORAGE: KinematicsStorage = StaticCell::new();
        let _other_owner = STORAGE.init(KinematicsMatrices::ZERO);

        let mut solver = StaticKinematics::new(&STORAGE);
        assert_eq!(
            solver.initialize_matrices(),
            Err(AllocationError::StorageUnavailable)
        );
        assert_eq!(solver.initializations(), 0);
    }
}
