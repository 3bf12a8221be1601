use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};
use crate::{FdrError, FdrResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Available dense linear-system backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Gauss,
    #[default]
    Faer,
}

impl FromStr for SolverKind {
    type Err = FdrError;

    fn from_str(input: &str) -> FdrResult<Self> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" => Ok(SolverKind::Gauss),
            "faer" | "default" => Ok(SolverKind::Faer),
            other => Err(FdrError::Config(format!(
                "unknown linear solver '{}'; supported values: {}",
                other,
                SolverKind::available().join(", ")
            ))),
        }
    }
}

impl SolverKind {
    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_kind_parsing_supports_all_engines() {
        assert_eq!("gauss".parse::<SolverKind>().unwrap(), SolverKind::Gauss);
        assert_eq!("FAER".parse::<SolverKind>().unwrap(), SolverKind::Faer);
        assert!(matches!(
            "unknown".parse::<SolverKind>(),
            Err(FdrError::Config(_))
        ));
    }

    #[test]
    fn solver_backend_options_solve_diagonal_system() {
        let matrix = vec![vec![2.0, 0.0], vec![0.0, 3.0]];
        let rhs = vec![4.0, 6.0];

        for kind in [SolverKind::Gauss, SolverKind::Faer] {
            let x = kind.build_solver().solve(&matrix, &rhs).unwrap();
            assert!((x[0] - 2.0).abs() < 1e-12, "{}", kind.as_str());
            assert!((x[1] - 2.0).abs() < 1e-12, "{}", kind.as_str());
        }
    }

    #[test]
    fn backends_agree_on_dense_system() {
        let matrix = vec![
            vec![4.0, -1.0, 0.5],
            vec![-1.0, 3.0, -0.5],
            vec![0.5, -0.5, 2.0],
        ];
        let rhs = vec![1.0, 2.0, 3.0];

        let gauss = GaussSolver.solve(&matrix, &rhs).unwrap();
        let faer = FaerSolver.solve(&matrix, &rhs).unwrap();
        for (g, f) in gauss.iter().zip(&faer) {
            assert!((g - f).abs() < 1e-10);
        }
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let matrix = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let rhs = vec![1.0, 1.0];
        assert!(GaussSolver.solve(&matrix, &rhs).is_err());
    }

    #[test]
    fn mismatched_rhs_is_rejected() {
        let matrix = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(FaerSolver.solve(&matrix, &[1.0]).is_err());
    }
}
