//! Dimension checks on network inputs.
use crate::ModelError;

/// Checks that `dims` describes a `(batch_size, width)` matrix and returns the batch size.
pub fn check_matrix(input: &'static str, dims: &[usize], width: usize) -> Result<usize, ModelError> {
    if dims.len() != 2 {
        return Err(ModelError::RankMismatch {
            input,
            expected: 2,
            actual: dims.len(),
        });
    }
    if dims[1] != width {
        return Err(ModelError::DimensionMismatch {
            input,
            axis: 1,
            expected: width,
            actual: dims[1],
        });
    }
    Ok(dims[0])
}

/// Checks that a batch can be normalized with its own statistics.
///
/// In training mode a single sample has zero variance, so at least two are required.
pub fn check_batch_norm(input: &'static str, batch_size: usize, train: bool) -> Result<(), ModelError> {
    if train && batch_size < 2 {
        return Err(ModelError::DegenerateBatch { input, batch_size });
    }
    Ok(())
}

/// Checks that the state and action batches have the same number of rows.
pub fn check_same_batch(state: usize, action: usize) -> Result<usize, ModelError> {
    match state == action {
        true => Ok(state),
        false => Err(ModelError::BatchSizeMismatch { state, action }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_check_matrix() {
        assert_eq!(check_matrix("state", &[8, 4], 4), Ok(8));
        assert_eq!(
            check_matrix("state", &[8, 3], 4),
            Err(ModelError::DimensionMismatch {
                input: "state",
                axis: 1,
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            check_matrix("action", &[4], 4),
            Err(ModelError::RankMismatch {
                input: "action",
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_error_message_names_sizes() {
        let e = check_matrix("state", &[8, 3], 4).unwrap_err();
        let msg = format!("{}", e);
        assert!(msg.contains("state"));
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_check_batch_norm() {
        assert!(check_batch_norm("state", 1, false).is_ok());
        assert!(check_batch_norm("state", 2, true).is_ok());
        assert_eq!(
            check_batch_norm("state", 1, true),
            Err(ModelError::DegenerateBatch {
                input: "state",
                batch_size: 1
            })
        );
    }

    #[test]
    fn test_check_same_batch() {
        assert_eq!(check_same_batch(5, 5), Ok(5));
        assert!(check_same_batch(5, 4).is_err());
    }
}
