//! Process exit codes.
//!
//! A denial is a normal outcome with its own code so that scripts can tell
//! "the policy said no" apart from "something went wrong".

/// Successful operation, including an authorized transfer.
pub const EXIT_SUCCESS: i32 = 0;

/// The policy denied the transfer.
///
/// Covers a missing policy, a closed window, an exceeded ceiling, and an
/// asset mismatch.
pub const EXIT_POLICY_DENIED: i32 = 1;

/// General error (configuration, I/O, invalid input, broken audit chain).
pub const EXIT_ERROR: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_POLICY_DENIED);
        assert_ne!(EXIT_SUCCESS, EXIT_ERROR);
        assert_ne!(EXIT_POLICY_DENIED, EXIT_ERROR);
    }
}
