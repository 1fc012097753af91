//! Resource limits for sandboxed module execution.
//!
//! Limits keep runaway module code from pinning a render session: a
//! wall-clock timeout bounds every execution, and optional recursion and
//! loop-iteration limits abort pathological scripts from inside the engine.

use std::time::Duration;

/// Execution bounds applied to every module run in a render session's
/// sandbox.
///
/// Memory limiting is not supported by the embedded engine; CPU-shaped
/// limits are what is enforced.
///
/// # Example
///
/// ```
/// use weft_core::ResourceLimits;
/// use std::time::Duration;
///
/// let limits = ResourceLimits::new()
///     .with_execution_timeout(Duration::from_secs(5))
///     .with_loop_iteration_limit(10_000_000);
/// assert!(limits.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLimits {
    /// Maximum wall-clock time for one module execution.
    pub execution_timeout: Duration,
    /// Maximum call depth inside the engine, if set.
    pub recursion_limit: Option<usize>,
    /// Maximum iterations of any single loop inside the engine, if set.
    pub loop_iteration_limit: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            // 30 seconds: generous for legitimate module initialization
            // while still bounding indefinite hangs.
            execution_timeout: Duration::from_secs(30),
            recursion_limit: None,
            loop_iteration_limit: None,
        }
    }
}

impl ResourceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum wall-clock time for one module execution.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Sets the engine-level recursion limit.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    /// Sets the engine-level loop iteration limit.
    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = Some(limit);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the timeout is zero or longer
    /// than one hour, or if an optional limit is set to zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.execution_timeout.is_zero() {
            return Err("execution timeout must be greater than zero".to_string());
        }

        if self.execution_timeout.as_secs() > 3600 {
            return Err(format!(
                "execution timeout must be <= 1 hour (got {} seconds)",
                self.execution_timeout.as_secs()
            ));
        }

        if self.recursion_limit == Some(0) {
            return Err("recursion limit must be greater than zero".to_string());
        }

        if self.loop_iteration_limit == Some(0) {
            return Err("loop iteration limit must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.execution_timeout.as_secs(), 30);
        assert!(limits.recursion_limit.is_none());
        assert!(limits.loop_iteration_limit.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let limits = ResourceLimits::new()
            .with_execution_timeout(Duration::from_millis(5500))
            .with_recursion_limit(256)
            .with_loop_iteration_limit(1_000_000);

        assert_eq!(limits.execution_timeout.as_millis(), 5500);
        assert_eq!(limits.recursion_limit, Some(256));
        assert_eq!(limits.loop_iteration_limit, Some(1_000_000));
    }

    #[test]
    fn test_validate_default() {
        assert!(ResourceLimits::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let limits = ResourceLimits::new().with_execution_timeout(Duration::ZERO);
        let err = limits.validate().unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn test_validate_excessive_timeout_fails() {
        let limits = ResourceLimits::new().with_execution_timeout(Duration::from_secs(7200));
        let err = limits.validate().unwrap_err();
        assert!(err.contains("1 hour"));
    }

    #[test]
    fn test_validate_zero_recursion_limit_fails() {
        let limits = ResourceLimits::new().with_recursion_limit(0);
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_validate_zero_loop_limit_fails() {
        let limits = ResourceLimits::new().with_loop_iteration_limit(0);
        assert!(limits.validate().is_err());
    }
}
