//! Parameters of one allocation call.

use super::AllocationError;

/// What the caller wants: `run_count` parallel runs of `cores_per_run` cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    /// Cores per run
    pub cores_per_run: usize,
    /// Number of parallel runs
    pub run_count: usize,
    /// Whether hyperthreading siblings may be handed to runs
    pub use_hyperthreading: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            cores_per_run: 1,
            run_count: 1,
            use_hyperthreading: true,
        }
    }
}

impl RunRequest {
    /// Creates a new request builder.
    #[must_use]
    pub fn builder() -> RunRequestBuilder {
        RunRequestBuilder::default()
    }

    /// Total number of cores the request needs.
    #[must_use]
    pub fn total_cores(&self) -> usize {
        self.cores_per_run.saturating_mul(self.run_count)
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::InvalidRequest`] if a count is zero.
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.cores_per_run == 0 {
            return Err(AllocationError::InvalidRequest(
                "cores_per_run must be > 0".to_string(),
            ));
        }
        if self.run_count == 0 {
            return Err(AllocationError::InvalidRequest(
                "run_count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for `RunRequest`.
#[derive(Debug, Default)]
pub struct RunRequestBuilder {
    cores_per_run: Option<usize>,
    run_count: Option<usize>,
    use_hyperthreading: Option<bool>,
}

impl RunRequestBuilder {
    /// Sets the number of cores per run.
    #[must_use]
    pub fn cores_per_run(mut self, n: usize) -> Self {
        self.cores_per_run = Some(n);
        self
    }

    /// Sets the number of parallel runs.
    #[must_use]
    pub fn run_count(mut self, n: usize) -> Self {
        self.run_count = Some(n);
        self
    }

    /// Allows or forbids handing hyperthreading siblings to runs.
    #[must_use]
    pub fn use_hyperthreading(mut self, enabled: bool) -> Self {
        self.use_hyperthreading = Some(enabled);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid.
    pub fn build(self) -> Result<RunRequest, AllocationError> {
        let default = RunRequest::default();
        let request = RunRequest {
            cores_per_run: self.cores_per_run.unwrap_or(default.cores_per_run),
            run_count: self.run_count.unwrap_or(default.run_count),
            use_hyperthreading: self.use_hyperthreading.unwrap_or(default.use_hyperthreading),
        };
        request.validate()?;
        Ok(request)
    }
}
