/// Knobs controlling how much self-verification a [`Program`](crate::cps::Program)
/// performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Run the full invariant checker after every successful change and panic
    /// with its report if anything is found. Meant for development and test
    /// builds, the checker walks the whole program each time.
    pub verify_changes: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            verify_changes: cfg!(feature = "verify-changes"),
        }
    }
}

impl ProgramConfig {
    pub fn verified() -> Self {
        Self {
            verify_changes: true,
        }
    }
}
