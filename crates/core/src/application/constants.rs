// Lifecycle constants (no magic values)
use std::time::Duration;

/// Compare-and-swap rounds before a state transition gives up with `Conflict`
pub const DEFAULT_MAX_TRANSITION_ATTEMPTS: usize = 8;

/// Maximum length of domain and collector identifiers
pub const MAX_ID_LEN: usize = 64;

/// Age after which an IN_PROGRESS job is considered stale (6 hours)
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(6 * 60 * 60);

/// Time between stale-job sweeps (10 minutes)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
