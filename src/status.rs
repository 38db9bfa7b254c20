use serde::{Deserialize, Serialize};

/// System-wide health severity shared by the bus, the fault registry, and
/// the subsystem health checks.
///
/// The ordering is total and explicit: `Ok < Warning < Error < Critical`.
/// Comparisons like `status < SystemStatus::Warning` rely on the derived
/// `Ord` over the declaration order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemStatus {
    Ok,
    Warning,
    Error,
    Critical,
}

impl SystemStatus {
    pub fn is_nominal(self) -> bool {
        self == SystemStatus::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemStatus::Ok => "OK",
            SystemStatus::Warning => "WARNING",
            SystemStatus::Error => "ERROR",
            SystemStatus::Critical => "CRITICAL",
        }
    }
}

impl core::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
