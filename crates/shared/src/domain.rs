use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ProfileId);
id_newtype!(StoreId);
id_newtype!(AppId);
id_newtype!(ProcessId);

/// Lifecycle of a provisioned store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    Created,
    Starting,
    Available,
    Lost,
    Error,
}

impl StoreStatus {
    /// CREATED and STARTING stores are still being brought up by the manager.
    pub fn is_provisioning(self) -> bool {
        matches!(self, Self::Created | Self::Starting)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_provisioning()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Starting => "STARTING",
            Self::Available => "AVAILABLE",
            Self::Lost => "LOST",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status the manager keeps on an application record. Not the same set as
/// [`StoreStatus`]: a running store app is STARTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Created,
    Started,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Created,
    Pending,
    TaskAssigned,
    TaskRunning,
    Suspended,
    Completed,
    Failed,
    RolledBack,
}

impl ProcessStatus {
    /// The only status a command controller keeps polling on.
    pub fn is_task_running(self) -> bool {
        self == Self::TaskRunning
    }

    /// Manager-side notion of a process that has not finished yet.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Created | Self::Pending | Self::TaskAssigned | Self::TaskRunning | Self::Suspended
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::TaskAssigned => "TASK_ASSIGNED",
            Self::TaskRunning => "TASK_RUNNING",
            Self::Suspended => "SUSPENDED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
