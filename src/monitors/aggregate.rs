use crate::models::{ApplicationStatus, ServerStatus};

/// Derived status of an application plus a human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub status: ApplicationStatus,
    pub message: String,
}

impl Aggregate {
    /// Roll member server statuses up into an application status.
    ///
    /// Rules, in order: no members is `unknown`, all online is `online`, all
    /// offline is `offline`, anything else is `partial`. Only `online` members
    /// count toward the numerator of the partial message; `error` and
    /// `unknown` members still count toward the total.
    pub fn evaluate(statuses: &[ServerStatus]) -> Aggregate {
        if statuses.is_empty() {
            return Aggregate {
                status: ApplicationStatus::Unknown,
                message: "no servers associated".to_string(),
            };
        }

        let total = statuses.len();
        let online = statuses
            .iter()
            .filter(|status| **status == ServerStatus::Online)
            .count();

        if online == total {
            return Aggregate {
                status: ApplicationStatus::Online,
                message: "all servers online".to_string(),
            };
        }

        if statuses.iter().all(|status| *status == ServerStatus::Offline) {
            return Aggregate {
                status: ApplicationStatus::Offline,
                message: "all servers offline".to_string(),
            };
        }

        Aggregate {
            status: ApplicationStatus::Partial,
            message: format!("{online}/{total} servers online"),
        }
    }
}
