//! Per-kind readiness
//!
//! Each kind reduces its live object to an [`Observation`]. The observation is
//! then scored against a success factor by [`evaluate`], which is the single
//! place both `status` and `dependency_report` get their numbers from.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::DefinedKind;

/// What a live object says about its own readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Ready as soon as the object exists
    Exists,
    /// All-or-nothing readiness
    Condition { ready: bool, detail: String },
    /// Partial readiness measured in units
    Replicas {
        ready: i32,
        desired: i32,
        unit: &'static str,
    },
    /// Terminal failure; no amount of waiting helps
    Failed(String),
}

/// An observation scored against a success factor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub percentage: u8,
    pub needed: u8,
    pub message: String,
}

impl Evaluation {
    pub fn is_ready(&self) -> bool {
        self.percentage >= self.needed
    }
}

/// Score an observation; `Err` carries the failure message of a failed object
pub fn evaluate(observation: Observation, success_factor: u8) -> Result<Evaluation, String> {
    let needed = success_factor.min(100);
    let (percentage, message) = match observation {
        Observation::Exists => (100, "exists".to_string()),
        Observation::Condition { ready, detail } => (if ready { 100 } else { 0 }, detail),
        Observation::Replicas {
            ready,
            desired,
            unit,
        } => {
            let percentage = replica_percentage(ready, desired);
            (
                percentage,
                format!(
                    "{} of {} {} ready ({}%, needed {}%)",
                    ready.max(0),
                    desired.max(0),
                    unit,
                    percentage,
                    needed
                ),
            )
        }
        Observation::Failed(message) => return Err(message),
    };

    Ok(Evaluation {
        percentage,
        needed,
        message,
    })
}

/// `ready * 100 / desired`, clamped to 0-100; nothing desired means done
///
/// Flooring keeps `percentage >= factor` equivalent to
/// `ready * 100 >= desired * factor`.
fn replica_percentage(ready: i32, desired: i32) -> u8 {
    if desired <= 0 {
        return 100;
    }
    let pct = (i64::from(ready.max(0)) * 100) / i64::from(desired);
    pct.clamp(0, 100) as u8
}

/// Kinds the scheduler can deploy and wait for
pub trait Readiness:
    DefinedKind
    + kube::Resource
    + Serialize
    + DeserializeOwned
    + Clone
    + Send
    + Sync
    + std::fmt::Debug
    + 'static
{
    fn observe(&self) -> Observation;
}

fn condition_is_true<'a>(
    mut conditions: impl Iterator<Item = (&'a str, &'a str)>,
    wanted: &str,
) -> bool {
    conditions.any(|(type_, status)| type_ == wanted && status == "True")
}

impl Readiness for Pod {
    fn observe(&self) -> Observation {
        let Some(status) = &self.status else {
            return Observation::Condition {
                ready: false,
                detail: "pod has no status yet".to_string(),
            };
        };
        let phase = status.phase.as_deref().unwrap_or("Pending");
        let conditions = status.conditions.as_deref().unwrap_or_default();

        match phase {
            "Succeeded" => Observation::Condition {
                ready: true,
                detail: "pod succeeded".to_string(),
            },
            "Failed" => Observation::Failed(
                status
                    .message
                    .clone()
                    .unwrap_or_else(|| "pod phase is Failed".to_string()),
            ),
            "Running" => {
                let ready = condition_is_true(
                    conditions
                        .iter()
                        .map(|c| (c.type_.as_str(), c.status.as_str())),
                    "Ready",
                );
                Observation::Condition {
                    ready,
                    detail: if ready {
                        "pod is running and ready".to_string()
                    } else {
                        "pod is running but not ready".to_string()
                    },
                }
            }
            other => Observation::Condition {
                ready: false,
                detail: format!("pod phase is {}", other),
            },
        }
    }
}

impl Readiness for Job {
    fn observe(&self) -> Observation {
        let status = self.status.as_ref();
        let conditions = status
            .and_then(|s| s.conditions.as_deref())
            .unwrap_or_default();

        if let Some(failed) = conditions
            .iter()
            .find(|c| c.type_ == "Failed" && c.status == "True")
        {
            return Observation::Failed(
                failed
                    .message
                    .clone()
                    .or_else(|| failed.reason.clone())
                    .unwrap_or_else(|| "job failed".to_string()),
            );
        }

        let complete = condition_is_true(
            conditions
                .iter()
                .map(|c| (c.type_.as_str(), c.status.as_str())),
            "Complete",
        );
        let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0);
        Observation::Condition {
            ready: complete,
            detail: if complete {
                "job complete".to_string()
            } else {
                format!("job running, {} pod(s) succeeded", succeeded)
            },
        }
    }
}

impl Readiness for ReplicaSet {
    fn observe(&self) -> Observation {
        Observation::Replicas {
            ready: self
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0),
            desired: self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1),
            unit: "replicas",
        }
    }
}

impl Readiness for StatefulSet {
    fn observe(&self) -> Observation {
        Observation::Replicas {
            ready: self
                .status
                .as_ref()
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0),
            desired: self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1),
            unit: "replicas",
        }
    }
}

impl Readiness for Deployment {
    fn observe(&self) -> Observation {
        Observation::Replicas {
            ready: self
                .status
                .as_ref()
                .and_then(|s| s.available_replicas)
                .unwrap_or(0),
            desired: self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1),
            unit: "replicas",
        }
    }
}

impl Readiness for DaemonSet {
    fn observe(&self) -> Observation {
        // Without a status the controller has not scheduled anything yet, and
        // zero desired would otherwise read as done.
        match &self.status {
            None => Observation::Condition {
                ready: false,
                detail: "daemonset has no status yet".to_string(),
            },
            Some(status) => Observation::Replicas {
                ready: status.number_ready,
                desired: status.desired_number_scheduled,
                unit: "daemon pods",
            },
        }
    }
}

impl Readiness for PersistentVolumeClaim {
    fn observe(&self) -> Observation {
        let phase = self
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Pending");
        match phase {
            "Bound" => Observation::Condition {
                ready: true,
                detail: "claim is bound".to_string(),
            },
            "Lost" => Observation::Failed("claim lost its volume".to_string()),
            other => Observation::Condition {
                ready: false,
                detail: format!("claim phase is {}", other),
            },
        }
    }
}

macro_rules! ready_when_exists {
    ($($kind:ty),* $(,)?) => {
        $(
            impl Readiness for $kind {
                fn observe(&self) -> Observation {
                    Observation::Exists
                }
            }
        )*
    };
}

ready_when_exists!(Service, ConfigMap, Secret, ServiceAccount);
