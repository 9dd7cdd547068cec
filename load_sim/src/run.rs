//! Play a scenario through the host harness.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::info;
use shared::sim::{HostFault, HostHarness, SimIdentity};
use shared::{LifecycleState, NtStatus};

use crate::scenario::Scenario;

/// What happened to one `[[load]]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub identity: String,
    pub status: NtStatus,
    pub state: LifecycleState,
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub faults: Vec<HostFault>,
    pub live_factories: usize,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Load (and optionally unload) every entry in order.
///
/// Entries naming the same identity are successive load cycles of one image;
/// the previous cycle must have been unloaded.
pub fn run(scenario: &Scenario) -> Result<Report> {
    let mut harness = HostHarness::new();
    let mut ids: BTreeMap<&str, SimIdentity> = BTreeMap::new();
    let mut report = Report::default();

    for spec in &scenario.loads {
        let next = SimIdentity(ids.len() as u32 + 1);
        let id = *ids.entry(spec.identity.as_str()).or_insert(next);

        harness.host().plan(id, spec.fault_plan()?);
        let status = harness
            .load(id)
            .with_context(|| format!("loading {}", spec.identity))?;
        info!("{} ({id}) DriverEntry returned {status}", spec.identity);

        if spec.unload {
            harness
                .unload(id)
                .with_context(|| format!("unloading {}", spec.identity))?;
        }

        report.outcomes.push(Outcome {
            identity: spec.identity.clone(),
            status,
            state: harness.state(id).unwrap_or(LifecycleState::NotLoaded),
        });
    }

    report.faults = harness.host().faults();
    report.live_factories = harness.host().live_factories();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(txt: &str) -> Scenario {
        Scenario::parse(txt).unwrap()
    }

    #[test]
    fn reports_each_outcome_verbatim() {
        let report = run(&scenario(
            r#"
            [[load]]
            identity = "ok"
            unload = false

            [[load]]
            identity = "no-bind"
            bind_status = 0xC0000001

            [[load]]
            identity = "no-factory"
            register_status = 0xC0000002
            unload = false
            "#,
        ))
        .unwrap();

        let got: Vec<_> = report.outcomes.iter().map(|o| (o.status.bits(), o.state)).collect();
        assert_eq!(
            got,
            vec![
                (0, LifecycleState::FactoryRegistered),
                (0xC000_0001, LifecycleState::Unloaded),
                (0xC000_0002, LifecycleState::Failed),
            ]
        );
        assert_eq!(report.live_factories, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn reloading_an_image_reuses_its_identity() {
        let report = run(&scenario(
            r#"
            [[load]]
            identity = "mic0"

            [[load]]
            identity = "mic0"
            "#,
        ))
        .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.status == NtStatus::SUCCESS));
        assert_eq!(report.live_factories, 0);
    }

    #[test]
    fn image_without_unload_routine_can_be_reloaded() {
        let report = run(&scenario(
            r#"
            [[load]]
            identity = "mic0"
            callback_status = 0xC000009A

            [[load]]
            identity = "mic0"
            unload = false
            "#,
        ))
        .unwrap();

        let got: Vec<_> = report.outcomes.iter().map(|o| (o.status, o.state)).collect();
        assert_eq!(
            got,
            vec![
                (NtStatus::INSUFFICIENT_RESOURCES, LifecycleState::Unloaded),
                (NtStatus::SUCCESS, LifecycleState::FactoryRegistered),
            ]
        );
        assert!(report.is_clean());
    }

    #[test]
    fn loading_a_live_image_twice_is_refused() {
        let err = run(&scenario(
            r#"
            [[load]]
            identity = "mic0"
            unload = false

            [[load]]
            identity = "mic0"
            "#,
        ))
        .unwrap_err();

        assert!(format!("{err:#}").contains("already has a load cycle"));
    }
}
