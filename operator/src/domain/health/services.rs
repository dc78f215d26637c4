use chrono::Utc;

use crate::domain::{
    common::services::Service,
    credential::ports::SecretRepository,
    database::ports::ProvisioningRepository,
    health::{entities::ProbeReport, ports::HealthService},
};

impl<P, S> HealthService for Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    fn probes(&self) -> ProbeReport {
        ProbeReport {
            now: Utc::now(),
            random: rand::random(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::{common::testing::TestServiceBuilder, health::ports::HealthService};

    #[test]
    fn test_probes_report_current_time() {
        let service = TestServiceBuilder::new().build();
        let before = Utc::now();

        let report = service.probes();

        assert!(report.now >= before);
        assert!((0.0..1.0).contains(&report.random));
    }
}
