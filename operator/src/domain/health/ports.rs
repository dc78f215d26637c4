use crate::domain::health::entities::ProbeReport;

#[cfg_attr(test, mockall::automock)]
pub trait HealthService: Send + Sync {
    fn probes(&self) -> ProbeReport;
}
