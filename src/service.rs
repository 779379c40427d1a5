//! DHCP service status.
//!
//! The journal only reflects what the daemon last wrote. If the daemon is
//! stopped, leases recorded as active may have lapsed long ago, so queries
//! warn about stale data instead of failing.

use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::query::{Notice, Report};

/// Answers whether a system service is currently running.
pub trait ServiceStatus {
    fn is_running(&self, service: &str) -> impl Future<Output = bool> + Send;
}

/// Asks systemd through `systemctl is-active`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl ServiceStatus for Systemctl {
    async fn is_running(&self, service: &str) -> bool {
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet", service])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(error) => {
                debug!("Could not run systemctl for {}: {}", service, error);
                false
            }
        }
    }
}

/// Adds a [`Notice::ServiceStopped`] to `report` if `service` is not running.
pub async fn check_service<T>(
    status: &impl ServiceStatus,
    service: &str,
    report: Report<T>,
) -> Report<T> {
    if status.is_running(service).await {
        report
    } else {
        report.with_notice(Notice::ServiceStopped(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStatus(bool);

    impl ServiceStatus for FixedStatus {
        async fn is_running(&self, _service: &str) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn test_running_service_adds_no_notice() {
        let report = check_service(&FixedStatus(true), "dhcpd", Report::new(vec![1, 2])).await;
        assert!(report.notices.is_empty());
        assert_eq!(report.rows, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_stopped_service_adds_warning() {
        let report = check_service(&FixedStatus(false), "dhcpd", Report::new(vec![1])).await;
        assert_eq!(report.rows, vec![1]);
        assert_eq!(
            report.notices,
            vec![Notice::ServiceStopped("dhcpd".to_string())]
        );
        assert!(report.notices[0].to_string().starts_with("WARNING"));
    }

    #[tokio::test]
    async fn test_missing_service_is_not_running() {
        assert!(
            !Systemctl
                .is_running("leasestat-test-no-such.service")
                .await
        );
    }
}
