//! Default values shared between the template builder and its callers
//!
//! These constants ensure consistent defaults across all farmstack components.

/// CloudFormation template format version emitted by the serializer
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Consecutive successful health checks before an instance is InService
pub const HEALTH_CHECK_HEALTHY_THRESHOLD: u32 = 3;

/// Consecutive failed health checks before an instance is OutOfService
pub const HEALTH_CHECK_UNHEALTHY_THRESHOLD: u32 = 5;

/// Seconds between load-balancer health checks
pub const HEALTH_CHECK_INTERVAL_SECS: u32 = 30;

/// Seconds before a single health check attempt times out
pub const HEALTH_CHECK_TIMEOUT_SECS: u32 = 5;

/// Seconds a wait condition waits for bootstrap signals before failing the stack
pub const WAIT_CONDITION_TIMEOUT_SECS: u32 = 1800;

/// Emit intervals (minutes) accepted by the load-balancer access-log policy
pub const ACCESS_LOG_EMIT_INTERVALS: &[u32] = &[5, 60];
