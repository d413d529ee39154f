//! Transient-conflict code tables per service family
//!
//! Each table lists the codes a service uses for "another operation is in
//! progress" and the statuses it reports them with. `CBC.99003651` is the
//! billing system's own conflict, raised by any service that places orders.

use stratus_cloud::RetryPolicy;

/// Billing: "another operation is being performed on the subscription"
pub const BILLING_CONFLICT: &str = "CBC.99003651";

const DCS_CODES: [&str; 13] = [
    "DCS.4026", "DCS.4049", "DCS.4096", "DCS.4097", "DCS.4111", "DCS.4113", "DCS.4114", "DCS.4115",
    "DCS.4116", "DCS.4117", "DCS.4118", "DCS.4120", "DCS.4975",
];

/// Distributed Cache Service (Redis/Memcached)
pub fn dcs() -> RetryPolicy {
    RetryPolicy::new("dcs", DCS_CODES.into_iter().chain([BILLING_CONFLICT])).on_statuses(&[400])
}

/// DMS for Kafka
pub fn dms_kafka() -> RetryPolicy {
    RetryPolicy::new("dms-kafka", ["DMS.00400026", BILLING_CONFLICT]).on_statuses(&[400])
}

/// GeminiDB (Cassandra, Redis, Influx) and other GaussDB NoSQL engines
pub fn geminidb() -> RetryPolicy {
    RetryPolicy::new("geminidb", ["DBS.200019"]).on_statuses(&[403])
}

/// GaussDB for MySQL
pub fn gaussdb_mysql() -> RetryPolicy {
    RetryPolicy::new("gaussdb-mysql", ["DBS.200019", BILLING_CONFLICT])
        .on_statuses(&[400, 403, 409])
}

/// Workspace desktops and desktop pools
pub fn workspace() -> RetryPolicy {
    RetryPolicy::new("workspace", ["WKS.00010032"]).on_statuses(&[409])
}

/// Elastic Volume Service
pub fn evs() -> RetryPolicy {
    RetryPolicy::new("evs", ["EVS.2409", BILLING_CONFLICT]).on_statuses(&[400, 409])
}
