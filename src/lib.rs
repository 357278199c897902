//! Control plane for a PgBouncer connection pool.
//!
//! Reconciles backend advertisements and client requests published through
//! a distributed configuration store into provisioned PostgreSQL users and
//! databases, a regenerated `pgbouncer.ini`, and connection details handed
//! back to every client.

pub mod bouncer;
pub mod config;
pub mod connstr;
pub mod console;
pub mod credentials;
pub mod files;
pub mod logging;
pub mod naming;
pub mod peers;
pub mod provision;
pub mod publish;
pub mod reconcile;
pub mod service;
pub mod topology;
