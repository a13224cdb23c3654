//! Ownership protocol
//!
//! Single-writer election over a one-row table. Acquisition runs in an
//! IMMEDIATE transaction so two candidates racing over an empty row cannot
//! both elect themselves. A populated row is only stolen when its heartbeat
//! is stale, unparseable, or its process is provably gone.

use crate::core::config::OWNER_STALE_AFTER_SECS;
use crate::core::error::Result;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRole {
    Owner,
    Reader,
}

pub struct AcquireOptions<'a> {
    pub now: DateTime<Utc>,
    pub is_alive: &'a dyn Fn(i64) -> bool,
    pub stale_after: Duration,
}

impl<'a> AcquireOptions<'a> {
    pub fn new(is_alive: &'a dyn Fn(i64) -> bool) -> Self {
        Self {
            now: Utc::now(),
            is_alive,
            stale_after: Duration::from_secs(OWNER_STALE_AFTER_SECS),
        }
    }
}

/// Elect this process owner or reader.
pub fn acquire(store: &mut Store, pid: i64, options: &AcquireOptions) -> Result<OwnerRole> {
    let tx = store.immediate_transaction()?;

    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT pid, heartbeat_at FROM watcher_owner WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let role = match existing {
        None => {
            tx.execute(
                "INSERT INTO watcher_owner (id, pid, heartbeat_at) VALUES (1, ?1, ?2)",
                params![pid, options.now.to_rfc3339()],
            )?;
            info!("Acquired index ownership (pid {})", pid);
            OwnerRole::Owner
        }
        Some((existing_pid, heartbeat_at)) => {
            if should_takeover(existing_pid, &heartbeat_at, options) {
                tx.execute(
                    "INSERT OR REPLACE INTO watcher_owner (id, pid, heartbeat_at) VALUES (1, ?1, ?2)",
                    params![pid, options.now.to_rfc3339()],
                )?;
                info!(
                    "Took over index ownership from pid {} (pid {})",
                    existing_pid, pid
                );
                OwnerRole::Owner
            } else {
                debug!("Owner pid {} is live; running as reader", existing_pid);
                OwnerRole::Reader
            }
        }
    };

    tx.commit()?;
    Ok(role)
}

/// Acquire with wall-clock time and the default process probe.
pub fn acquire_default(store: &mut Store, pid: i64) -> Result<OwnerRole> {
    acquire(store, pid, &AcquireOptions::new(&probe_process))
}

fn should_takeover(existing_pid: i64, heartbeat_at: &str, options: &AcquireOptions) -> bool {
    let heartbeat = match DateTime::parse_from_rfc3339(heartbeat_at) {
        Ok(ts) => ts.with_timezone(&Utc),
        // Unparseable heartbeat is treated as stale
        Err(_) => return true,
    };

    let age_ms = options
        .now
        .signed_duration_since(heartbeat)
        .num_milliseconds();
    if age_ms >= options.stale_after.as_millis() as i64 {
        return true;
    }

    !(options.is_alive)(existing_pid)
}

/// Refresh the heartbeat; a no-op when this pid is not the owner.
pub fn update_heartbeat(conn: &Connection, pid: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE watcher_owner SET heartbeat_at = ?1 WHERE id = 1 AND pid = ?2",
        params![now.to_rfc3339(), pid],
    )?;
    Ok(())
}

/// Drop the lease held by `pid`.
pub fn release(conn: &Connection, pid: i64) -> Result<()> {
    conn.execute("DELETE FROM watcher_owner WHERE id = 1 AND pid = ?1", params![pid])?;
    Ok(())
}

pub fn current_owner(conn: &Connection) -> Result<Option<(i64, String)>> {
    let row = conn
        .query_row(
            "SELECT pid, heartbeat_at FROM watcher_owner WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}

/// Zero-signal process probe. ESRCH means dead; EPERM means alive but not
/// ours; anything else is treated as alive (never steal on doubt).
#[cfg(unix)]
pub fn probe_process(pid: i64) -> bool {
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result == 0 {
        return true;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(code) if code == libc::ESRCH => false,
        Some(code) if code == libc::EPERM => true,
        _ => true,
    }
}

#[cfg(not(unix))]
pub fn probe_process(_pid: i64) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    fn options<'a>(is_alive: &'a dyn Fn(i64) -> bool) -> AcquireOptions<'a> {
        AcquireOptions {
            now: now(),
            is_alive,
            stale_after: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_first_acquire_wins() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;
        assert_eq!(acquire(&mut store, 7, &options(&alive)).unwrap(), OwnerRole::Owner);
        assert_eq!(current_owner(store.conn()).unwrap().unwrap().0, 7);
    }

    #[test]
    fn test_live_owner_is_not_stolen() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;
        acquire(&mut store, 7, &options(&alive)).unwrap();
        assert_eq!(
            acquire(&mut store, 8, &options(&alive)).unwrap(),
            OwnerRole::Reader
        );
        assert_eq!(current_owner(store.conn()).unwrap().unwrap().0, 7);
    }

    #[test]
    fn test_stale_heartbeat_takeover() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;

        // Row planted 200 seconds in the past, beyond the 90s threshold
        let stale = (now() - chrono::Duration::seconds(200)).to_rfc3339();
        store
            .conn()
            .execute(
                "INSERT INTO watcher_owner (id, pid, heartbeat_at) VALUES (1, 7, ?1)",
                params![stale],
            )
            .unwrap();

        assert_eq!(
            acquire(&mut store, 9, &options(&alive)).unwrap(),
            OwnerRole::Owner
        );
        let (pid, heartbeat) = current_owner(store.conn()).unwrap().unwrap();
        assert_eq!(pid, 9);
        assert_eq!(heartbeat, now().to_rfc3339());
    }

    #[test]
    fn test_threshold_boundary_is_stale() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;

        let boundary = (now() - chrono::Duration::seconds(90)).to_rfc3339();
        store
            .conn()
            .execute(
                "INSERT INTO watcher_owner (id, pid, heartbeat_at) VALUES (1, 7, ?1)",
                params![boundary],
            )
            .unwrap();

        assert_eq!(
            acquire(&mut store, 9, &options(&alive)).unwrap(),
            OwnerRole::Owner
        );
    }

    #[test]
    fn test_dead_process_takeover() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;
        acquire(&mut store, 7, &options(&alive)).unwrap();

        let dead = |pid: i64| pid != 7;
        assert_eq!(
            acquire(&mut store, 9, &options(&dead)).unwrap(),
            OwnerRole::Owner
        );
    }

    #[test]
    fn test_unparseable_heartbeat_takeover() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO watcher_owner (id, pid, heartbeat_at) VALUES (1, 7, 'garbage')",
                [],
            )
            .unwrap();
        let alive = |_: i64| true;
        assert_eq!(
            acquire(&mut store, 9, &options(&alive)).unwrap(),
            OwnerRole::Owner
        );
    }

    #[test]
    fn test_heartbeat_only_updates_owner() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;
        acquire(&mut store, 7, &options(&alive)).unwrap();

        let later = now() + chrono::Duration::seconds(30);
        update_heartbeat(store.conn(), 8, later).unwrap();
        assert_eq!(
            current_owner(store.conn()).unwrap().unwrap().1,
            now().to_rfc3339()
        );

        update_heartbeat(store.conn(), 7, later).unwrap();
        assert_eq!(
            current_owner(store.conn()).unwrap().unwrap().1,
            later.to_rfc3339()
        );
    }

    #[test]
    fn test_release() {
        let mut store = Store::open_in_memory().unwrap();
        let alive = |_: i64| true;
        acquire(&mut store, 7, &options(&alive)).unwrap();

        release(store.conn(), 8).unwrap();
        assert!(current_owner(store.conn()).unwrap().is_some());

        release(store.conn(), 7).unwrap();
        assert!(current_owner(store.conn()).unwrap().is_none());
    }
}
