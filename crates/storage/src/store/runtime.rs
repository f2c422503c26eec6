#![forbid(unsafe_code)]

//! Id, clock and random source of one store handle.
//!
//! State is read from `internal_runtime` on first use and written back when
//! the surrounding transaction commits. In deterministic mode every value is
//! derived from `(seed, sequence)`, so two stores seeded alike and driven
//! through the same operations produce identical ids and timestamps.

use super::{StoreError, seed_from_sql, seed_to_sql};
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

const DETERMINISTIC_ID_PREFIX: &str = "01920000-0000-7000-8000-";
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Default)]
pub(super) struct Runtime {
    state: Option<RuntimeState>,
    dirty: bool,
    last_wall_ms: i128,
}

#[derive(Clone, Copy, Debug)]
struct RuntimeState {
    deterministic: bool,
    seed: u64,
    sequence: u64,
}

impl Runtime {
    fn state(&mut self, conn: &Connection) -> Result<&mut RuntimeState, StoreError> {
        if self.state.is_none() {
            let (deterministic, seed, sequence) = conn.query_row(
                "SELECT deterministic, seed, sequence FROM internal_runtime WHERE singleton=1",
                [],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?;
            self.state = Some(RuntimeState {
                deterministic,
                seed: seed_from_sql(seed),
                sequence: u64::try_from(sequence)
                    .map_err(|_| StoreError::InvalidInput("runtime sequence is negative"))?,
            });
        }
        match self.state.as_mut() {
            Some(state) => Ok(state),
            None => Err(StoreError::InvalidInput("runtime state unavailable")),
        }
    }

    /// Draws the next sequence number.
    fn advance(&mut self, conn: &Connection) -> Result<(bool, u64, u64), StoreError> {
        let state = self.state(conn)?;
        let sequence = state.sequence;
        state.sequence += 1;
        let snapshot = (state.deterministic, state.seed, sequence);
        self.dirty = true;
        Ok(snapshot)
    }

    pub(super) fn is_deterministic(&mut self, conn: &Connection) -> Result<bool, StoreError> {
        Ok(self.state(conn)?.deterministic)
    }

    pub(super) fn enable_deterministic(
        &mut self,
        conn: &Connection,
        seed: u64,
    ) -> Result<(), StoreError> {
        let state = self.state(conn)?;
        state.deterministic = true;
        state.seed = seed;
        self.dirty = true;
        Ok(())
    }

    pub(super) fn next_id(&mut self, conn: &Connection) -> Result<String, StoreError> {
        let (deterministic, seed, sequence) = self.advance(conn)?;
        if deterministic {
            return Ok(format!("{DETERMINISTIC_ID_PREFIX}{:012x}", sequence & 0xFFFF_FFFF_FFFF));
        }

        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(seed.to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        Ok(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    /// UTC timestamp with millisecond precision and a fixed width, so text
    /// order equals time order.
    pub(super) fn now(&mut self, conn: &Connection) -> Result<String, StoreError> {
        let (deterministic, _, sequence) = self.advance(conn)?;
        let millis = if deterministic {
            i128::from(sequence)
        } else {
            // Never hand out the same or an earlier instant twice per handle.
            let wall = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
            let millis = wall.max(self.last_wall_ms + 1);
            self.last_wall_ms = millis;
            millis
        };
        format_timestamp(millis)
    }

    pub(super) fn next_random(&mut self, conn: &Connection) -> Result<u64, StoreError> {
        let (deterministic, seed, sequence) = self.advance(conn)?;
        if deterministic {
            return Ok(splitmix64(
                seed.wrapping_add(sequence.wrapping_mul(GOLDEN_GAMMA)),
            ));
        }
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Ok(splitmix64((nanos as u64) ^ sequence.wrapping_mul(GOLDEN_GAMMA)))
    }

    pub(super) fn flush(&mut self, conn: &Connection) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let Some(state) = self.state else {
            return Ok(());
        };
        let sequence = i64::try_from(state.sequence)
            .map_err(|_| StoreError::InvalidInput("runtime sequence overflow"))?;
        conn.execute(
            "UPDATE internal_runtime SET deterministic=?1, seed=?2, sequence=?3 WHERE singleton=1",
            params![state.deterministic, seed_to_sql(state.seed), sequence],
        )?;
        self.dirty = false;
        Ok(())
    }

    /// Forgets unflushed state; the next use reloads the persisted row.
    pub(super) fn reset(&mut self) {
        self.state = None;
        self.dirty = false;
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn format_timestamp(unix_millis: i128) -> Result<String, StoreError> {
    let at = OffsetDateTime::from_unix_timestamp_nanos(unix_millis * 1_000_000)
        .map_err(|_| StoreError::InvalidInput("timestamp out of range"))?;
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.millisecond()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_have_fixed_width() {
        assert_eq!(
            format_timestamp(0).expect("epoch"),
            "1970-01-01T00:00:00.000Z"
        );
        assert_eq!(
            format_timestamp(1_001).expect("one second"),
            "1970-01-01T00:00:01.001Z"
        );
    }

    #[test]
    fn splitmix_is_stable() {
        assert_eq!(splitmix64(0), splitmix64(0));
        assert_ne!(splitmix64(0), splitmix64(1));
    }
}
