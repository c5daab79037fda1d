//! Connection pool: N pooled connections to the broker plus a health sweep
//!
//! Reconnection is a flat-interval poll: every sweep re-dials each inactive
//! slot, with no backoff and no limit on consecutive failures. Per-slot
//! failures are reported as events and never fail the pool.

use std::sync::Arc;

use lt_tunnel_common::{Result, TunnelDescriptor, TunnelError};
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::{LocalTarget, PoolConfig},
    connection::{PooledConnection, ProxyContext, SlotState},
    events::EventSender,
};

struct PoolState {
    slots: Vec<Arc<PooledConnection>>,
    closed: bool,
}

/// Owns the pooled connections of one tunnel
pub struct ConnectionPool {
    descriptor: TunnelDescriptor,
    local: LocalTarget,
    config: PoolConfig,
    events: EventSender,
    cancel: CancellationToken,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub(crate) fn new(
        descriptor: TunnelDescriptor,
        local: LocalTarget,
        config: PoolConfig,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            local,
            config,
            events,
            cancel,
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Number of slots the pool opens
    pub fn target_size(&self) -> usize {
        self.descriptor.pool_size(self.config.default_max_connections)
    }

    /// Resolve the broker endpoint, dial every slot and start the health sweep.
    ///
    /// Fails with [`TunnelError::InvalidEndpoint`] when the descriptor's URL
    /// has no usable host. Calling it again on a started pool is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let endpoint = self.descriptor.endpoint()?;
        let size = self.target_size();

        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TunnelError::SessionClosed);
            }
            if !state.slots.is_empty() {
                return Ok(());
            }

            info!(
                "Opening {} connections to broker {}",
                size,
                endpoint.address()
            );

            let ctx = Arc::new(ProxyContext::new(
                endpoint,
                self.local.clone(),
                &self.config,
                self.events.clone(),
            ));
            for id in 0..size {
                let slot = Arc::new(PooledConnection::new(
                    id,
                    ctx.clone(),
                    self.cancel.child_token(),
                ));
                tokio::spawn(slot.clone().connect());
                state.slots.push(slot);
            }
        }

        tokio::spawn(self.clone().maintain_connections());
        Ok(())
    }

    /// Health sweep loop; closes the pool once its token is cancelled
    async fn maintain_connections(self: Arc<Self>) {
        let period = self.config.health_check_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_connections();
                }
            }
        }

        debug!("Health sweep exiting");
        self.close();
    }

    /// Re-dial every slot that is neither active nor dialing.
    /// Returns how many dials were launched.
    pub fn check_connections(&self) -> usize {
        let state = self.state.lock();
        if state.closed || self.cancel.is_cancelled() {
            return 0;
        }

        let mut relaunched = 0;
        for slot in state
            .slots
            .iter()
            .filter(|slot| matches!(slot.state(), SlotState::Idle | SlotState::Closed))
        {
            tokio::spawn(slot.clone().connect());
            relaunched += 1;
        }

        if relaunched > 0 {
            debug!(
                "Health sweep: re-dialing {} of {} connections",
                relaunched,
                state.slots.len()
            );
        }
        relaunched
    }

    /// Close every slot and stop the health sweep. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.closed = true;
        self.cancel.cancel();
        for slot in &state.slots {
            slot.close();
        }

        info!("Connection pool closed ({} connections)", state.slots.len());
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of slots created by `start`
    pub fn size(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of slots currently carrying a broker connection
    pub fn active_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.is_active())
            .count()
    }
}
