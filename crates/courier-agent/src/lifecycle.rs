// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! App lifecycle and shutdown coordination.
//!
//! The host application owns process-lifecycle plumbing; the agent only
//! needs to hear about foreground/background transitions (background
//! meaning "about to be suspended") and an eventual shutdown. The
//! notifier fans both signals out to agent-internal subscribers over
//! broadcast channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// App Phase
// =============================================================================

/// The host application's execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    /// The app is active; the process is expected to stay alive.
    Foreground,
    /// The app is about to be suspended; deliver what we can now.
    Background,
}

// =============================================================================
// Lifecycle Notifier
// =============================================================================

/// Fans lifecycle transitions out to agent components.
///
/// # Example
///
/// ```ignore
/// use courier_agent::{AppPhase, LifecycleNotifier};
///
/// let lifecycle = LifecycleNotifier::new();
/// let mut phases = lifecycle.subscribe_phases();
///
/// tokio::spawn(async move {
///     while let Ok(phase) = phases.recv().await {
///         if phase == AppPhase::Background {
///             // flush before suspension
///         }
///     }
/// });
///
/// lifecycle.notify_phase(AppPhase::Background);
/// ```
#[derive(Clone)]
pub struct LifecycleNotifier {
    phase_tx: broadcast::Sender<AppPhase>,
    shutdown_tx: broadcast::Sender<()>,
    in_background: Arc<AtomicBool>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl LifecycleNotifier {
    /// Creates a notifier starting in the foreground phase.
    pub fn new() -> Self {
        let (phase_tx, _) = broadcast::channel(8);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            phase_tx,
            shutdown_tx,
            in_background: Arc::new(AtomicBool::new(false)),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to phase transitions.
    pub fn subscribe_phases(&self) -> broadcast::Receiver<AppPhase> {
        self.phase_tx.subscribe()
    }

    /// Reports a phase transition from the host application.
    ///
    /// Repeating the current phase is a no-op; only actual transitions are
    /// broadcast.
    pub fn notify_phase(&self, phase: AppPhase) {
        let entering_background = phase == AppPhase::Background;
        let was_background = self
            .in_background
            .swap(entering_background, Ordering::SeqCst);
        if was_background == entering_background {
            return;
        }

        info!(phase = ?phase, "App phase transition");
        let _ = self.phase_tx.send(phase);
    }

    /// Returns the current phase.
    pub fn current_phase(&self) -> AppPhase {
        if self.in_background.load(Ordering::SeqCst) {
            AppPhase::Background
        } else {
            AppPhase::Foreground
        }
    }

    /// Subscribes to the shutdown notification.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiates shutdown exactly once; later calls are no-ops.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.shutdown_tx.send(());
        }
    }

    /// Returns true once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits until shutdown is initiated.
    pub async fn wait_for_shutdown(&self) {
        if self.is_shutdown_initiated() {
            return;
        }
        let mut rx = self.subscribe_shutdown();
        // A send racing the subscription above is caught by the flag.
        if self.is_shutdown_initiated() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for LifecycleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phase_transitions_broadcast_once() {
        let lifecycle = LifecycleNotifier::new();
        let mut rx = lifecycle.subscribe_phases();

        lifecycle.notify_phase(AppPhase::Background);
        // Repeating the same phase is not rebroadcast.
        lifecycle.notify_phase(AppPhase::Background);
        lifecycle.notify_phase(AppPhase::Foreground);

        assert_eq!(rx.recv().await.unwrap(), AppPhase::Background);
        assert_eq!(rx.recv().await.unwrap(), AppPhase::Foreground);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_current_phase_tracks_transitions() {
        let lifecycle = LifecycleNotifier::new();
        assert_eq!(lifecycle.current_phase(), AppPhase::Foreground);

        lifecycle.notify_phase(AppPhase::Background);
        assert_eq!(lifecycle.current_phase(), AppPhase::Background);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let lifecycle = LifecycleNotifier::new();
        assert!(!lifecycle.is_shutdown_initiated());

        lifecycle.initiate_shutdown();
        lifecycle.initiate_shutdown();
        assert!(lifecycle.is_shutdown_initiated());

        // wait_for_shutdown returns immediately once initiated.
        lifecycle.wait_for_shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_wakes_waiter() {
        let lifecycle = LifecycleNotifier::new();
        let waiter = lifecycle.clone();

        let handle = tokio::spawn(async move {
            waiter.wait_for_shutdown().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        lifecycle.initiate_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
