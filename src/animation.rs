//! Animation / refresh scheduler
//!
//! Animated charts (rotating chord wheels, scrolling ribbons, pulsing bars,
//! breathing mosaics) derive their geometry from a small [`AnimationState`].
//! The state only moves through [`advance`], one step per tick, so animation
//! speed depends on the number of ticks delivered and never on wall-clock
//! time. A late tick still advances exactly one step.
//!
//! The host owns the timer. It feeds ticks through a [`TickHandle`]; the
//! [`Scheduler`] drains them in order and hands each new state to the
//! renderer. `Stop` (chart unmounted) halts the scheduler and any later
//! ticks are ignored.
//!
//! ```text
//! host timer ──Tick──▶ TickHandle ──▶ Scheduler::pump ──▶ advance ──▶ render(state)
//! ```

use crate::layout::chord::ChordLayout;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Suggested tick period for the host timer
    pub period_ms: u64,
    pub scroll_modulus: u64,
    /// Phase advance per tick for pulses and mosaics (radians)
    pub phase_step: f64,
    /// Chord wheel rotation per tick (radians)
    pub rotation_step: f64,
    /// Phase offset between neighbouring pulse bars
    pub pulse_spread: f64,
    pub pulse_gain: f64,
    pub pulse_min_height: f64,
    pub mosaic_col_phase: f64,
    pub mosaic_row_phase: f64,
    pub mosaic_amplitude: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            period_ms: 50,
            scroll_modulus: 1000,
            phase_step: 0.1,
            rotation_step: 0.01,
            pulse_spread: 0.5,
            pulse_gain: 10.0,
            pulse_min_height: 5.0,
            mosaic_col_phase: 0.2,
            mosaic_row_phase: 0.3,
            mosaic_amplitude: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AnimationState {
    /// Ticks applied so far
    pub frame: u64,
    pub scroll: u64,
    /// Chord wheel rotation, kept in [0, 2π)
    pub rotation: f64,
}

/// The state one tick later
pub fn advance(state: AnimationState, config: &AnimationConfig) -> AnimationState {
    let modulus = config.scroll_modulus.max(1);
    AnimationState {
        frame: state.frame.wrapping_add(1),
        scroll: (state.scroll + 1) % modulus,
        rotation: (state.rotation + config.rotation_step).rem_euclid(TAU),
    }
}

/// Phase of pulsing/mosaic animations at this state
pub fn phase(state: &AnimationState, config: &AnimationConfig) -> f64 {
    state.frame as f64 * config.phase_step
}

/// Bar heights oscillating around their base value, never below the minimum
pub fn pulse_heights(
    heights: &[f64],
    variances: &[f64],
    state: &AnimationState,
    config: &AnimationConfig,
) -> Vec<f64> {
    let p = phase(state, config);
    heights
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let variance = variances.get(i).copied().unwrap_or(0.0);
            let wave = (p + i as f64 * config.pulse_spread).sin() * variance * config.pulse_gain;
            (h + wave).max(config.pulse_min_height)
        })
        .collect()
}

/// Brightness offset of a mosaic tile at (col, row)
pub fn mosaic_offset(col: usize, row: usize, state: &AnimationState, config: &AnimationConfig) -> f64 {
    let angle = phase(state, config) + col as f64 * config.mosaic_col_phase + row as f64 * config.mosaic_row_phase;
    angle.sin() * config.mosaic_amplitude
}

/// Size factor of a mosaic tile, 1 ± 0.1 at half the phase speed
pub fn mosaic_tile_scale(col: usize, row: usize, state: &AnimationState, config: &AnimationConfig) -> f64 {
    1.0 + (phase(state, config) / 2.0 + (col + row) as f64).sin() * 0.1
}

/// Horizontal shift of a repeating pattern of `pattern_len` units
pub fn scroll_offset(state: &AnimationState, pattern_len: u64) -> u64 {
    state.scroll % pattern_len.max(1)
}

/// A chord layout turned to the current rotation
pub fn rotate(layout: &ChordLayout, state: &AnimationState) -> ChordLayout {
    layout.rotated(state.rotation)
}

/// Message the host sends on its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMessage {
    Tick,
    /// The chart unmounted
    Stop,
}

/// Host side of the tick channel
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<TickMessage>,
}

impl TickHandle {
    /// Returns false once the scheduler is gone
    pub fn tick(&self) -> bool {
        self.tx.send(TickMessage::Tick).is_ok()
    }

    pub fn stop(&self) -> bool {
        self.tx.send(TickMessage::Stop).is_ok()
    }
}

/// Drains host ticks and advances the animation state, one step per tick
#[derive(Debug)]
pub struct Scheduler {
    rx: mpsc::UnboundedReceiver<TickMessage>,
    state: AnimationState,
    config: AnimationConfig,
    stopped: bool,
}

impl Scheduler {
    pub fn new(config: AnimationConfig) -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self { rx, state: AnimationState::default(), config, stopped: false };
        (scheduler, TickHandle { tx })
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Apply every pending message without blocking, calling `on_frame` after
    /// each tick. Returns the number of ticks applied.
    pub fn pump<F: FnMut(&AnimationState)>(&mut self, mut on_frame: F) -> usize {
        let mut applied = 0;
        while !self.stopped {
            match self.rx.try_recv() {
                Ok(TickMessage::Tick) => {
                    self.state = advance(self.state, &self.config);
                    applied += 1;
                    on_frame(&self.state);
                }
                Ok(TickMessage::Stop) => self.halt(),
                Err(_) => break,
            }
        }
        applied
    }

    /// Wait for ticks until `Stop` arrives or every handle is dropped
    pub async fn run<F: FnMut(&AnimationState)>(&mut self, mut on_frame: F) {
        while !self.stopped {
            match self.rx.recv().await {
                Some(TickMessage::Tick) => {
                    self.state = advance(self.state, &self.config);
                    on_frame(&self.state);
                }
                Some(TickMessage::Stop) | None => self.halt(),
            }
        }
    }

    fn halt(&mut self) {
        debug!(frame = self.state.frame, "animation stopped");
        self.stopped = true;
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::chord::ChordConfig;
    use crate::metric::PairwiseWeights;

    // ==========================================================================
    // PURE STATE TESTS
    // ==========================================================================

    #[test]
    fn test_advance_moves_one_unit() {
        let config = AnimationConfig::default();
        let s = advance(AnimationState::default(), &config);
        assert_eq!(s.frame, 1);
        assert_eq!(s.scroll, 1);
        assert!((s.rotation - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_scroll_wraps_at_modulus() {
        let config = AnimationConfig { scroll_modulus: 3, ..AnimationConfig::default() };
        let mut s = AnimationState::default();
        for _ in 0..4 {
            s = advance(s, &config);
        }
        assert_eq!(s.scroll, 1);
        assert_eq!(s.frame, 4);
        assert_eq!(scroll_offset(&s, 100), 1);
    }

    #[test]
    fn test_pulse_heights_floor() {
        let config = AnimationConfig::default();
        let state = AnimationState { frame: 0, ..AnimationState::default() };
        // phase 0: bar 0 unchanged, bar 1 offset by sin(0.5)·variance·10
        let h = pulse_heights(&[20.0, 2.0], &[1.0, 0.0], &state, &config);
        assert!((h[0] - 20.0).abs() < 1e-12);
        assert_eq!(h[1], 5.0);
    }

    #[test]
    fn test_mosaic_offset_bounded() {
        let config = AnimationConfig::default();
        let state = AnimationState { frame: 37, ..AnimationState::default() };
        for col in 0..10 {
            for row in 0..10 {
                assert!(mosaic_offset(col, row, &state, &config).abs() <= 0.2 + 1e-12);
                let scale = mosaic_tile_scale(col, row, &state, &config);
                assert!((0.9..=1.1).contains(&scale));
            }
        }
    }

    #[test]
    fn test_rotate_is_pure() {
        let weights = PairwiseWeights::new(vec![("A-B".into(), 1.0)]);
        let layout = ChordLayout::from_pairs(&weights, &ChordConfig::default()).unwrap();
        let state = AnimationState { rotation: 1.0, ..AnimationState::default() };
        let turned = rotate(&layout, &state);
        assert!((turned.groups[0].start_angle - 1.0).abs() < 1e-12);
        assert_eq!(layout.groups[0].start_angle, 0.0);
    }

    // ==========================================================================
    // SCHEDULER TESTS
    // ==========================================================================

    #[test]
    fn test_pump_applies_every_tick() {
        let (mut scheduler, handle) = Scheduler::new(AnimationConfig::default());
        for _ in 0..5 {
            assert!(handle.tick());
        }
        let mut frames = Vec::new();
        assert_eq!(scheduler.pump(|s| frames.push(s.frame)), 5);
        assert_eq!(frames, vec![1, 2, 3, 4, 5]);
        assert_eq!(scheduler.pump(|_| {}), 0);
    }

    #[test]
    fn test_stop_ignores_later_ticks() {
        let (mut scheduler, handle) = Scheduler::new(AnimationConfig::default());
        handle.tick();
        handle.stop();
        handle.tick();
        assert_eq!(scheduler.pump(|_| {}), 1);
        assert!(scheduler.is_stopped());
        assert_eq!(scheduler.state().frame, 1);
        assert!(!handle.tick());
    }

    #[tokio::test]
    async fn test_run_until_handles_dropped() {
        let (mut scheduler, handle) = Scheduler::new(AnimationConfig::default());
        handle.tick();
        handle.tick();
        drop(handle);
        let mut count = 0;
        scheduler.run(|_| count += 1).await;
        assert_eq!(count, 2);
        assert!(scheduler.is_stopped());
    }
}
