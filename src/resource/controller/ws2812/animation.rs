//! Cooperative animation engine for directly driven strips.
//!
//! The engine never sleeps. The host loop calls [`AnimationEngine::tick`] as
//! often as it likes; a new frame is computed only when a full step interval
//! has passed since the previous one.

use std::time::{Duration, Instant};

use crate::api::dto::Ws2812Settings;
use crate::interface::color::{hsv_to_rgb, map_range, RgbColor};
use crate::interface::palette::{Animation, ColorPalette};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationTiming {
    /// Fade runs `duration / fade_step` steps.
    pub fade_step: Duration,
    /// Lower bound on the time between two frames.
    pub min_step_interval: Duration,
    pub rainbow_steps: u32,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            fade_step: Duration::from_millis(50),
            min_step_interval: Duration::from_millis(50),
            rainbow_steps: 360,
        }
    }
}

impl From<&Ws2812Settings> for AnimationTiming {
    fn from(settings: &Ws2812Settings) -> Self {
        Self {
            fade_step: Duration::from_millis(settings.fade_step_ms.max(1)),
            min_step_interval: Duration::from_millis(settings.min_step_interval_ms),
            rainbow_steps: settings.rainbow_steps.max(1),
        }
    }
}

#[derive(Clone, Debug)]
struct ActiveAnimation {
    kind: Animation,
    palette: ColorPalette,
    step: u32,
    total_steps: u32,
    interval: Duration,
    last_update: Instant,
}

#[derive(Debug)]
pub struct AnimationEngine {
    timing: AnimationTiming,
    active: Option<ActiveAnimation>,
}

impl AnimationEngine {
    pub fn new(timing: AnimationTiming) -> Self {
        Self {
            timing,
            active: None,
        }
    }

    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn animation(&self) -> Option<Animation> {
        self.active.as_ref().map(|a| a.kind)
    }

    /// `(step, total_steps)` of the running animation.
    pub fn progress(&self) -> Option<(u32, u32)> {
        self.active.as_ref().map(|a| (a.step, a.total_steps))
    }

    pub fn total_steps_for(&self, animation: Animation, duration_ms: u32, led_count: usize) -> u32 {
        let steps = match animation {
            Animation::Static => 1,
            Animation::Fade => {
                (duration_ms as u128 / self.timing.fade_step.as_millis().max(1)) as u32
            }
            Animation::Wipe => (led_count as u32).saturating_mul(2),
            Animation::Rainbow => self.timing.rainbow_steps,
        };
        steps.max(1)
    }

    /// Starts `palette`. Static palettes are drawn into `pixels` immediately and
    /// leave no running animation; the return value says whether a frame was
    /// drawn.
    pub fn start(&mut self, palette: &ColorPalette, now: Instant, pixels: &mut [RgbColor]) -> bool {
        let kind = palette.animation();
        if kind == Animation::Static {
            self.active = None;
            for (i, pixel) in pixels.iter_mut().enumerate() {
                *pixel = palette.color_at(i);
            }
            return true;
        }

        let total_steps = self.total_steps_for(kind, palette.duration_ms(), pixels.len());
        let per_step = Duration::from_millis((palette.duration_ms() / total_steps) as u64);
        self.active = Some(ActiveAnimation {
            kind,
            palette: palette.clone(),
            step: 0,
            total_steps,
            interval: per_step.max(self.timing.min_step_interval),
            last_update: now,
        });
        false
    }

    pub fn stop(&mut self) {
        self.active = None;
    }

    /// Renders the next frame into `pixels` once the step interval has
    /// elapsed. Returns `true` when a frame was rendered.
    pub fn tick(&mut self, now: Instant, pixels: &mut [RgbColor]) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if now.saturating_duration_since(active.last_update) < active.interval {
            return false;
        }
        active.last_update = now;

        render_step(active, pixels);
        active.step += 1;

        if active.step >= active.total_steps {
            log::debug!(animation = active.kind.as_str(), steps = active.total_steps; "[ws2812] Animation complete");
            self.active = None;
        }
        true
    }
}

fn render_step(active: &ActiveAnimation, pixels: &mut [RgbColor]) {
    let palette = &active.palette;
    match active.kind {
        Animation::Static => {
            for (i, pixel) in pixels.iter_mut().enumerate() {
                *pixel = palette.color_at(i);
            }
        }
        Animation::Fade => {
            let progress = active.step as f32 / active.total_steps as f32;
            for (i, pixel) in pixels.iter_mut().enumerate() {
                *pixel = palette.color_at(i).interpolate(palette.color_at(i + 1), progress);
            }
        }
        Animation::Wipe => {
            let lit = map_range(
                active.step as i64,
                0,
                active.total_steps as i64,
                0,
                pixels.len() as i64,
            )
            .max(0) as usize;
            for (i, pixel) in pixels.iter_mut().enumerate() {
                *pixel = if i < lit { palette.color_at(i) } else { RgbColor::BLACK };
            }
        }
        Animation::Rainbow => {
            // One full hue turn per run, whatever the step count.
            let steps = active.total_steps.max(1) as u64;
            for (i, pixel) in pixels.iter_mut().enumerate() {
                let position = (i as u64 + active.step as u64) % steps;
                *pixel = hsv_to_rgb((position * 360 / steps) as f32, 1.0, 1.0);
            }
        }
    }
}
