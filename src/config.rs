use serde::Deserialize;

use crate::error::ConfigError;

/// Upper bound on frames held per animation.
pub const MAX_FRAMES_PER_CYCLE: u32 = 36_000;

/// Fixed render configuration, supplied once at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Tick rate; also the playback rate of produced animations.
    pub fps: u32,
    /// Seconds of history captured per animation.
    pub capture_window_seconds: u32,
    /// Ambient mode: critters spawn on their own, scaled by activity.
    pub interactive: bool,
    /// Upper bound on parallel frame quantizers.
    pub encode_threads: usize,
    /// Optional long hold on the last frame of each animation.
    pub final_frame_hold_ms: Option<u32>,
    /// Commands drained per tick before the rest wait for the next one.
    pub max_commands_per_tick: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fps: 30,
            capture_window_seconds: 5,
            interactive: false,
            encode_threads: 4,
            final_frame_hold_ms: None,
            max_commands_per_tick: 64,
        }
    }
}

impl RenderConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = u16::MAX as u32;
        if self.width == 0 || self.height == 0 || self.width > max || self.height > max {
            return Err(ConfigError::Dimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        if self.capture_window_seconds == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        match self.fps.checked_mul(self.capture_window_seconds) {
            Some(frames) if frames <= MAX_FRAMES_PER_CYCLE => {}
            _ => {
                return Err(ConfigError::CycleTooLong {
                    fps: self.fps,
                    seconds: self.capture_window_seconds,
                })
            }
        }
        if self.encode_threads == 0 {
            return Err(ConfigError::ZeroEncodeThreads);
        }
        Ok(())
    }

    /// Ring capacity: one slot per tick of the capture window.
    pub fn frames_per_cycle(&self) -> usize {
        self.fps as usize * self.capture_window_seconds as usize
    }

    /// Fixed simulation step in seconds.
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.fps as f32
    }

    /// GIF frame delay in hundredths of a second, never zero.
    pub fn frame_delay_cs(&self) -> u16 {
        (100u32.saturating_add(self.fps / 2) / self.fps).max(1) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RenderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.frames_per_cycle(), 150);
        assert_eq!(config.frame_delay_cs(), 3);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = RenderConfig::from_toml_str("width = 320\nheight = 240\nfps = 10\n").unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.fps, 10);
        assert_eq!(config.capture_window_seconds, 5);
        assert_eq!(config.frame_delay_cs(), 10);
    }

    #[test]
    fn rejects_zero_fps() {
        let err = RenderConfig::from_toml_str("fps = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFps));
    }

    #[test]
    fn rejects_oversized_canvas() {
        let config = RenderConfig {
            width: 70_000,
            ..RenderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Dimensions { .. })));
    }

    #[test]
    fn rejects_cycles_that_overflow() {
        let config = RenderConfig {
            fps: 70_000,
            capture_window_seconds: 70_000,
            ..RenderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CycleTooLong { fps: 70_000, seconds: 70_000 })
        ));
    }

    #[test]
    fn cycle_limit_is_inclusive() {
        let at_limit = RenderConfig {
            fps: 60,
            capture_window_seconds: MAX_FRAMES_PER_CYCLE / 60,
            ..RenderConfig::default()
        };
        at_limit.validate().unwrap();
        assert_eq!(at_limit.frames_per_cycle(), MAX_FRAMES_PER_CYCLE as usize);

        let over = RenderConfig {
            capture_window_seconds: at_limit.capture_window_seconds + 1,
            ..at_limit
        };
        assert!(matches!(over.validate(), Err(ConfigError::CycleTooLong { .. })));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            RenderConfig::from_toml_str("colour = 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
