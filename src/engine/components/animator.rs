use crate::engine::components::animation::Animation;
use crate::engine::components::skeleton::Skeleton;
use crate::engine::config::{PlaybackMode, PlaybackSettings};

/// Plays one clip at a time and poses the skeleton.
#[derive(Debug, Clone)]
pub struct Animator {
    /// Playback position in ticks.
    current_time: f64,
    active: Option<usize>,
    started: bool,
    paused: bool,
    mode: PlaybackMode,
    speed: f32,
}

impl Animator {
    pub fn new(settings: &PlaybackSettings) -> Self {
        Self {
            current_time: 0.0,
            active: None,
            started: false,
            paused: false,
            mode: settings.mode,
            speed: settings.speed,
        }
    }

    /// Starts `clip` from its first frame.
    pub fn start(&mut self, clip: usize) {
        self.active = Some(clip);
        self.current_time = 0.0;
        self.started = true;
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.active = None;
        self.started = false;
        self.paused = false;
        self.current_time = 0.0;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn active_clip(&self) -> Option<usize> {
        self.active
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    /// Advances playback by `delta_seconds` and recomputes every bone's matrices.
    pub fn update(&mut self, delta_seconds: f32, animations: &[Animation], skeleton: &mut Skeleton) {
        let animation = match self.active {
            Some(index) if self.started => animations.get(index),
            _ => None,
        };

        if let Some(animation) = animation {
            if !self.paused {
                self.advance(delta_seconds, animation);
            }
        }

        pose_skeleton(skeleton, animation, self.current_time);
    }

    fn advance(&mut self, delta_seconds: f32, animation: &Animation) {
        let time = self.current_time + f64::from(delta_seconds * self.speed) * animation.ticks_per_second;
        let duration = animation.duration;

        self.current_time = if duration <= 0.0 {
            0.0
        } else {
            match self.mode {
                PlaybackMode::Loop => time.rem_euclid(duration),
                PlaybackMode::Clamp => time.clamp(0.0, duration),
            }
        };
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new(&PlaybackSettings::default())
    }
}

/// Poses every bone at `time` (in ticks), parents before children.
///
/// Bones without a track in `animation` keep their bind matrix.
pub fn pose_skeleton(skeleton: &mut Skeleton, animation: Option<&Animation>, time: f64) {
    skeleton.update_matrices(|bone| {
        animation
            .and_then(|a| a.track(&bone.name))
            .map_or(bone.bind_matrix, |track| track.sample(time, &bone.bind_matrix))
    });
}
