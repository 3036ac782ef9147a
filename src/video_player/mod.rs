//! Full-screen video player (§4.6): `Playing ⇄ Paused ⇄ Menu` state machine,
//! seek clamping, play-mode end-of-stream behavior, shoulder-pair lock, and
//! resume-on-reopen.

use crate::config::Settings;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Repeat,
    PlayOnce,
    PlayAZ,
    Shuffle,
}

pub const ALL_PLAY_MODES: [PlayMode; 4] = [
    PlayMode::Repeat,
    PlayMode::PlayOnce,
    PlayMode::PlayAZ,
    PlayMode::Shuffle,
];

impl PlayMode {
    pub fn name(&self) -> &'static str {
        match self {
            PlayMode::Repeat => "Repeat",
            PlayMode::PlayOnce => "PlayOnce",
            PlayMode::PlayAZ => "PlayAZ",
            PlayMode::Shuffle => "Shuffle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PLAY_MODES.iter().find(|m| m.name() == name).copied()
    }

    pub fn next(&self) -> Self {
        let idx = ALL_PLAY_MODES.iter().position(|m| m == self).unwrap();
        ALL_PLAY_MODES[(idx + 1) % ALL_PLAY_MODES.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = ALL_PLAY_MODES.iter().position(|m| m == self).unwrap();
        ALL_PLAY_MODES[(idx + ALL_PLAY_MODES.len() - 1) % ALL_PLAY_MODES.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMode {
    Playing,
    Paused,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    SkipLeft,
    SkipRight,
    Pause,
    Play,
    Lock,
    Unlock,
    SkipBack1Min,
    SkipFwd1Min,
}

pub const ICON_DISPLAY_TICKS: u32 = 30; // 1s at 30Hz
pub const LOCK_HOLD_FRAMES: u32 = 60; // 2s at 30Hz

pub const MENU_ITEMS: [&str; 8] = [
    "Go to Position",
    "Color Mode",
    "Xvid Range",
    "Play Mode",
    "Show Time",
    "Save Settings",
    "Instructions",
    "About",
];

/// What the scheduler should do once end-of-stream is reached, decided by
/// the active play mode.
pub enum EndOfStreamAction {
    RewindAndResume,
    PauseAtLastFrame,
    CloseAndAdvanceAlphabetically,
    CloseAndReopenShuffled,
}

pub struct VideoPlayer {
    mode: PlayerMode,
    locked: bool,
    lock_hold_ticks: u32,
    menu_index: usize,
    pub settings: Settings,
    current_frame: u64,
    total_frames: u64,
    fps: f64,
    active_icon: Option<(Icon, u32)>,
    resume_memory: HashMap<String, u64>,
    current_path: Option<String>,
    /// Set once `Play Once` has paused at the final frame; B while this is
    /// set closes the player instead of advancing (decided open question).
    paused_at_stream_end: bool,
}

impl VideoPlayer {
    pub fn new(settings: Settings) -> Self {
        Self {
            mode: PlayerMode::Playing,
            locked: false,
            lock_hold_ticks: 0,
            menu_index: 0,
            settings,
            current_frame: 0,
            total_frames: 0,
            fps: 30.0,
            active_icon: None,
            resume_memory: HashMap::new(),
            current_path: None,
            paused_at_stream_end: false,
        }
    }

    pub fn mode(&self) -> PlayerMode {
        self.mode
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Open a clip, resuming at the remembered frame if this path was
    /// played before in this process.
    pub fn open(&mut self, path: &str, total_frames: u64, fps: f64) {
        self.total_frames = total_frames;
        self.fps = fps;
        self.current_frame = self.resume_memory.get(path).copied().unwrap_or(0);
        self.current_path = Some(path.to_string());
        self.mode = PlayerMode::Playing;
        self.paused_at_stream_end = false;
    }

    /// Remember `(path, frame)` so reopening the same clip resumes here.
    pub fn close(&mut self) {
        if let Some(path) = self.current_path.take() {
            self.resume_memory.insert(path, self.current_frame);
        }
        self.mode = PlayerMode::Playing;
    }

    fn max_seekable_frame(&self) -> u64 {
        let tail = (2.0 * self.fps) as u64;
        self.total_frames.saturating_sub(tail)
    }

    /// Seek by a signed frame delta, clamped to `[0, total_frames - 2*fps]`.
    pub fn seek_relative(&mut self, delta_frames: i64) {
        let max_frame = self.max_seekable_frame();
        let new_frame = (self.current_frame as i64 + delta_frames).clamp(0, max_frame as i64);
        self.current_frame = new_frame as u64;
        self.paused_at_stream_end = false;
    }

    pub fn seek_seconds(&mut self, seconds: i64) {
        let delta_frames = (seconds as f64 * self.fps) as i64;
        self.seek_relative(delta_frames);
    }

    pub fn toggle_pause(&mut self) {
        if self.mode == PlayerMode::Playing {
            self.mode = PlayerMode::Paused;
            self.trigger_icon(Icon::Pause);
        } else if self.mode == PlayerMode::Paused {
            self.mode = PlayerMode::Playing;
            self.paused_at_stream_end = false;
            self.trigger_icon(Icon::Play);
        }
    }

    pub fn open_menu(&mut self) {
        if self.mode != PlayerMode::Menu {
            self.mode = PlayerMode::Menu;
            self.menu_index = 0;
        }
    }

    pub fn menu_navigate(&mut self, delta: i32) {
        if self.mode != PlayerMode::Menu {
            return;
        }
        let len = MENU_ITEMS.len() as i32;
        self.menu_index = ((self.menu_index as i32 + delta).rem_euclid(len)) as usize;
    }

    pub fn menu_selected_item(&self) -> &'static str {
        MENU_ITEMS[self.menu_index]
    }

    pub fn menu_index(&self) -> usize {
        self.menu_index
    }

    /// Left/Right while a menu item is selected; only `Color Mode` and
    /// `Play Mode` cycle through their own enums, `Xvid Range` and
    /// `Show Time` toggle.
    pub fn menu_adjust(&mut self, forward: bool) {
        if self.mode != PlayerMode::Menu {
            return;
        }
        match self.menu_selected_item() {
            "Color Mode" => {
                self.settings.color_mode = if forward {
                    self.settings.color_mode.next()
                } else {
                    self.settings.color_mode.prev()
                };
            }
            "Play Mode" => {
                self.settings.play_mode = if forward {
                    self.settings.play_mode.next()
                } else {
                    self.settings.play_mode.prev()
                };
            }
            "Xvid Range" => self.settings.xvid_black_is_pc = !self.settings.xvid_black_is_pc,
            "Show Time" => self.settings.show_time = !self.settings.show_time,
            _ => {}
        }
    }

    pub fn close_menu(&mut self) {
        self.mode = PlayerMode::Playing;
    }

    /// Handle B while in normal playback: immediate exit. Returns `true` if
    /// the caller should close the player.
    pub fn handle_b_playback(&mut self) -> bool {
        if self.mode == PlayerMode::Menu {
            self.close_menu();
            return false;
        }
        true
    }

    /// Per the decided open question: B while paused at end-of-stream
    /// (Play Once) closes the player rather than advancing — "Play Once"
    /// means exactly one playback.
    pub fn handle_b_at_stream_end(&mut self) -> bool {
        self.paused_at_stream_end
    }

    pub fn on_end_of_stream(&mut self) -> EndOfStreamAction {
        match self.settings.play_mode {
            PlayMode::Repeat => {
                self.current_frame = 0;
                self.mode = PlayerMode::Playing;
                EndOfStreamAction::RewindAndResume
            }
            PlayMode::PlayOnce => {
                self.current_frame = self.max_seekable_frame();
                self.mode = PlayerMode::Paused;
                self.paused_at_stream_end = true;
                EndOfStreamAction::PauseAtLastFrame
            }
            PlayMode::PlayAZ => EndOfStreamAction::CloseAndAdvanceAlphabetically,
            PlayMode::Shuffle => EndOfStreamAction::CloseAndReopenShuffled,
        }
    }

    pub fn toggle_lock(&mut self) {
        self.locked = !self.locked;
        self.trigger_icon(if self.locked { Icon::Lock } else { Icon::Unlock });
    }

    /// Call once per tick while the shoulder-pair combo is held; only
    /// toggles the lock after it's been held continuously for
    /// [`LOCK_HOLD_FRAMES`] ticks.
    pub fn tick_lock_hold(&mut self, combo_held: bool) {
        if !combo_held {
            self.lock_hold_ticks = 0;
            return;
        }
        self.lock_hold_ticks += 1;
        if self.lock_hold_ticks >= LOCK_HOLD_FRAMES {
            self.lock_hold_ticks = 0;
            self.toggle_lock();
        }
    }

    pub fn trigger_icon(&mut self, icon: Icon) {
        self.active_icon = Some((icon, ICON_DISPLAY_TICKS));
    }

    pub fn tick_icon(&mut self) {
        if let Some((_, ticks)) = &mut self.active_icon {
            if *ticks > 0 {
                *ticks -= 1;
            } else {
                self.active_icon = None;
            }
        }
    }

    pub fn active_icon(&self) -> Option<Icon> {
        self.active_icon.map(|(icon, _)| icon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> VideoPlayer {
        let mut p = VideoPlayer::new(Settings::default());
        p.open("clip.avi", 900, 30.0); // 30s clip at 30fps
        p
    }

    #[test]
    fn seek_clamps_to_two_second_tail_exclusion() {
        let mut p = player();
        p.seek_relative(10_000);
        assert_eq!(p.current_frame(), 900 - 60);
    }

    #[test]
    fn seek_clamps_to_zero() {
        let mut p = player();
        p.seek_relative(-10_000);
        assert_eq!(p.current_frame(), 0);
    }

    #[test]
    fn repeat_mode_rewinds_on_end_of_stream() {
        let mut p = player();
        p.current_frame = 900;
        let action = p.on_end_of_stream();
        assert!(matches!(action, EndOfStreamAction::RewindAndResume));
        assert_eq!(p.current_frame(), 0);
        assert_eq!(p.mode(), PlayerMode::Playing);
    }

    #[test]
    fn play_once_pauses_at_last_frame_then_b_closes_rather_than_advances() {
        let mut p = player();
        p.settings.play_mode = PlayMode::PlayOnce;
        let action = p.on_end_of_stream();
        assert!(matches!(action, EndOfStreamAction::PauseAtLastFrame));
        assert_eq!(p.mode(), PlayerMode::Paused);
        assert!(p.handle_b_at_stream_end());
    }

    #[test]
    fn play_az_requests_alphabetical_advance() {
        let mut p = player();
        p.settings.play_mode = PlayMode::PlayAZ;
        assert!(matches!(
            p.on_end_of_stream(),
            EndOfStreamAction::CloseAndAdvanceAlphabetically
        ));
    }

    #[test]
    fn shuffle_requests_reopen_shuffled() {
        let mut p = player();
        p.settings.play_mode = PlayMode::Shuffle;
        assert!(matches!(
            p.on_end_of_stream(),
            EndOfStreamAction::CloseAndReopenShuffled
        ));
    }

    #[test]
    fn resume_memory_roundtrips_across_close_and_reopen() {
        let mut p = player();
        p.seek_relative(300);
        let frame = p.current_frame();
        p.close();
        p.open("clip.avi", 900, 30.0);
        assert_eq!(p.current_frame(), frame);
    }

    #[test]
    fn lock_only_toggles_after_full_hold_duration() {
        let mut p = player();
        for _ in 0..LOCK_HOLD_FRAMES - 1 {
            p.tick_lock_hold(true);
        }
        assert!(!p.is_locked());
        p.tick_lock_hold(true);
        assert!(p.is_locked());
    }

    #[test]
    fn lock_hold_resets_if_combo_released_early() {
        let mut p = player();
        for _ in 0..LOCK_HOLD_FRAMES - 1 {
            p.tick_lock_hold(true);
        }
        p.tick_lock_hold(false);
        p.tick_lock_hold(true);
        assert!(!p.is_locked());
    }

    #[test]
    fn menu_navigation_wraps_around() {
        let mut p = player();
        p.open_menu();
        p.menu_navigate(-1);
        assert_eq!(p.menu_selected_item(), MENU_ITEMS[MENU_ITEMS.len() - 1]);
    }

    #[test]
    fn icon_display_expires_after_display_ticks() {
        let mut p = player();
        p.trigger_icon(Icon::SkipLeft);
        for _ in 0..ICON_DISPLAY_TICKS {
            assert!(p.active_icon().is_some());
            p.tick_icon();
        }
        assert!(p.active_icon().is_none());
    }
}
