//! Render scheduler (C10, §4.1): the single per-tick entry point that
//! multiplexes every subsystem onto the shared framebuffer.
//!
//! Each call: polls input once, walks the priority ladder to find which
//! subsystem is foreground, drives that subsystem with edge-detected input,
//! renders into the framebuffer, overlays the FPS counter, and hands the
//! frame to the host. Non-foreground music keeps pumping audio regardless.

mod video_session;

use crate::background::AnimatedBackground;
use crate::color::{FrameColorParams, YRange, YuvTables};
use crate::config::Settings;
use crate::font;
use crate::image::viewer::{ImageViewer, ViewerState, MUSIC_FLUSH_MAX_PUMPS};
use crate::input;
use crate::music_player::MusicPlayer;
use crate::state::{self, JoypadSnapshot, FB_HEIGHT, FB_WIDTH};
use crate::video_player::{EndOfStreamAction, PlayerMode, VideoPlayer};
use libretro_backend::RuntimeHandle;
use video_session::VideoSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foreground {
    VideoPlayer,
    ImageViewer,
    MusicPlayer,
    Calculator,
    FileManager,
    Menu,
}

/// Pure priority-ladder decision (§4.1): first matching wins.
pub fn select_foreground(
    video_player_active: bool,
    image_viewer_active: bool,
    music_active_and_foreground: bool,
    calculator_active: bool,
    file_manager_active: bool,
) -> Foreground {
    if video_player_active {
        Foreground::VideoPlayer
    } else if image_viewer_active {
        Foreground::ImageViewer
    } else if music_active_and_foreground {
        Foreground::MusicPlayer
    } else if calculator_active {
        Foreground::Calculator
    } else if file_manager_active {
        Foreground::FileManager
    } else {
        Foreground::Menu
    }
}

struct VideoPlayback {
    player: VideoPlayer,
    session: VideoSession,
}

pub struct Scheduler {
    video: Option<VideoPlayback>,
    viewer: ImageViewer,
    viewer_has_content: bool,
    music: MusicPlayer,
    background: AnimatedBackground,
    pub calculator_active: bool,
    pub file_manager_active: bool,
    pub return_pending: bool,
    settings: Settings,
    yuv_tables: YuvTables,
    transient_error: Option<(String, u32)>,
    tick_count: u64,
}

const TRANSIENT_ERROR_TICKS: u32 = 60; // ~2s at 30Hz, per §7

impl Scheduler {
    pub fn new(settings: Settings) -> Self {
        Self {
            video: None,
            viewer: ImageViewer::new(),
            viewer_has_content: false,
            music: MusicPlayer::new(),
            background: AnimatedBackground::new(30.0),
            calculator_active: false,
            file_manager_active: false,
            return_pending: false,
            settings,
            yuv_tables: YuvTables::build(),
            transient_error: None,
            tick_count: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn video_player_active(&self) -> bool {
        self.video.is_some()
    }

    fn image_viewer_active(&self) -> bool {
        self.viewer_has_content
    }

    /// Open a clip for full-screen playback; called by the (out-of-scope)
    /// file manager when the user picks a video file.
    pub fn open_video(&mut self, path: &str) {
        match VideoSession::open(path) {
            Ok(session) => {
                let total_frames = session.total_frames();
                let fps = session.fps();
                let mut player = VideoPlayer::new(self.settings.clone());
                player.open(path, total_frames, fps);
                self.video = Some(VideoPlayback { player, session });
            }
            Err(e) => self.raise_transient_error(e.overlay_label()),
        }
    }

    pub fn close_video(&mut self) {
        if let Some(mut playback) = self.video.take() {
            playback.player.close();
        }
    }

    /// Begin a chunked image load; called by the file manager or image
    /// gallery when the user selects a file (§4.8).
    pub fn open_image(&mut self, total_size: usize) {
        match self.viewer.begin_load(total_size) {
            Ok(()) => self.viewer_has_content = true,
            Err(e) => self.raise_transient_error(e.overlay_label()),
        }
    }

    pub fn push_image_chunk(&mut self, chunk: &[u8]) {
        if let Err(e) = self.viewer.push_chunk(chunk) {
            self.raise_transient_error(e.overlay_label());
        }
    }

    pub fn close_image(&mut self) {
        self.viewer.cancel();
        self.viewer_has_content = false;
    }

    fn raise_transient_error(&mut self, label: &str) {
        self.transient_error = Some((label.to_string(), TRANSIENT_ERROR_TICKS));
    }

    /// Run one tick: input poll, priority-ladder dispatch, render, FPS
    /// overlay, present to host. Called by `Core::on_run`.
    pub fn tick(&mut self, handle: &mut RuntimeHandle) {
        input::snapshot_per_frame(handle);
        let joypad = input::joypad();

        self.drain_music_audio(handle);

        let foreground = select_foreground(
            self.video_player_active(),
            self.image_viewer_active(),
            self.music.is_playing() && self.music.is_foreground(),
            self.calculator_active,
            self.file_manager_active,
        );

        match foreground {
            Foreground::VideoPlayer => self.run_video_player(joypad, handle),
            Foreground::ImageViewer => self.run_image_viewer(joypad, handle),
            Foreground::MusicPlayer | Foreground::Calculator | Foreground::FileManager => {
                self.render_black_passthrough();
            }
            Foreground::Menu => self.run_menu(),
        }

        self.overlay_fps();
        self.present(handle);
        self.tick_count += 1;
    }

    fn drain_music_audio(&mut self, handle: &mut RuntimeHandle) {
        let mut bytes = [0u8; 4096];
        let n = self.music.drain(&mut bytes);
        if n > 0 {
            let samples = bytes_to_i16(&bytes[..n]);
            handle.upload_audio_frame(&samples);
        }
    }

    /// Just before the image viewer's one slow decode call: drain the music
    /// ring down to empty (up to [`MUSIC_FLUSH_MAX_PUMPS`] rapid pumps) and
    /// drop the mixer's timing state, so the stall doesn't leave a backlog
    /// that plays back as a burst once decode finishes (§4.8).
    fn flush_music_before_decode_stall(&mut self, handle: &mut RuntimeHandle) {
        for _ in 0..MUSIC_FLUSH_MAX_PUMPS {
            let mut bytes = [0u8; 4096];
            let n = self.music.drain(&mut bytes);
            if n == 0 {
                break;
            }
            let samples = bytes_to_i16(&bytes[..n]);
            handle.upload_audio_frame(&samples);
        }
        self.music.reset_timing_reference();
    }

    fn run_video_player(&mut self, joypad: JoypadSnapshot, handle: &mut RuntimeHandle) {
        let Some(playback) = self.video.as_mut() else {
            return;
        };
        let VideoPlayback { player, session } = playback;

        let shoulder_combo = joypad.pressed(input::bit::L1) && joypad.pressed(input::bit::R1);
        player.tick_lock_hold(shoulder_combo);
        player.tick_icon();

        if !player.is_locked() {
            handle_video_seek_and_menu(player, session, joypad);
        }

        if !player.is_locked() && joypad.released(input::bit::B) {
            let should_close = if player.handle_b_at_stream_end() {
                true
            } else {
                player.handle_b_playback()
            };
            if should_close {
                self.return_pending = true;
                self.close_video();
                return;
            }
        }

        let Some(playback) = self.video.as_mut() else {
            return;
        };
        let VideoPlayback { player, session } = playback;

        if player.mode() == PlayerMode::Playing {
            let next_frame = player.current_frame() + 1;
            if next_frame >= session.total_frames() {
                match player.on_end_of_stream() {
                    EndOfStreamAction::RewindAndResume => session.rewind(),
                    EndOfStreamAction::PauseAtLastFrame => {}
                    EndOfStreamAction::CloseAndAdvanceAlphabetically
                    | EndOfStreamAction::CloseAndReopenShuffled => {
                        // Directory scanning/shuffling lives in the (out-of-scope)
                        // file manager; signal it via `return_pending`.
                        self.return_pending = true;
                        self.close_video();
                        return;
                    }
                }
            } else {
                player_advance_frame(player, next_frame);
            }
        }

        let Some(playback) = self.video.as_mut() else {
            return;
        };
        let VideoPlayback { player, session } = playback;

        let y_range = if player.settings.xvid_black_is_pc { YRange::Pc } else { YRange::Tv };
        let params = FrameColorParams::resolve(&self.yuv_tables, player.settings.color_mode, y_range);

        let mut s = state::global().lock().unwrap();
        let fb = s.framebuffer.as_mut_slice();
        if let Err(e) = session.decode_video_frame(player.current_frame(), &self.yuv_tables, &params, fb, FB_WIDTH, FB_HEIGHT) {
            drop(s);
            self.raise_transient_error(e.overlay_label());
            return;
        }
        drop(s);

        session.pump_audio().ok();
        let mut bytes = [0u8; 4096];
        let n = session.drain_audio(&mut bytes);
        if n > 0 {
            let samples = bytes_to_i16(&bytes[..n]);
            handle.upload_audio_frame(&samples);
        }

        if player.mode() == PlayerMode::Menu {
            draw_video_menu(player);
        }
    }

    fn run_image_viewer(&mut self, joypad: JoypadSnapshot, handle: &mut RuntimeHandle) {
        self.viewer.tick_error_display();

        if joypad.pressed(input::bit::LEFT) {
            self.viewer.pan(-1, 0, joypad.pressed(input::bit::A));
        }
        if joypad.pressed(input::bit::RIGHT) {
            self.viewer.pan(1, 0, joypad.pressed(input::bit::A));
        }
        if joypad.pressed(input::bit::UP) {
            self.viewer.pan(0, -1, joypad.pressed(input::bit::A));
        }
        if joypad.pressed(input::bit::DOWN) {
            self.viewer.pan(0, 1, joypad.pressed(input::bit::A));
        }
        if joypad.released(input::bit::B) {
            self.close_image();
            self.return_pending = true;
            return;
        }

        // Chunk feeding is driven by the file-manager loader calling
        // `push_image_chunk`; here we only advance Decoding -> Done/Error.
        if matches!(self.viewer.state(), ViewerState::Decoding { .. }) {
            self.flush_music_before_decode_stall(handle);
            self.viewer.decode_now();
        }

        let mut s = state::global().lock().unwrap();
        render_viewer_frame(&self.viewer, s.framebuffer.as_mut_slice());
    }

    fn run_menu(&mut self) {
        // The animated background clip's own decode step (source XviD frame
        // -> YUV -> RGB565) lives on the same `VideoSession`-shaped path as
        // the full-screen player; the menu module that owns which clip is
        // active is out of scope here, so the decoded backdrop arrives black
        // until that collaborator is wired in.
        self.background.should_decode_new_frame();

        let mut s = state::global().lock().unwrap();
        let fb = s.framebuffer.as_mut_slice();
        let black = vec![0u16; FB_WIDTH * FB_HEIGHT];
        self.background.composite(&black, self.file_manager_active, fb);
    }

    fn render_black_passthrough(&mut self) {
        let mut s = state::global().lock().unwrap();
        s.framebuffer.clear(0);
    }

    fn overlay_fps(&mut self) {
        let mut s = state::global().lock().unwrap();
        if s.settings.show_debug {
            let label = format!("T:{}", self.tick_count);
            let fb = &mut s.framebuffer;
            font::draw_text_outlined(fb, 4, 4, &label, 0xFFFF);
        }
        if let Some((label, ticks)) = &mut self.transient_error {
            let fb = &mut s.framebuffer;
            font::draw_text_outlined(fb, 8, (FB_HEIGHT as i32) - 16, label, 0xF800);
            if *ticks > 0 {
                *ticks -= 1;
            } else {
                self.transient_error = None;
            }
        }
    }

    fn present(&mut self, handle: &mut RuntimeHandle) {
        let s = state::global().lock().unwrap();
        let fb = s.framebuffer.as_slice();
        let bytes = unsafe { std::slice::from_raw_parts(fb.as_ptr() as *const u8, fb.len() * 2) };
        handle.upload_video_frame(bytes);
    }
}

fn player_advance_frame(player: &mut VideoPlayer, next_frame: u64) {
    let delta = next_frame as i64 - player.current_frame() as i64;
    player.seek_relative(delta);
}

fn handle_video_seek_and_menu(player: &mut VideoPlayer, session: &mut VideoSession, joypad: JoypadSnapshot) {
    if player.mode() == PlayerMode::Menu {
        if joypad.pressed_edge(input::bit::UP) {
            player.menu_navigate(-1);
        }
        if joypad.pressed_edge(input::bit::DOWN) {
            player.menu_navigate(1);
        }
        if joypad.pressed_edge(input::bit::LEFT) {
            player.menu_adjust(false);
        }
        if joypad.pressed_edge(input::bit::RIGHT) {
            player.menu_adjust(true);
        }
        if joypad.released(input::bit::A) {
            player.close_menu();
        }
        // B in menu mode is handled uniformly with playback B below, via
        // `handle_b_playback`, which itself closes the menu.
        return;
    }

    if joypad.released(input::bit::LEFT) {
        player.seek_seconds(-15);
        session.seek_audio_cursor(player.current_frame());
    }
    if joypad.released(input::bit::RIGHT) {
        player.seek_seconds(15);
        session.seek_audio_cursor(player.current_frame());
    }
    if joypad.released(input::bit::UP) {
        player.seek_seconds(60);
        session.seek_audio_cursor(player.current_frame());
    }
    if joypad.released(input::bit::DOWN) {
        player.seek_seconds(-60);
        session.seek_audio_cursor(player.current_frame());
    }
    if joypad.released(input::bit::A) {
        player.toggle_pause();
    }
    if joypad.released(input::bit::START) {
        player.open_menu();
    }
}

fn draw_video_menu(player: &VideoPlayer) {
    let mut s = state::global().lock().unwrap();
    let fb = &mut s.framebuffer;
    for (i, item) in crate::video_player::MENU_ITEMS.iter().enumerate() {
        let color = if i == player.menu_index() { 0xFFE0 } else { 0xFFFF };
        font::draw_text(fb, 40, 40 + i as i32 * 16, item, color);
    }
}

fn render_viewer_frame(viewer: &ImageViewer, fb: &mut [u16]) {
    match viewer.state() {
        ViewerState::Done { image, zoom, pan_x, pan_y } => {
            crate::image::viewer::render_bilinear(image, *zoom, *pan_x, *pan_y, fb);
        }
        ViewerState::Error { .. } => {
            fb.fill(0);
        }
        _ => {}
    }
}

fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_player_always_wins_the_ladder() {
        assert_eq!(
            select_foreground(true, true, true, true, true),
            Foreground::VideoPlayer
        );
    }

    #[test]
    fn image_viewer_wins_over_everything_but_video() {
        assert_eq!(
            select_foreground(false, true, true, true, true),
            Foreground::ImageViewer
        );
    }

    #[test]
    fn music_only_wins_when_both_playing_and_foreground() {
        assert_eq!(
            select_foreground(false, false, false, true, true),
            Foreground::Calculator
        );
        assert_eq!(
            select_foreground(false, false, true, true, true),
            Foreground::MusicPlayer
        );
    }

    #[test]
    fn falls_through_to_menu_when_nothing_is_active() {
        assert_eq!(
            select_foreground(false, false, false, false, false),
            Foreground::Menu
        );
    }

    #[test]
    fn file_manager_loses_to_calculator() {
        assert_eq!(
            select_foreground(false, false, false, true, true),
            Foreground::Calculator
        );
        assert_eq!(
            select_foreground(false, false, false, false, true),
            Foreground::FileManager
        );
    }
}
