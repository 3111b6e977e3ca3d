use crossterm::{
    cursor,
    event::{self, Event, KeyCode, MouseEventKind},
    execute, queue,
    style::{self, Color as CColor},
    terminal,
};
use fundsp::prelude64::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rodio::{OutputStream, OutputStreamBuilder, Sink, buffer::SamplesBuffer, mixer::Mixer};
use std::f64::consts::TAU;
use std::io::{self, Write, stdout};
use std::time::{Duration, Instant};

// ── Sounds ──────────────────────────────────────────────────────────────────

/// Audio output, opened lazily from the first input gesture.
/// While unopened (or if no device is usable) every cue is a silent no-op.
struct AudioCue {
    stream: Option<OutputStream>,
}

impl AudioCue {
    fn new() -> Self {
        Self { stream: None }
    }

    /// Opens the default output device at most once. Input handlers only.
    fn ensure_initialized(&mut self) {
        if self.stream.is_none() {
            self.stream = OutputStreamBuilder::open_default_stream().ok();
        }
    }

    fn play_collect_tone(&self, pitch_hz: f64) {
        if let Some(stream) = &self.stream {
            play_crunch(stream.mixer(), pitch_hz);
        }
    }
}

fn play_crunch(mixer: &Mixer, pitch_hz: f64) {
    let sink = Sink::connect_new(mixer);

    // Square wave at a fixed pitch, gain decaying exponentially
    // from 0.14 to 0.001 over 0.12s
    let gain = lfo(|t: f64| 0.14 * (0.001 / 0.14_f64).powf((t / 0.12).min(1.0)));
    let mut tone = (lfo(move |_: f64| pitch_hz) >> square()) * gain;

    // fundsp uses 44.1kHz by default
    let samples: Vec<f32> = (0..(44100.0 * 0.12) as usize)
        .map(|_| tone.get_mono() as f32)
        .collect();

    sink.append(SamplesBuffer::new(1, 44100, samples));
    sink.detach(); // Play in background
}

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Rgb(u8, u8, u8);

impl Rgb {
    const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }
}

const BACKDROP: Rgb = Rgb(246, 183, 200);
const INK: Rgb = Rgb(24, 20, 26);
const PICKLE_HI: Rgb = Rgb(148, 205, 88);
const PICKLE_DARK: Rgb = Rgb(74, 128, 38);
const PICKLE_SPOT: Rgb = Rgb(58, 104, 30);
const HUD_GRAVITY: Rgb = Rgb(180, 180, 255);
const HUD_JUMP: Rgb = Rgb(255, 180, 180);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

struct PixelBuf {
    w: usize,
    h: usize, // pixel height = terminal rows * 2
    px: Vec<Rgb>,
}

impl PixelBuf {
    fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            px: vec![BACKDROP; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.px.resize(w * h, BACKDROP);
    }

    fn fill(&mut self, c: Rgb) {
        self.px.fill(c);
    }

    fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    fn fill_circle(&mut self, cx: i32, cy: i32, r: i32, c: Rgb) {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r * r {
                    self.set(cx + dx, cy + dy, c);
                }
            }
        }
    }

    fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut prev_fg = Rgb(0, 0, 0);
        let mut prev_bg = Rgb(0, 0, 0);
        let mut need_fg = true;
        let mut need_bg = true;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);

                if top == bot {
                    if need_bg || prev_bg != top {
                        queue!(
                            out,
                            style::SetBackgroundColor(CColor::Rgb {
                                r: top.0,
                                g: top.1,
                                b: top.2
                            })
                        )?;
                        prev_bg = top;
                        need_bg = false;
                    }
                    queue!(out, style::Print(' '))?;
                } else {
                    if need_fg || prev_fg != top {
                        queue!(
                            out,
                            style::SetForegroundColor(CColor::Rgb {
                                r: top.0,
                                g: top.1,
                                b: top.2
                            })
                        )?;
                        prev_fg = top;
                        need_fg = false;
                    }
                    if need_bg || prev_bg != bot {
                        queue!(
                            out,
                            style::SetBackgroundColor(CColor::Rgb {
                                r: bot.0,
                                g: bot.1,
                                b: bot.2
                            })
                        )?;
                        prev_bg = bot;
                        need_bg = false;
                    }
                    queue!(out, style::Print('\u{2580}'))?; // ▀
                }
            }
            if row < rows - 1 {
                queue!(out, style::ResetColor, style::Print("\r\n"))?;
                need_fg = true;
                need_bg = true;
            }
        }
        queue!(out, style::ResetColor)?;
        out.flush()
    }
}

// ── 3x5 bitmap font ─────────────────────────────────────────────────────────

#[rustfmt::skip]
const DIGITS: [[u8; 15]; 10] = [
    [1,1,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // 0
    [0,1,0, 1,1,0, 0,1,0, 0,1,0, 1,1,1], // 1
    [1,1,1, 0,0,1, 1,1,1, 1,0,0, 1,1,1], // 2
    [1,1,1, 0,0,1, 0,1,1, 0,0,1, 1,1,1], // 3
    [1,0,1, 1,0,1, 1,1,1, 0,0,1, 0,0,1], // 4
    [1,1,1, 1,0,0, 1,1,1, 0,0,1, 1,1,1], // 5
    [1,1,1, 1,0,0, 1,1,1, 1,0,1, 1,1,1], // 6
    [1,1,1, 0,0,1, 0,1,0, 0,1,0, 0,1,0], // 7
    [1,1,1, 1,0,1, 1,1,1, 1,0,1, 1,1,1], // 8
    [1,1,1, 1,0,1, 1,1,1, 0,0,1, 1,1,1], // 9
];

#[rustfmt::skip]
const LETTERS: [[u8; 15]; 26] = [
    [0,1,0, 1,0,1, 1,1,1, 1,0,1, 1,0,1], // A
    [1,1,0, 1,0,1, 1,1,0, 1,0,1, 1,1,0], // B
    [0,1,1, 1,0,0, 1,0,0, 1,0,0, 0,1,1], // C
    [1,1,0, 1,0,1, 1,0,1, 1,0,1, 1,1,0], // D
    [1,1,1, 1,0,0, 1,1,0, 1,0,0, 1,1,1], // E
    [1,1,1, 1,0,0, 1,1,0, 1,0,0, 1,0,0], // F
    [0,1,1, 1,0,0, 1,0,1, 1,0,1, 0,1,1], // G
    [1,0,1, 1,0,1, 1,1,1, 1,0,1, 1,0,1], // H
    [1,1,1, 0,1,0, 0,1,0, 0,1,0, 1,1,1], // I
    [0,0,1, 0,0,1, 0,0,1, 1,0,1, 0,1,0], // J
    [1,0,1, 1,0,1, 1,1,0, 1,0,1, 1,0,1], // K
    [1,0,0, 1,0,0, 1,0,0, 1,0,0, 1,1,1], // L
    [1,0,1, 1,1,1, 1,1,1, 1,0,1, 1,0,1], // M
    [1,1,0, 1,0,1, 1,0,1, 1,0,1, 1,0,1], // N
    [0,1,0, 1,0,1, 1,0,1, 1,0,1, 0,1,0], // O
    [1,1,0, 1,0,1, 1,1,0, 1,0,0, 1,0,0], // P
    [0,1,0, 1,0,1, 1,0,1, 1,1,0, 0,1,1], // Q
    [1,1,0, 1,0,1, 1,1,0, 1,0,1, 1,0,1], // R
    [0,1,1, 1,0,0, 0,1,0, 0,0,1, 1,1,0], // S
    [1,1,1, 0,1,0, 0,1,0, 0,1,0, 0,1,0], // T
    [1,0,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // U
    [1,0,1, 1,0,1, 1,0,1, 1,0,1, 0,1,0], // V
    [1,0,1, 1,0,1, 1,1,1, 1,1,1, 1,0,1], // W
    [1,0,1, 1,0,1, 0,1,0, 1,0,1, 1,0,1], // X
    [1,0,1, 1,0,1, 0,1,0, 0,1,0, 0,1,0], // Y
    [1,1,1, 0,0,1, 0,1,0, 1,0,0, 1,1,1], // Z
];

#[rustfmt::skip]
const BANG: [u8; 15] = [0,1,0, 0,1,0, 0,1,0, 0,0,0, 0,1,0];

fn glyph(ch: char) -> Option<&'static [u8; 15]> {
    match ch {
        '0'..='9' => Some(&DIGITS[ch as usize - '0' as usize]),
        'A'..='Z' => Some(&LETTERS[ch as usize - 'A' as usize]),
        'a'..='z' => Some(&LETTERS[ch as usize - 'a' as usize]),
        '!' => Some(&BANG),
        _ => None,
    }
}

fn text_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * 4 * scale - scale // 3px per glyph + 1px spacing
}

fn draw_text(buf: &mut PixelBuf, cx: i32, y: i32, text: &str, scale: i32, color: Rgb) {
    let start_x = cx - text_width(text, scale) / 2;
    for (i, ch) in text.chars().enumerate() {
        let Some(g) = glyph(ch) else { continue };
        let gx = start_x + i as i32 * 4 * scale;
        for row in 0..5i32 {
            for col in 0..3i32 {
                if g[(row * 3 + col) as usize] == 1 {
                    buf.fill_rect(gx + col * scale, y + row * scale, scale, scale, color);
                }
            }
        }
    }
}

/// Like draw_text, but spun around the text center.
fn draw_text_rotated(
    buf: &mut PixelBuf,
    cx: i32,
    cy: i32,
    text: &str,
    scale: i32,
    rot: f64,
    color: Rgb,
) {
    let w = text_width(text, scale);
    let h = 5 * scale;
    let (sin, cos) = rot.sin_cos();
    for (i, ch) in text.chars().enumerate() {
        let Some(g) = glyph(ch) else { continue };
        for row in 0..5i32 {
            for col in 0..3i32 {
                if g[(row * 3 + col) as usize] != 1 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let dx = (i as i32 * 4 * scale + col * scale + sx - w / 2) as f64;
                        let dy = (row * scale + sy - h / 2) as f64;
                        let rx = dx * cos - dy * sin;
                        let ry = dx * sin + dy * cos;
                        buf.set(cx + rx.round() as i32, cy + ry.round() as i32, color);
                    }
                }
            }
        }
    }
}

// ── Game ────────────────────────────────────────────────────────────────────

// Simulation runs in world units; only drawing divides by this, so a terminal
// cell grid behaves like a window a few hundred units across.
const UNITS_PER_PIXEL: f64 = 8.0;

const GRAVITY: f64 = 0.7;
const JUMP_STRENGTH: f64 = -16.0;
const MAX_JUMPS: u8 = 2;
const PLAYER_RADIUS: f64 = 15.0;

const PICKLE_COUNT: usize = 10;
const PICKLE_SIZE: f64 = 40.0;
const BASE_SCROLL_SPEED: f64 = 2.6;
const SCROLL_SPEED_STEP: f64 = 0.18;
const BOB_STEP: f64 = 0.04;
const BOB_AMPLITUDE: f64 = 14.0;

const CONFETTI_COUNT: usize = 35;
const CONFETTI_WORDS: [&str; 6] = ["sort", "of", "confetti", "pickle", "crunch", "yum"];

struct Player {
    x: f64,
    y: f64,
    r: f64,
    vy: f64,
    jumps: u8,
}

struct Pickle {
    x: f64,
    base_y: f64,
    y: f64,
    bob: f64,
    size: f64,
    collected: bool,
}

struct Confetti {
    word: &'static str,
    x: f64,
    y: f64,
    vy: f64,
    size: f64,
    rot: f64,
}

/// Win is terminal: triggers are ignored there and only a relaunch starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Playing,
    Win,
}

struct Game {
    w: f64, // world width
    h: f64,
    state: State,
    player: Player,
    pickles: Vec<Pickle>,
    confetti: Vec<Confetti>,
    collected: u32,
    scroll_speed: f64,
    gravity: f64,
    jump_strength: f64,
    show_hud: bool,
    rng: Pcg32,
}

impl Game {
    fn new(w: f64, h: f64, seed: u64) -> Self {
        let mut g = Game {
            w,
            h,
            state: State::Start,
            player: Player {
                x: 0.0,
                y: 0.0,
                r: PLAYER_RADIUS,
                vy: 0.0,
                jumps: 0,
            },
            pickles: Vec::new(),
            confetti: Vec::new(),
            collected: 0,
            scroll_speed: BASE_SCROLL_SPEED,
            gravity: GRAVITY,
            jump_strength: JUMP_STRENGTH,
            show_hud: false,
            rng: Pcg32::seed_from_u64(seed),
        };
        g.create_pickles();
        g
    }

    /// Placement reads whatever the dimensions are right now; entities already
    /// on the field stay where they are until the next run rebuilds them.
    fn resize(&mut self, w: f64, h: f64) {
        self.w = w;
        self.h = h;
    }

    fn ground_y(&self) -> f64 {
        self.h * 0.7
    }

    fn create_pickles(&mut self) {
        self.pickles.clear();
        self.collected = 0;
        self.scroll_speed = BASE_SCROLL_SPEED;

        let spacing = self.w * 0.65;
        let min_y = self.h * 0.38;
        let max_y = self.h * 0.68;

        for i in 0..PICKLE_COUNT {
            let base_y = self.rng.random_range(min_y..max_y);
            self.pickles.push(Pickle {
                x: spacing * (i as f64 + 1.0),
                base_y,
                y: base_y,
                bob: self.rng.random_range(0.0..TAU),
                size: PICKLE_SIZE,
                collected: false,
            });
        }

        self.player.x = self.w * 0.2;
        self.player.y = self.ground_y();
        self.player.vy = 0.0;
        self.player.jumps = 0;
    }

    fn create_confetti(&mut self) {
        self.confetti.clear();
        for _ in 0..CONFETTI_COUNT {
            let word = CONFETTI_WORDS[self.rng.random_range(0..CONFETTI_WORDS.len())];
            self.confetti.push(Confetti {
                word,
                x: self.rng.random_range(0.0..self.w),
                y: self.h + self.rng.random_range(0.0..self.h),
                vy: self.rng.random_range(0.8..2.3),
                size: self.rng.random_range(12.0..22.0),
                rot: self.rng.random_range(0.0..TAU),
            });
        }
    }

    fn jump(&mut self) {
        match self.state {
            State::Start => {
                self.state = State::Playing;
                self.create_pickles();
            }
            State::Playing => {
                if self.player.jumps < MAX_JUMPS {
                    self.player.vy = self.jump_strength;
                    self.player.jumps += 1;
                }
            }
            State::Win => {}
        }
    }

    /// Advances one frame. Returns how many pickles were collected so the
    /// caller can map collections to tones.
    fn update(&mut self) -> u32 {
        match self.state {
            State::Start => 0,
            State::Playing => self.step_run(),
            State::Win => {
                for c in &mut self.confetti {
                    c.y -= c.vy;
                    if c.y < -20.0 {
                        c.y = self.h + 20.0;
                    }
                }
                0
            }
        }
    }

    fn step_run(&mut self) -> u32 {
        self.player.vy += self.gravity;
        self.player.y += self.player.vy;

        // Ground clamp refills the jump budget
        let ground = self.ground_y();
        if self.player.y > ground {
            self.player.y = ground;
            self.player.vy = 0.0;
            self.player.jumps = 0;
        }

        for p in &mut self.pickles {
            p.x -= self.scroll_speed;
            p.bob += BOB_STEP;
            p.y = p.base_y + p.bob.sin() * BOB_AMPLITUDE;
        }

        let mut picked = 0;
        for i in 0..self.pickles.len() {
            if self.pickles[i].collected {
                continue;
            }
            let dx = self.player.x - self.pickles[i].x;
            let dy = self.player.y - self.pickles[i].y;
            if dx.hypot(dy) < self.player.r + self.pickles[i].size / 2.0 {
                self.pickles[i].collected = true;
                self.collected += 1;
                self.scroll_speed += SCROLL_SPEED_STEP;
                picked += 1;

                if self.collected as usize == PICKLE_COUNT {
                    self.state = State::Win;
                    self.create_confetti();
                }
            }
        }

        // A pickle that escapes past the left edge ends the run; the stale
        // field stays up until the next run rebuilds it.
        if self
            .pickles
            .iter()
            .any(|p| !p.collected && p.x + p.size < 0.0)
        {
            self.state = State::Start;
        }

        picked
    }

    fn tune_gravity(&mut self, delta: f64) {
        self.show_hud = true;
        self.gravity = (self.gravity + delta).max(0.05);
    }

    fn tune_jump(&mut self, delta: f64) {
        self.show_hud = true;
        self.jump_strength = (self.jump_strength + delta).min(-1.0);
    }

    fn draw(&self, buf: &mut PixelBuf) {
        buf.fill(BACKDROP);
        match self.state {
            State::Start => self.draw_instructions(buf),
            State::Playing => self.draw_run(buf),
            State::Win => self.draw_celebration(buf),
        }
        if self.show_hud {
            self.draw_tuning_hud(buf);
        }
    }

    fn draw_instructions(&self, buf: &mut PixelBuf) {
        let cx = to_px(self.w / 2.0);
        let mid = self.h / 2.0;
        draw_text(buf, cx, to_px(mid - 48.0), "COLLECT ALL THE PICKLES", 1, INK);
        draw_text(buf, cx, to_px(mid + 8.0), "TAP THE SCREEN TO JUMP", 1, INK);
    }

    fn draw_run(&self, buf: &mut PixelBuf) {
        buf.fill_circle(
            to_px(self.player.x),
            to_px(self.player.y),
            Ord::max(to_px(self.player.r), 1),
            INK,
        );
        for p in &self.pickles {
            if !p.collected {
                draw_pickle(buf, to_px(p.x), to_px(p.y), to_px(p.size));
            }
        }
    }

    fn draw_celebration(&self, buf: &mut PixelBuf) {
        for c in &self.confetti {
            let scale = (c.size / 11.0).round().max(1.0) as i32;
            draw_text_rotated(buf, to_px(c.x), to_px(c.y), c.word, scale, c.rot, INK);
        }
        let cx = to_px(self.w / 2.0);
        // Drop to 1x glyphs when the buffer is too narrow for the big ones
        let big = if buf.w as i32 >= text_width("PICKLETASTIC!", 2) { 2 } else { 1 };
        draw_text(buf, cx, to_px(self.h * 0.32), "PICKLETASTIC!", big, INK);
        draw_text(buf, cx, to_px(self.h * 0.54), "CODE", 1, INK);
        draw_text(buf, cx, to_px(self.h * 0.66), "1 3 7", big, INK);
    }

    fn draw_tuning_hud(&self, buf: &mut PixelBuf) {
        // G=gravity J=jump, shown as value * 100 / value * 10
        let g_val = (self.gravity * 100.0) as u32;
        let j_val = (-self.jump_strength * 10.0) as u32;

        let x = buf.w as i32 - 10;
        let y = buf.h as i32;
        draw_text(buf, x, y - 14, &g_val.to_string(), 1, HUD_GRAVITY);
        draw_text(buf, x, y - 7, &j_val.to_string(), 1, HUD_JUMP);
    }
}

fn to_px(v: f64) -> i32 {
    (v / UNITS_PER_PIXEL).round() as i32
}

fn draw_pickle(buf: &mut PixelBuf, cx: i32, cy: i32, size_px: i32) {
    let rx = Ord::max(size_px / 2, 2);
    let ry = ((rx as f64) * 0.6).round().max(1.0) as i32;
    for dy in -ry..=ry {
        for dx in -rx..=rx {
            let nx = dx as f64 / rx as f64;
            let ny = dy as f64 / ry as f64;
            if nx * nx + ny * ny > 1.0 {
                continue;
            }
            // Lit from above, with speckles
            let t = Ord::min(((ny + 1.0) * 128.0) as u16, 256);
            let mut c = Rgb::lerp(PICKLE_HI, PICKLE_DARK, t);
            if (dx * 5 + dy * 3).rem_euclid(7) == 0 {
                c = PICKLE_SPOT;
            }
            buf.set(cx + dx, cy + dy, c);
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut out = stdout();
    execute!(
        out,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::DisableLineWrap,
        event::EnableMouseCapture,
    )?;

    let cleanup = |out: &mut io::Stdout| -> io::Result<()> {
        execute!(
            out,
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show,
            terminal::EnableLineWrap,
        )?;
        terminal::disable_raw_mode()
    };

    let (cols, rows) = terminal::size()?;
    let pw = cols as usize;
    let ph = rows as usize * 2;

    let mut buf = PixelBuf::new(pw, ph);
    let mut game = Game::new(
        pw as f64 * UNITS_PER_PIXEL,
        ph as f64 * UNITS_PER_PIXEL,
        rand::random::<u64>(),
    );
    let mut audio = AudioCue::new();

    let frame_dur = Duration::from_millis(16); // ~60 fps

    loop {
        let frame_start = Instant::now();

        // Input
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        cleanup(&mut out)?;
                        return Ok(());
                    }
                    KeyCode::Char(' ') | KeyCode::Up | KeyCode::Enter => {
                        audio.ensure_initialized();
                        game.jump();
                    }
                    // Tuning: a/z = gravity, s/x = jump strength
                    KeyCode::Char('a') => game.tune_gravity(0.02),
                    KeyCode::Char('z') => game.tune_gravity(-0.02),
                    KeyCode::Char('s') => game.tune_jump(-0.5),
                    KeyCode::Char('x') => game.tune_jump(0.5),
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    if let MouseEventKind::Down(_) = mouse.kind {
                        audio.ensure_initialized();
                        game.jump();
                    }
                }
                Event::Resize(c, r) => {
                    let npw = c as usize;
                    let nph = r as usize * 2;
                    buf.resize(npw, nph);
                    game.resize(npw as f64 * UNITS_PER_PIXEL, nph as f64 * UNITS_PER_PIXEL);
                }
                _ => {}
            }
        }

        // Update
        let picked = game.update();
        for _ in 0..picked {
            audio.play_collect_tone(rand::random_range(220.0..520.0));
        }

        // Render
        game.draw(&mut buf);
        buf.render(&mut out)?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < frame_dur {
            std::thread::sleep(frame_dur - elapsed);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session() -> Game {
        Game::new(960.0, 540.0, 7)
    }

    /// Parks a pickle so the next update scrolls it onto the player.
    fn park_pickle_on_player(game: &mut Game, i: usize) {
        game.pickles[i].x = game.player.x + game.scroll_speed;
        game.pickles[i].base_y = game.player.y;
        game.pickles[i].bob = 0.0;
    }

    #[test]
    fn fresh_session_waits_on_instructions() {
        let mut game = session();
        assert_eq!(game.state, State::Start);
        assert_eq!(game.pickles.len(), 10);
        assert_eq!(game.collected, 0);
        assert_eq!(game.scroll_speed, BASE_SCROLL_SPEED);

        // Nothing moves until the first trigger
        let before = game.player.y;
        assert_eq!(game.update(), 0);
        assert_eq!(game.player.y, before);
    }

    #[test]
    fn first_trigger_starts_a_fresh_run() {
        let mut game = session();
        game.pickles[0].x = -999.0; // stale leftovers must be replaced

        game.jump();
        assert_eq!(game.state, State::Playing);
        assert_eq!(game.pickles.len(), 10);
        assert_eq!(game.pickles[0].x, 960.0 * 0.65);
        assert_eq!(game.player.x, 960.0 * 0.2);
        assert_eq!(game.player.y, 540.0 * 0.7);
        assert_eq!(game.player.jumps, 0);

        // Entering the run is not itself a jump
        assert_eq!(game.player.vy, 0.0);
    }

    #[test]
    fn double_jump_allowed_third_ignored() {
        let mut game = session();
        game.jump(); // enter Playing

        game.jump();
        assert_eq!(game.player.vy, JUMP_STRENGTH);
        assert_eq!(game.player.jumps, 1);

        game.jump();
        assert_eq!(game.player.vy, JUMP_STRENGTH);
        assert_eq!(game.player.jumps, 2);

        // Airborne with no budget left: the trigger is a no-op
        game.update();
        let vy = game.player.vy;
        assert!(vy != JUMP_STRENGTH);
        game.jump();
        assert_eq!(game.player.vy, vy);
        assert_eq!(game.player.jumps, 2);
    }

    #[test]
    fn landing_refills_jump_budget() {
        let mut game = session();
        game.jump();
        game.jump();
        game.jump();
        assert_eq!(game.player.jumps, 2);

        let mut landed = false;
        for _ in 0..200 {
            game.update();
            if game.player.y == game.ground_y() {
                landed = true;
                break;
            }
        }
        assert!(landed);
        assert_eq!(game.player.vy, 0.0);
        assert_eq!(game.player.jumps, 0);
    }

    #[test]
    fn grounded_player_stays_clamped() {
        let mut game = session();
        game.jump();
        for _ in 0..50 {
            game.update();
            assert!(game.player.y <= game.ground_y());
        }
        assert_eq!(game.player.y, game.ground_y());
    }

    #[test]
    fn collection_updates_counters_and_speed() {
        let mut game = session();
        game.jump();
        park_pickle_on_player(&mut game, 0);

        let picked = game.update();
        assert_eq!(picked, 1);
        assert!(game.pickles[0].collected);
        assert_eq!(game.collected, 1);
        assert!((game.scroll_speed - 2.78).abs() < 1e-9);
        assert_eq!(game.state, State::Playing);
    }

    #[test]
    fn collected_pickles_are_ignored_afterwards() {
        let mut game = session();
        game.jump();
        park_pickle_on_player(&mut game, 0);
        game.update();
        assert_eq!(game.collected, 1);

        // Parked again, but an already-collected pickle never re-collects
        park_pickle_on_player(&mut game, 0);
        let picked = game.update();
        assert_eq!(picked, 0);
        assert_eq!(game.collected, 1);
    }

    #[test]
    fn collecting_all_ten_wins_with_confetti() {
        let mut game = session();
        game.jump();
        for i in 0..10 {
            park_pickle_on_player(&mut game, i);
        }

        let picked = game.update();
        assert_eq!(picked, 10);
        assert_eq!(game.collected, 10);
        assert_eq!(game.state, State::Win);
        assert_eq!(game.confetti.len(), CONFETTI_COUNT);
        assert!((game.scroll_speed - (2.6 + 10.0 * 0.18)).abs() < 1e-9);
    }

    #[test]
    fn escaped_pickle_ends_the_run() {
        let mut game = session();
        game.jump();
        game.pickles[0].x = -45.0; // past the left edge after the next scroll

        game.update();
        assert_eq!(game.state, State::Start);

        // Stale field stays up; the next trigger rebuilds it
        assert_eq!(game.pickles.len(), 10);
        assert!(game.pickles[0].x + game.pickles[0].size < 0.0);
        game.jump();
        assert_eq!(game.state, State::Playing);
        assert!(game.pickles[0].x > 0.0);
    }

    #[test]
    fn win_ignores_jump_triggers() {
        let mut game = session();
        game.jump();
        for i in 0..10 {
            park_pickle_on_player(&mut game, i);
        }
        game.update();
        assert_eq!(game.state, State::Win);

        let vy = game.player.vy;
        let jumps = game.player.jumps;
        game.jump();
        assert_eq!(game.state, State::Win);
        assert_eq!(game.player.vy, vy);
        assert_eq!(game.player.jumps, jumps);
    }

    #[test]
    fn confetti_rises_and_recycles() {
        let mut game = session();
        game.jump();
        for i in 0..10 {
            park_pickle_on_player(&mut game, i);
        }
        game.update();

        game.confetti[0].y = -19.5; // crosses the top threshold next frame
        game.confetti[1].y = 300.0;
        let vy1 = game.confetti[1].vy;

        game.update();
        assert_eq!(game.confetti[0].y, game.h + 20.0);
        assert!((game.confetti[1].y - (300.0 - vy1)).abs() < 1e-12);
    }

    #[test]
    fn confetti_spawns_inside_expected_ranges() {
        let mut game = session();
        game.create_confetti();
        assert_eq!(game.confetti.len(), CONFETTI_COUNT);
        for c in &game.confetti {
            assert!(c.x >= 0.0 && c.x < game.w);
            assert!(c.y >= game.h && c.y < game.h * 2.0);
            assert!(c.vy >= 0.8 && c.vy < 2.3);
            assert!(c.size >= 12.0 && c.size < 22.0);
            assert!(c.rot >= 0.0 && c.rot < TAU);
            assert!(CONFETTI_WORDS.contains(&c.word));
        }
    }

    #[test]
    fn pickles_bob_around_their_base_height() {
        let mut game = session();
        game.jump();
        game.pickles[0].bob = 1.0;
        game.pickles[0].base_y = 400.0;
        let x0 = game.pickles[0].x;

        game.update();
        let p = &game.pickles[0];
        assert!((p.bob - 1.04).abs() < 1e-12);
        assert!((p.y - (400.0 + 1.04f64.sin() * BOB_AMPLITUDE)).abs() < 1e-9);
        assert!((p.x - (x0 - BASE_SCROLL_SPEED)).abs() < 1e-9);
    }

    #[test]
    fn pickle_placement_respects_spacing_and_band() {
        let mut game = session();
        game.jump();
        let spacing = game.w * 0.65;
        for (i, p) in game.pickles.iter().enumerate() {
            assert!((p.x - spacing * (i as f64 + 1.0)).abs() < 1e-9);
            assert!(p.base_y >= game.h * 0.38 && p.base_y < game.h * 0.68);
            assert_eq!(p.size, PICKLE_SIZE);
            assert!(!p.collected);
        }
    }

    #[test]
    fn resize_moves_no_entities() {
        let mut game = session();
        game.jump();
        let xs: Vec<f64> = game.pickles.iter().map(|p| p.x).collect();
        let (px, py) = (game.player.x, game.player.y);

        game.resize(1280.0, 720.0);
        assert_eq!(game.w, 1280.0);
        assert_eq!(game.h, 720.0);
        assert_eq!(game.player.x, px);
        assert_eq!(game.player.y, py);
        for (p, x) in game.pickles.iter().zip(xs) {
            assert_eq!(p.x, x);
        }
        // The ground line follows the new dimensions
        assert_eq!(game.ground_y(), 720.0 * 0.7);
    }

    #[test]
    fn same_seed_same_field() {
        let a = Game::new(960.0, 540.0, 42);
        let b = Game::new(960.0, 540.0, 42);
        for (pa, pb) in a.pickles.iter().zip(&b.pickles) {
            assert_eq!(pa.base_y, pb.base_y);
            assert_eq!(pa.bob, pb.bob);
        }
    }

    #[test]
    fn overlay_strings_have_glyphs() {
        let mut chars: Vec<char> = CONFETTI_WORDS.concat().chars().collect();
        chars.extend("PICKLETASTIC!CODE137".chars());
        chars.extend("COLLECT ALL THE PICKLES".chars());
        chars.extend("TAP THE SCREEN TO JUMP".chars());
        for ch in chars {
            if ch != ' ' {
                assert!(glyph(ch).is_some(), "no glyph for {ch:?}");
            }
        }
    }

    #[test]
    fn pixel_buf_clips_out_of_bounds_draws() {
        let mut buf = PixelBuf::new(10, 10);
        buf.set(-5, -5, INK);
        buf.set(100, 3, INK);
        buf.fill_rect(8, 8, 6, 6, INK);
        buf.fill_circle(0, 0, 4, INK);
        draw_text(&mut buf, 5, 2, "PICKLE", 1, INK);
        draw_text_rotated(&mut buf, 5, 5, "YUM", 2, 1.3, INK);
        assert_eq!(buf.get(9, 9), INK);
        assert_eq!(buf.get(0, 0), INK);
    }

    proptest! {
        #[test]
        fn player_never_sinks_below_ground(
            seed in any::<u64>(),
            presses in proptest::collection::vec(any::<bool>(), 1..240),
        ) {
            let mut game = Game::new(960.0, 540.0, seed);
            game.jump();
            for press in presses {
                if press {
                    game.jump();
                }
                game.update();
                prop_assert!(game.player.y <= game.ground_y() + 1e-9);
            }
        }

        #[test]
        fn run_counters_never_regress(
            seed in any::<u64>(),
            presses in proptest::collection::vec(any::<bool>(), 1..600),
        ) {
            let mut game = Game::new(960.0, 540.0, seed);
            game.jump();
            let mut last_collected = game.collected;
            let mut last_speed = game.scroll_speed;
            for press in presses {
                if press {
                    let was_start = game.state == State::Start;
                    game.jump();
                    if was_start {
                        // A fresh run resets both counters
                        last_collected = game.collected;
                        last_speed = game.scroll_speed;
                    }
                }
                game.update();
                prop_assert!(game.collected >= last_collected);
                prop_assert!(game.collected <= 10);
                prop_assert!(game.scroll_speed >= last_speed);
                last_collected = game.collected;
                last_speed = game.scroll_speed;
            }
        }
    }
}
