//! ASS (Advanced SubStation Alpha) rendering of karaoke caption tracks
//!
//! Each [`CaptionEvent`] becomes one `Dialogue` line showing the whole phrase,
//! with a colour override in front of every word so the highlighted word
//! stands out and the rest share the base colour.

use std::fmt::Write as FmtWrite;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CaptionTrack;
use crate::config::{CanvasConfig, CaptionConfig};
use crate::error::Result;
use crate::timing::CaptionEvent;

/// Style configuration for the caption style line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    /// Primary color (&HAABBGGRR)
    pub primary_color: String,
    pub secondary_color: String,
    pub outline_color: String,
    /// Background/shadow color
    pub back_color: String,
    pub bold: bool,
    pub outline: f32,
    pub shadow: f32,
    /// Alignment (numpad style: 1-9)
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl SubtitleStyle {
    /// Bold centred karaoke style: no box, soft outline and shadow
    #[must_use]
    pub fn karaoke(config: &CaptionConfig) -> Self {
        Self {
            name: "Default".to_string(),
            font_name: config.font_name.clone(),
            font_size: config.font_size,
            primary_color: "&H00FFFFFF".to_string(),
            secondary_color: "&H00FFFFFF".to_string(),
            outline_color: "&H40000000".to_string(),
            back_color: "&H00000000".to_string(),
            bold: true,
            outline: config.outline,
            shadow: config.shadow,
            alignment: 5,
            margin_l: config.safe_side,
            margin_r: config.safe_side,
            margin_v: 0,
        }
    }

    /// Format as ASS style line
    fn to_ass_line(&self) -> String {
        format!(
            "Style: {},{},{},{},{},{},{},{},0,0,0,100,100,0,0,1,{},{},{},{},{},{},1",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_color,
            self.secondary_color,
            self.outline_color,
            self.back_color,
            if self.bold { -1 } else { 0 },
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v
        )
    }
}

/// Format seconds as an ASS timestamp (H:MM:SS.cc).
#[must_use]
pub fn format_ass_time(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let secs = (centis % 6_000) / 100;
    let cs = centis % 100;
    format!("{hours}:{minutes:02}:{secs:02}.{cs:02}")
}

/// Escape override-block characters in caption text
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

/// ASS writer for karaoke caption tracks
#[derive(Debug, Clone)]
pub struct AssWriter {
    play_res_x: u32,
    play_res_y: u32,
    style: SubtitleStyle,
    highlight_color: String,
    base_color: String,
    uppercase: bool,
    /// Anchor point of every line, centre of the safe region
    anchor: (u32, u32),
    title: String,
}

impl AssWriter {
    #[must_use]
    pub fn new(canvas: &CanvasConfig, config: &CaptionConfig) -> Self {
        let top = (canvas.height as f32 * config.safe_top.clamp(0.0, 1.0)) as u32;
        let bottom_margin = (canvas.height as f32 * config.safe_bottom.clamp(0.0, 1.0)) as u32;
        let bottom = canvas.height.saturating_sub(bottom_margin).max(top);

        Self {
            play_res_x: canvas.width,
            play_res_y: canvas.height,
            style: SubtitleStyle::karaoke(config),
            highlight_color: config.highlight_color.clone(),
            base_color: config.base_color.clone(),
            uppercase: config.uppercase,
            anchor: (canvas.width / 2, (top + bottom) / 2),
            title: "Karaoke Captions".to_string(),
        }
    }

    /// Generate ASS header
    fn write_header(&self, out: &mut String) -> std::fmt::Result {
        // Script Info section
        writeln!(out, "[Script Info]")?;
        writeln!(out, "Title: {}", self.title)?;
        writeln!(out, "ScriptType: v4.00+")?;
        writeln!(out, "WrapStyle: 0")?;
        writeln!(out, "ScaledBorderAndShadow: yes")?;
        writeln!(out, "PlayResX: {}", self.play_res_x)?;
        writeln!(out, "PlayResY: {}", self.play_res_y)?;
        writeln!(out)?;

        // Styles section
        writeln!(out, "[V4+ Styles]")?;
        writeln!(
            out,
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
             OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, \
             ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, \
             MarginL, MarginR, MarginV, Encoding"
        )?;
        writeln!(out, "{}", self.style.to_ass_line())?;
        writeln!(out)?;

        // Events section header
        writeln!(out, "[Events]")?;
        writeln!(
            out,
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
        )
    }

    /// Override-tagged text for one event.
    #[must_use]
    pub fn karaoke_text(&self, event: &CaptionEvent) -> String {
        let (x, y) = self.anchor;
        let words: Vec<String> = event
            .words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let color = if i == event.highlight {
                    &self.highlight_color
                } else {
                    &self.base_color
                };
                let word = if self.uppercase {
                    word.to_uppercase()
                } else {
                    word.clone()
                };
                format!("{{\\c{color}}}{}", escape(&word))
            })
            .collect();

        format!("{{\\an5\\pos({x},{y})}}{}", words.join(" "))
    }

    /// Render a whole track.
    pub fn render(&self, track: &CaptionTrack) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();
        self.write_header(&mut out)?;

        for event in &track.events {
            writeln!(
                out,
                "Dialogue: 0,{},{},{},,0,0,0,,{}",
                format_ass_time(event.start),
                format_ass_time(event.end),
                self.style.name,
                self.karaoke_text(event)
            )?;
        }

        Ok(out)
    }

    /// Render `track` and write it to `path`.
    pub async fn write_to_file(&self, track: &CaptionTrack, path: &Path) -> Result<()> {
        let content = self.render(track)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
