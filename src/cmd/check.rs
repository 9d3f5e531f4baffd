use anyhow::Result;

use reelsmith::config::TranscriptionBackend;
use reelsmith::{Config, FfmpegTranscoder, FfprobeProbe, WhisperCli};

pub async fn cmd_check(config: &Config) -> Result<()> {
    println!("🔧 Checking external tools\n");

    let mut results = vec![
        (
            format!("ffmpeg ({})", config.tools.ffmpeg_path),
            FfmpegTranscoder::new(&config.tools.ffmpeg_path).check_available().await,
            true,
        ),
        (
            format!("ffprobe ({})", config.tools.ffprobe_path),
            FfprobeProbe::new(&config.tools.ffprobe_path).check_available().await,
            true,
        ),
    ];

    let whisper_required = config.transcription.backends.contains(&TranscriptionBackend::WhisperCli);
    let whisper = WhisperCli::new(&config.transcription);
    results.push((
        format!("whisper ({})", config.transcription.whisper_path),
        whisper.check_available().await,
        whisper_required,
    ));

    for (name, ok, required) in &results {
        let mark = match (ok, required) {
            (true, _) => "✅",
            (false, true) => "❌",
            (false, false) => "➖",
        };
        println!("   {mark} {name}");
    }

    let keys = [
        ("ELEVENLABS_API_KEY", config.speech.api_key.is_some()),
        ("PEXELS_API_KEY", config.footage.api_key.is_some()),
        ("OPENAI_API_KEY", config.transcription.api_key.is_some()),
    ];
    println!();
    for (name, set) in keys {
        println!("   {} {name}", if set { "🔑" } else { "➖" });
    }

    let missing = results.iter().filter(|(_, ok, required)| *required && !ok).count();
    if missing == 0 {
        println!("\n✅ All required tools available");
    } else {
        println!("\n⚠️  {missing} required tool(s) missing");
    }
    Ok(())
}
