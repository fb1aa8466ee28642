//! Render a transcription into a document format.

#[cfg(test)]
use downpour_core::Segment;
use downpour_core::{CoreError, CoreResult, TranscriptFormat, Transcription};

/// Render `transcription` as the given format.
pub fn render(transcription: &Transcription, format: TranscriptFormat) -> CoreResult<String> {
    match format {
        TranscriptFormat::Txt => Ok(render_txt(transcription)),
        TranscriptFormat::Srt => Ok(render_srt(transcription)),
        TranscriptFormat::Vtt => Ok(render_vtt(transcription)),
        TranscriptFormat::Json => serde_json::to_string_pretty(transcription)
            .map_err(|e| CoreError::wrap("Transcriber.Export", e)),
    }
}

fn render_txt(transcription: &Transcription) -> String {
    let mut out = String::new();
    for segment in &transcription.segments {
        out.push_str(segment.text.trim());
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str(transcription.text.trim());
        out.push('\n');
    }
    out
}

fn render_srt(transcription: &Transcription) -> String {
    let mut out = String::new();
    for (index, segment) in transcription.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            timestamp(segment.start, ','),
            timestamp(segment.end, ','),
            segment.text.trim()
        ));
    }
    out
}

fn render_vtt(transcription: &Transcription) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in &transcription.segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            timestamp(segment.start, '.'),
            timestamp(segment.end, '.'),
            segment.text.trim()
        ));
    }
    out
}

/// `HH:MM:SS<sep>mmm` from seconds.
fn timestamp(seconds: f64, millis_sep: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis_sep,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcription {
        Transcription {
            text: "Hello world. Goodbye.".to_string(),
            segments: vec![
                Segment {
                    start: 0.0,
                    end: 2.5,
                    text: " Hello world.".to_string(),
                },
                Segment {
                    start: 2.5,
                    end: 3661.25,
                    text: " Goodbye.".to_string(),
                },
            ],
            language: "en".to_string(),
            duration: 3661.25,
        }
    }

    #[test]
    fn txt_is_one_segment_per_line() {
        assert_eq!(
            render(&sample(), TranscriptFormat::Txt).unwrap(),
            "Hello world.\nGoodbye.\n"
        );
    }

    #[test]
    fn srt_uses_comma_millis_and_indices() {
        let srt = render(&sample(), TranscriptFormat::Srt).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,500\nHello world.\n"));
        assert!(srt.contains("2\n00:00:02,500 --> 01:01:01,250\nGoodbye.\n"));
    }

    #[test]
    fn vtt_has_header_and_dot_millis() {
        let vtt = render(&sample(), TranscriptFormat::Vtt).unwrap();
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:02.500"));
    }

    #[test]
    fn json_round_trips() {
        let json = render(&sample(), TranscriptFormat::Json).unwrap();
        let parsed: Transcription = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.segments, sample().segments);
    }
}
