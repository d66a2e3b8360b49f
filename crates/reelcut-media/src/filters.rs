//! FFmpeg filter graphs for every derived output.

use crate::letterbox::CropRect;

/// Landscape clips are scaled to this height, width follows the source aspect.
pub const LANDSCAPE_HEIGHT: u32 = 1080;

/// Vertical canvas for 9:16 clips and shorts.
pub const VERTICAL_WIDTH: u32 = 1080;
pub const VERTICAL_HEIGHT: u32 = 1920;

/// Black-bar detection parameters (limit:round:reset).
pub const CROPDETECT: &str = "cropdetect=24:16:0";

/// Animated loop frame rate and width.
pub const LOOP_FPS: u32 = 12;
pub const LOOP_WIDTH: u32 = 480;

/// Still frames are bounded by this box.
pub const STILL_MAX_WIDTH: u32 = 1920;
pub const STILL_MAX_HEIGHT: u32 = 1080;

/// 16:9 scale, keeping an even width.
pub fn landscape_scale() -> String {
    format!("scale=-2:{}", LANDSCAPE_HEIGHT)
}

/// Fill the vertical canvas and center-crop the overflow.
///
/// A detected letterbox crop is applied first so bars never reach the output.
pub fn vertical_fill(letterbox: Option<CropRect>) -> String {
    let fill = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = VERTICAL_WIDTH,
        h = VERTICAL_HEIGHT
    );
    match letterbox {
        Some(rect) => format!("{},{}", rect.to_filter(), fill),
        None => fill,
    }
}

/// Color fade in at 0 and out ending at `clip_secs`.
pub fn video_fade(clip_secs: f64, fade_secs: f64) -> String {
    format!(
        "fade=t=in:st=0:d={f:.3},fade=t=out:st={out:.3}:d={f:.3}",
        f = fade_secs,
        out = (clip_secs - fade_secs).max(0.0)
    )
}

/// Exponential audio fade in and out.
pub fn audio_fade(clip_secs: f64, fade_secs: f64) -> String {
    format!(
        "afade=t=in:st=0:d={f:.3}:curve=exp,afade=t=out:st={out:.3}:d={f:.3}:curve=exp",
        f = fade_secs,
        out = (clip_secs - fade_secs).max(0.0)
    )
}

fn loop_base() -> String {
    format!("fps={},scale={}:-1:flags=lanczos", LOOP_FPS, LOOP_WIDTH)
}

/// First loop pass: derive an optimal 256-color palette.
pub fn loop_palettegen() -> String {
    format!("{},palettegen=stats_mode=diff", loop_base())
}

/// Second loop pass: input 0 is the video, input 1 the palette.
pub fn loop_paletteuse() -> String {
    format!("[0:v]{}[x];[x][1:v]paletteuse=dither=bayer:bayer_scale=5", loop_base())
}

/// Downscale to fit the still box, never upscale.
pub fn still_scale() -> String {
    format!(
        "scale=w='min({mw},iw)':h='min({mh},ih)':force_original_aspect_ratio=decrease",
        mw = STILL_MAX_WIDTH,
        mh = STILL_MAX_HEIGHT
    )
}

/// Time-reverse a whole (short) input.
pub const REVERSE: &str = "reverse";

/// Join input 0 and input 1 back to back, video only.
pub const CONCAT_BOOMERANG: &str = "[0:v][1:v]concat=n=2:v=1:a=0[v]";

/// Join a list of filters into one chain, skipping empties.
pub fn chain<I, S>(filters: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .filter(|f| !f.as_ref().is_empty())
        .map(|f| f.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_fill_with_letterbox() {
        let rect = CropRect { width: 1920, height: 800, x: 0, y: 140 };
        assert_eq!(
            vertical_fill(Some(rect)),
            "crop=1920:800:0:140,scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920"
        );
        assert!(!vertical_fill(None).starts_with("crop=1920"));
    }

    #[test]
    fn test_fades_end_at_clip_end() {
        assert_eq!(
            video_fade(10.0, 1.0),
            "fade=t=in:st=0:d=1.000,fade=t=out:st=9.000:d=1.000"
        );
        assert!(audio_fade(10.0, 0.5).contains("st=9.500:d=0.500:curve=exp"));
    }

    #[test]
    fn test_chain_skips_empty() {
        assert_eq!(chain(["scale=-2:1080", "", "fade=t=in"]), "scale=-2:1080,fade=t=in");
        assert_eq!(landscape_scale(), "scale=-2:1080");
    }

    #[test]
    fn test_loop_passes() {
        assert!(loop_palettegen().starts_with("fps=12,scale=480:-1"));
        assert!(loop_paletteuse().contains("[1:v]paletteuse=dither=bayer"));
    }
}
