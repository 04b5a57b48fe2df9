//! Encoding a job into the fetcher command line

use crate::types::{ContainerFormat, JobSpec, MediaType};

/// Output filename template appended to the output directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Build the fetcher argument list for a job
///
/// Order: format selection, output template, progress flags, cookies,
/// SponsorBlock, metadata flags, and finally the URL.
///
/// # Examples
///
/// ```
/// use media_dl::fetcher::build_args;
/// use media_dl::{ContainerFormat, JobSpec};
///
/// let spec = JobSpec::new("https://example.com/watch?v=1", "/tmp/out")
///     .audio(ContainerFormat::Mp3);
/// let args = build_args(&spec);
///
/// assert_eq!(args[0], "-x");
/// assert!(!args.iter().any(|a| a == "-f"));
/// assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=1"));
/// ```
pub fn build_args(spec: &JobSpec) -> Vec<String> {
    let mut args = Vec::with_capacity(16);

    match spec.media_type {
        MediaType::Audio => {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(spec.container.as_str().to_string());
        }
        MediaType::Video => {
            args.push("-f".to_string());
            args.push(video_format_selector(&spec.quality));
            if spec.container != ContainerFormat::Best {
                args.push("--merge-output-format".to_string());
                args.push(spec.container.as_str().to_string());
            }
        }
    }

    args.push("-o".to_string());
    args.push(
        spec.output_dir
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned(),
    );

    args.push("--newline".to_string());
    args.push("--no-part".to_string());

    if let Some(cookies) = &spec.cookie_file
        && !cookies.as_os_str().is_empty()
    {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }

    if let Some(categories) = spec.post_processing.sponsor_block.categories() {
        args.push("--sponsorblock-remove".to_string());
        args.push(categories.to_string());
    }

    if spec.post_processing.embed_metadata {
        args.push("--embed-metadata".to_string());
    }
    if spec.post_processing.embed_thumbnail && spec.media_type == MediaType::Video {
        args.push("--embed-thumbnail".to_string());
    }

    args.push(spec.url.clone());
    args
}

/// `-f` value for a video job
///
/// A specific format id gets the best audio merged in, falling back to the id
/// alone for formats that already carry audio.
fn video_format_selector(quality: &str) -> String {
    match quality {
        "best" | "worst" => quality.to_string(),
        id => format!("{id}+bestaudio/{id}"),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PostProcessing, SponsorBlockMode};
    use std::path::PathBuf;

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn audio_mp3_extracts_without_format_selector() {
        let spec = JobSpec::new("https://example.com/a", "/tmp/out").audio(ContainerFormat::Mp3);
        let args = build_args(&spec);

        assert!(args.contains(&"-x".to_string()));
        assert_eq!(flag_value(&args, "--audio-format"), Some("mp3"));
        assert!(!args.contains(&"-f".to_string()), "audio jobs must not pass -f");
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn video_with_format_id_merges_best_audio() {
        let spec = JobSpec::new("https://example.com/v", "/tmp/out")
            .with_quality("137")
            .with_container(ContainerFormat::Mkv);
        let args = build_args(&spec);

        assert_eq!(flag_value(&args, "-f"), Some("137+bestaudio/137"));
        assert_eq!(flag_value(&args, "--merge-output-format"), Some("mkv"));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn video_best_and_worst_pass_through() {
        for quality in ["best", "worst"] {
            let spec = JobSpec::new("https://example.com/v", "/tmp/out").with_quality(quality);
            let args = build_args(&spec);
            assert_eq!(flag_value(&args, "-f"), Some(quality));
        }
    }

    #[test]
    fn best_container_skips_merge_flag() {
        let spec = JobSpec::new("https://example.com/v", "/tmp/out");
        let args = build_args(&spec);
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn output_template_lives_in_output_dir() {
        let spec = JobSpec::new("https://example.com/v", "/srv/media");
        let args = build_args(&spec);

        let expected = PathBuf::from("/srv/media").join("%(title)s.%(ext)s");
        assert_eq!(
            flag_value(&args, "-o"),
            Some(expected.to_string_lossy().as_ref())
        );
        assert!(args.contains(&"--newline".to_string()));
        assert!(args.contains(&"--no-part".to_string()));
    }

    #[test]
    fn cookies_only_when_set_and_non_empty() {
        let base = JobSpec::new("https://example.com/v", "/tmp/out");
        assert!(!build_args(&base).contains(&"--cookies".to_string()));

        let empty = base.clone().with_cookies("");
        assert!(!build_args(&empty).contains(&"--cookies".to_string()));

        let set = base.with_cookies("/home/me/cookies.txt");
        assert_eq!(
            flag_value(&build_args(&set), "--cookies"),
            Some("/home/me/cookies.txt")
        );
    }

    #[test]
    fn sponsor_block_modes_map_to_categories() {
        let cases = [
            (SponsorBlockMode::None, None),
            (SponsorBlockMode::SponsorsOnly, Some("sponsor")),
            (
                SponsorBlockMode::SponsorsIntrosOutros,
                Some("sponsor,intro,outro"),
            ),
            (SponsorBlockMode::AllSegments, Some("all")),
        ];

        for (mode, expected) in cases {
            let spec = JobSpec::new("https://example.com/v", "/tmp/out").with_post_processing(
                PostProcessing {
                    sponsor_block: mode,
                    ..Default::default()
                },
            );
            assert_eq!(
                flag_value(&build_args(&spec), "--sponsorblock-remove"),
                expected,
                "mode {mode:?}"
            );
        }
    }

    #[test]
    fn thumbnail_is_embedded_for_video_only() {
        let video = JobSpec::new("https://example.com/v", "/tmp/out");
        let audio = video.clone().audio(ContainerFormat::M4a);

        assert!(build_args(&video).contains(&"--embed-thumbnail".to_string()));
        assert!(!build_args(&audio).contains(&"--embed-thumbnail".to_string()));
        assert!(build_args(&audio).contains(&"--embed-metadata".to_string()));
    }

    #[test]
    fn metadata_flags_respect_switches() {
        let spec = JobSpec::new("https://example.com/v", "/tmp/out").with_post_processing(
            PostProcessing {
                embed_metadata: false,
                embed_thumbnail: false,
                sponsor_block: SponsorBlockMode::None,
            },
        );
        let args = build_args(&spec);
        assert!(!args.contains(&"--embed-metadata".to_string()));
        assert!(!args.contains(&"--embed-thumbnail".to_string()));
    }

    #[test]
    fn full_video_argv_order() {
        let spec = JobSpec::new("https://example.com/v", "/out")
            .with_quality("22")
            .with_container(ContainerFormat::Mp4)
            .with_cookies("/c.txt")
            .with_post_processing(PostProcessing {
                embed_metadata: true,
                embed_thumbnail: true,
                sponsor_block: SponsorBlockMode::SponsorsOnly,
            });

        let template = PathBuf::from("/out")
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned();

        assert_eq!(
            build_args(&spec),
            vec![
                "-f",
                "22+bestaudio/22",
                "--merge-output-format",
                "mp4",
                "-o",
                template.as_str(),
                "--newline",
                "--no-part",
                "--cookies",
                "/c.txt",
                "--sponsorblock-remove",
                "sponsor",
                "--embed-metadata",
                "--embed-thumbnail",
                "https://example.com/v",
            ]
        );
    }
}
