use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use argh::FromArgs;
use log::LevelFilter;
use rayon::prelude::*;
use serde::Deserialize;

use crate::{
    audio,
    config::LipSyncConfig,
    error::Error,
    exporters::{Exporter, Granularity, VmdExporter, VmdMotion},
    generator::LipSyncGenerator,
    phonemes, Logger,
};

#[derive(Debug)]
pub enum CliError {
    ParseFailure(argh::EarlyExit),
    NoOutput,
    Lipsync(Error),
    BatchFailed { failed: usize, total: usize },
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseFailure(e) => write!(f, "{}", e.output),
            Self::NoOutput => write!(f, "No output requested, pass --vmd, --gmod or --dump"),
            Self::Lipsync(e) => write!(f, "{e}"),
            Self::BatchFailed { failed, total } => write!(f, "{failed} of {total} jobs failed"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<Error> for CliError {
    fn from(value: Error) -> Self {
        Self::Lipsync(value)
    }
}

/// lip sync keyframe generator
#[derive(Debug, FromArgs)]
pub struct Args {
    /// enable verbose logging, overridden by "quiet" if passed
    #[argh(switch, short = 'v', long = "verbose")]
    verbose: bool,
    /// disable all logging, overrides verbose
    #[argh(switch, short = 'q', long = "quiet")]
    quiet: bool,
    #[argh(subcommand)]
    commands: Option<Commands>,
}

impl Args {
    /// Parse some `args`, not including the program name.
    pub fn parse(args: &[&str]) -> Result<Self, CliError> {
        Self::from_args(&[env!("CARGO_PKG_NAME")], args).map_err(|e| CliError::ParseFailure(e))
    }

    pub fn log_level(&self) -> LevelFilter {
        Logger::level_for(self.verbose, self.quiet)
    }
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub enum Commands {
    Generate(GenerateCommand),
    Batch(BatchCommand),
    Inspect(InspectCommand),
}

/// Generate lip sync output for one audio file
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "generate")]
pub struct GenerateCommand {
    /// path to a 16-bit or 32-bit float WAV file
    #[argh(option)]
    audio: PathBuf,
    /// text spoken in the audio
    #[argh(option)]
    text: Option<String>,
    /// aligned phoneme segments as JSON, used instead of the text
    #[argh(option)]
    phonemes: Option<PathBuf>,
    /// path to a config file
    #[argh(option)]
    config: Option<PathBuf>,
    /// where to write the VMD output
    #[argh(option)]
    vmd: Option<PathBuf>,
    /// where to write the GMod JSON output
    #[argh(option)]
    gmod: Option<PathBuf>,
    /// where to write all intermediate data as JSON
    #[argh(option)]
    dump: Option<PathBuf>,
    /// granularity of the GMod output, segment or frame
    #[argh(option)]
    granularity: Option<Granularity>,
    /// model name written into the VMD header
    #[argh(option)]
    model_name: Option<String>,
    /// animation frames per second
    #[argh(option)]
    fps: Option<u32>,
    /// how far each phoneme reaches back into the previous one, 0 to 1
    #[argh(option)]
    overlap_ratio: Option<f64>,
    /// silence in seconds below which segments are joined
    #[argh(option)]
    gap_threshold: Option<f64>,
}

impl GenerateCommand {
    fn job(&self) -> Job {
        Job {
            audio: self.audio.clone(),
            text: self.text.clone(),
            phonemes: self.phonemes.clone(),
            vmd: self.vmd.clone(),
            gmod: self.gmod.clone(),
            dump: self.dump.clone(),
        }
    }

    /// Apply command line overrides on top of `config`.
    fn apply(&self, mut config: LipSyncConfig) -> LipSyncConfig {
        if let Some(v) = self.granularity {
            config = config.with_granularity(v);
        }
        if let Some(v) = &self.model_name {
            config = config.with_model_name(v.clone());
        }
        if let Some(v) = self.fps {
            config = config.with_fps(v);
        }
        if let Some(v) = self.overlap_ratio {
            config = config.with_overlap_ratio(v);
        }
        if let Some(v) = self.gap_threshold {
            config = config.with_gap_threshold(v);
        }

        config
    }
}

/// Run many generate jobs listed in a JSON manifest
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "batch")]
pub struct BatchCommand {
    /// manifest listing the jobs
    #[argh(positional)]
    manifest: PathBuf,
    /// path to a config file shared by all jobs
    #[argh(option)]
    config: Option<PathBuf>,
}

/// Print the contents of a VMD file
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "inspect")]
pub struct InspectCommand {
    /// path to the VMD file
    #[argh(positional)]
    path: PathBuf,
}

/// One spoken line to convert.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Job {
    pub audio: PathBuf,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub phonemes: Option<PathBuf>,
    #[serde(default)]
    pub vmd: Option<PathBuf>,
    #[serde(default)]
    pub gmod: Option<PathBuf>,
    #[serde(default)]
    pub dump: Option<PathBuf>,
}

impl Job {
    pub fn has_output(&self) -> bool {
        self.vmd.is_some() || self.gmod.is_some() || self.dump.is_some()
    }

    /// Make relative paths relative to `base`.
    pub fn resolve(mut self, base: &Path) -> Self {
        let join = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

        self.audio = join(self.audio);
        self.phonemes = self.phonemes.map(join);
        self.vmd = self.vmd.map(join);
        self.gmod = self.gmod.map(join);
        self.dump = self.dump.map(join);

        self
    }
}

/// Run one job, returning every path written.
pub fn run_job(job: &Job, config: &LipSyncConfig) -> crate::Result<Vec<PathBuf>> {
    let audio = audio::read_wav(&job.audio)?;

    let generator = match &job.phonemes {
        Some(path) => {
            let edits = phonemes::load_timeline(path)?;
            let config = match edits.overlap_rate {
                Some(rate) => {
                    let clamped = rate.clamp(0.0, 1.0);
                    if clamped != rate {
                        log::warn!("Overlap rate {rate} in {} clamped to {clamped}", path.display());
                    }
                    config.clone().with_overlap_ratio(clamped)
                }
                None => config.clone(),
            };

            let mut generator = LipSyncGenerator::new(config);
            generator.generate_from_segments(&audio, edits.segments);
            generator
        }
        None => {
            let mut generator = LipSyncGenerator::new(config.clone());
            generator.generate(&audio, job.text.as_deref().unwrap_or_default());
            generator
        }
    };

    let mut written = vec![];

    if let Some(path) = &job.vmd {
        let mut exporter = generator.config().vmd_exporter();
        exporter.from_frames(generator.frames());
        written.push(exporter.export(path)?);
    }
    if let Some(path) = &job.gmod {
        let mut exporter = generator.config().gmod_exporter();
        exporter.from_frames(generator.frames());
        written.push(exporter.export(path)?);
    }
    if let Some(path) = &job.dump {
        generator.dump(path)?;
        written.push(path.clone());
    }

    Ok(written)
}

fn load_config(path: &Option<PathBuf>) -> crate::Result<LipSyncConfig> {
    match path {
        Some(path) => LipSyncConfig::load(path),
        None => Ok(LipSyncConfig::default()),
    }
}

/// Read the jobs listed in a batch manifest.
pub fn load_manifest(path: &Path) -> crate::Result<Vec<Job>> {
    let data = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let jobs: Vec<Job> = serde_json::from_str(&data).map_err(|e| Error::json(path, e))?;

    let base = path.parent().unwrap_or(Path::new(""));

    Ok(jobs.into_iter().map(|job| job.resolve(base)).collect())
}

/// Human readable summary of a decoded VMD file.
pub fn describe(motion: VmdMotion) -> crate::Result<String> {
    let exporter = VmdExporter::from(motion);

    Ok(serde_json::to_string_pretty(&exporter.debug_json())?)
}

pub fn run(args: Args) -> Result<(), CliError> {
    let command = match args.commands {
        Some(v) => v,
        None => {
            log::info!("No command given, try --help");
            return Ok(());
        }
    };

    match command {
        Commands::Generate(c) => {
            let job = c.job();
            if !job.has_output() {
                return Err(CliError::NoOutput);
            }

            let config = c.apply(load_config(&c.config)?);
            config.validate()?;

            for path in run_job(&job, &config)? {
                println!("{}", path.display());
            }
        }
        Commands::Batch(c) => {
            let config = load_config(&c.config)?;
            let jobs = load_manifest(&c.manifest)?;

            let results = jobs
                .par_iter()
                .map(|job| {
                    if !job.has_output() {
                        return (job, Err(CliError::NoOutput));
                    }
                    (job, run_job(job, &config).map_err(CliError::from))
                })
                .collect::<Vec<_>>();

            let mut failed = 0;
            for (job, result) in results {
                match result {
                    Ok(paths) => {
                        for path in paths {
                            println!("{}", path.display());
                        }
                    }
                    Err(e) => {
                        log::error!("Job for {} failed: {e}", job.audio.display());
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(CliError::BatchFailed {
                    failed,
                    total: jobs.len(),
                });
            }
        }
        Commands::Inspect(c) => {
            let data = fs::read(&c.path).map_err(|e| Error::io(&c.path, e))?;
            println!("{}", describe(VmdMotion::decode(&data)?)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let args = Args::parse(&["--verbose"]).unwrap();

        assert_eq!(args.verbose, true);
        assert_eq!(args.quiet, false);
        assert_eq!(args.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn empty() {
        let args = Args::from_args(&["lipsync"], &[]).unwrap();

        assert_eq!(args.verbose, false);
        assert_eq!(args.quiet, false);
        assert!(args.commands.is_none());
    }

    #[test]
    fn no_command_quiet_verbose() {
        let args = Args::from_args(&["lipsync"], &["--quiet", "--verbose"]).unwrap();

        assert_eq!(args.verbose, true);
        assert_eq!(args.quiet, true);
        assert_eq!(args.log_level(), LevelFilter::Off);
    }

    mod generate {
        use super::*;

        /// One silent second at 100Hz.
        fn write_wav(path: &Path) {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 100,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(path, spec).unwrap();
            for _ in 0..100 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        /// Runs `generate` over a/i halves of the audio with the given timeline
        /// overlap rate, returning the GMod metadata rate and the start of `i`.
        fn timeline_overlap(rate: f64) -> (f64, f64) {
            let dir = tempfile::tempdir().unwrap();
            let wav = dir.path().join("line.wav");
            write_wav(&wav);

            let segments = dir.path().join("segments.json");
            fs::write(
                &segments,
                format!(
                    r#"{{"phoneme_segments": [
                        {{"phoneme": "a", "start": 0.0, "end": 0.5}},
                        {{"phoneme": "i", "start": 0.5, "end": 1.0}}
                    ], "overlap_rate": {rate}}}"#
                ),
            )
            .unwrap();
            let gmod = dir.path().join("out.json");
            let dump = dir.path().join("dump.json");

            let args = Args::parse(&[
                "generate",
                "--audio",
                wav.to_str().unwrap(),
                "--phonemes",
                segments.to_str().unwrap(),
                "--gmod",
                gmod.to_str().unwrap(),
                "--dump",
                dump.to_str().unwrap(),
            ])
            .unwrap();
            run(args).unwrap();

            let read = |p: &Path| -> serde_json::Value {
                serde_json::from_str(&fs::read_to_string(p).unwrap()).unwrap()
            };
            let gmod = read(&gmod);
            let dump = read(&dump);

            (
                gmod["metadata"]["overlap_rate"].as_f64().unwrap(),
                dump["lip_sync_frames"][1]["start"].as_f64().unwrap(),
            )
        }

        #[test]
        fn timeline_overlap_rate_above_one_is_clamped() {
            let (rate, start) = timeline_overlap(1.5);

            assert_eq!(rate, 1.0);
            assert!((start - 0.25).abs() < 1e-9);
        }

        #[test]
        fn negative_timeline_overlap_rate_is_clamped() {
            let (rate, start) = timeline_overlap(-0.3);

            assert_eq!(rate, 0.0);
            assert!((start - 0.5).abs() < 1e-9);
        }

        #[test]
        fn timeline_overlap_rate_in_range_is_kept() {
            let (rate, start) = timeline_overlap(0.5);

            assert_eq!(rate, 0.5);
            // overlap 0.25, half of it paid back by the previous frame
            assert!((start - 0.375).abs() < 1e-9);
        }

        #[test]
        fn audio_only() {
            let args = Args::from_args(&["lipsync"], &["generate", "--audio", "line.wav"]).unwrap();

            match args.commands.unwrap() {
                Commands::Generate(v) => {
                    assert_eq!(v.audio, PathBuf::from("line.wav"));
                    assert!(v.text.is_none());
                    assert!(v.granularity.is_none());
                    assert!(!v.job().has_output());
                }
                _ => assert!(false),
            }
        }

        #[test]
        fn missing_audio() {
            let args = Args::from_args(&["lipsync"], &["generate", "--text", "あ"]);

            assert!(args.is_err());
        }

        #[test]
        fn overrides() {
            let args = Args::from_args(
                &["lipsync"],
                &[
                    "generate",
                    "--audio",
                    "line.wav",
                    "--vmd",
                    "out.vmd",
                    "--granularity",
                    "FRAME",
                    "--fps",
                    "60",
                    "--model-name",
                    "ミク",
                    "--overlap-ratio",
                    "0.1",
                    "--gap-threshold",
                    "0.02",
                ],
            )
            .unwrap();

            match args.commands.unwrap() {
                Commands::Generate(v) => {
                    assert!(v.job().has_output());

                    let config = v.apply(LipSyncConfig::default());
                    assert_eq!(config.export_options.granularity, Granularity::Frame);
                    assert_eq!(config.export_options.fps, 60);
                    assert_eq!(config.export_options.model_name, "ミク");
                    assert_eq!(config.processing_options.overlap_ratio, 0.1);
                    assert_eq!(config.processing_options.gap_threshold, 0.02);
                }
                _ => assert!(false),
            }
        }

        #[test]
        fn unknown_granularity_is_accepted() {
            let args = Args::from_args(
                &["lipsync"],
                &["generate", "--audio", "a.wav", "--granularity", "word"],
            )
            .unwrap();

            match args.commands.unwrap() {
                Commands::Generate(v) => assert_eq!(v.granularity, Some(Granularity::Segment)),
                _ => assert!(false),
            }
        }

        #[test]
        fn bad_fps() {
            let args = Args::from_args(
                &["lipsync"],
                &["generate", "--audio", "a.wav", "--fps", "fast"],
            );

            assert!(args.is_err());
        }

        #[test]
        fn no_output_is_an_error() {
            let args = Args::parse(&["generate", "--audio", "a.wav"]).unwrap();

            assert!(matches!(run(args), Err(CliError::NoOutput)));
        }

        #[test]
        fn invalid_override_is_rejected() {
            let args = Args::parse(&["generate", "--audio", "a.wav", "--vmd", "o.vmd", "--fps", "0"])
                .unwrap();

            assert!(matches!(
                run(args),
                Err(CliError::Lipsync(Error::Config(_)))
            ));
        }
    }

    mod batch {
        use super::*;

        #[test]
        fn positional_manifest() {
            let args = Args::from_args(&["lipsync"], &["batch", "jobs.json"]).unwrap();

            match args.commands.unwrap() {
                Commands::Batch(v) => {
                    assert_eq!(v.manifest, PathBuf::from("jobs.json"));
                    assert!(v.config.is_none());
                }
                _ => assert!(false),
            }
        }

        #[test]
        fn manifest_paths_are_relative_to_manifest() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("jobs.json");
            fs::write(
                &path,
                r#"[{"audio": "a.wav", "vmd": "out/a.vmd"}, {"audio": "/abs/b.wav", "text": "い"}]"#,
            )
            .unwrap();

            let jobs = load_manifest(&path).unwrap();

            assert_eq!(jobs.len(), 2);
            assert_eq!(jobs[0].audio, dir.path().join("a.wav"));
            assert_eq!(jobs[0].vmd, Some(dir.path().join("out/a.vmd")));
            assert_eq!(jobs[1].audio, PathBuf::from("/abs/b.wav"));
            assert_eq!(jobs[1].text.as_deref(), Some("い"));
            assert!(!jobs[1].has_output());
        }

        #[test]
        fn job_without_output_is_counted_as_failed() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("jobs.json");
            fs::write(&path, r#"[{"audio": "missing.wav", "text": "あ"}]"#).unwrap();

            let args = Args::parse(&["batch", path.to_str().unwrap()]).unwrap();

            match run(args) {
                Err(CliError::BatchFailed { failed, total }) => {
                    assert_eq!(failed, 1);
                    assert_eq!(total, 1);
                }
                r => assert!(false, "{r:?}"),
            }
        }

        #[test]
        fn failing_jobs_are_counted() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("jobs.json");
            fs::write(
                &path,
                r#"[{"audio": "missing.wav", "vmd": "a.vmd"}, {"audio": "missing2.wav", "gmod": "b"}]"#,
            )
            .unwrap();

            let args = Args::parse(&["batch", path.to_str().unwrap()]).unwrap();

            match run(args) {
                Err(CliError::BatchFailed { failed, total }) => {
                    assert_eq!(failed, 2);
                    assert_eq!(total, 2);
                }
                r => assert!(false, "{r:?}"),
            }
        }
    }

    mod inspect {
        use super::*;

        #[test]
        fn describe_lists_keys() {
            let mut exporter = VmdExporter::default();
            exporter.add_morph_key(5, "あ", 0.5);
            let motion = VmdMotion::decode(&exporter.encode().unwrap()).unwrap();

            let text = describe(motion).unwrap();

            assert!(text.contains("\"FrameNo\": 5"));
            assert!(text.contains("あ"));
        }

        #[test]
        fn missing_file() {
            let args = Args::parse(&["inspect", "/definitely/not/here.vmd"]).unwrap();

            assert!(matches!(
                run(args),
                Err(CliError::Lipsync(Error::Io { .. }))
            ));
        }
    }
}
