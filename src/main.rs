pub mod batch_worker;
pub mod command;
pub mod encoder;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod geometry;
pub mod job;
pub mod job_queue;
pub mod observer;
pub mod pipeline;
pub mod probe;
pub mod settings;
pub mod step_runner;
pub mod transcoder;
pub mod workspace;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rustop::opts;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use tracing::error;
use tracing_subscriber::EnvFilter;

use batch_worker::{BatchWorker, RunStatus};
use events::channels;
use geometry::GeometrySelection;
use job_queue::{scan_videos, JobQueue};
use observer::Observer;
use probe::FFprobe;
use settings::BatchSettings;
use step_runner::ProcessStepRunner;
use transcoder::Transcoder;

fn main() -> ExitCode {
    let (args, _rest) = opts! {
        synopsis "Add an intro and/or outro clip to a batch of videos with ffmpeg.";
        opt intro:Option<String>, desc:"Intro clip to prepend.";
        opt outro:Option<String>, desc:"Outro clip to append.";
        opt mode:Option<String>, desc:"intro, outro or both. [default: inferred from --intro/--outro]";
        opt output_dir:Option<String>, short:'o', desc:"Directory for finished videos. [default: .]";
        opt prefix:Option<String>, desc:"Prefix for output file names. [default: processed_]";
        opt resolution:Option<String>, short:'r', desc:"720p, 1080p or 4k. [default: 1080p]";
        opt orientation:Option<String>, desc:"landscape or portrait. [default: landscape]";
        opt gpu:Option<String>, desc:"nvidia, amd, intel or none. [default: none]";
        opt framerate:Option<u32>, desc:"Output framerate. [default: 25]";
        opt bitrate:Option<u32>, short:'b', desc:"Video bitrate in kbps. [default: 1100]";
        opt temp_dir:Option<String>, desc:"Where per-item scratch directories go. [default: system temp]";
        opt strict_framerate:bool=false, desc:"Re-encode clips whose framerate differs even if the size matches.";
        opt recursive:bool=false, desc:"Recurse into directories given as sources.";
        opt ffmpeg:Option<String>, desc:"Path to ffmpeg.";
        opt ffprobe:Option<String>, desc:"Path to ffprobe.";
        opt config:Option<String>, short:'c', desc:"JSON settings file. Flags override its values.";
        opt verbose:bool=false, short:'v', desc:"Show ffmpeg output.";
        param sources:Vec<String>, desc:"Video files or directories to process.";
    }.parse_or_exit();

    init_tracing(args.verbose);

    let file_settings = match &args.config {
        None => BatchSettings::default(),
        Some(path) => match BatchSettings::load(&PathBuf::from(path)) {
            Ok(s) => s,
            Err(err) => {
                error!("{}", err);
                return ExitCode::FAILURE;
            },
        },
    };
    let settings = file_settings.overlay(BatchSettings {
        intro: args.intro.map(PathBuf::from),
        outro: args.outro.map(PathBuf::from),
        mode: args.mode,
        output_dir: args.output_dir.map(PathBuf::from),
        prefix: args.prefix,
        temp_dir: args.temp_dir.map(PathBuf::from),
        strict_framerate: args.strict_framerate.then_some(true),
        ffmpeg: args.ffmpeg.map(PathBuf::from),
        ffprobe: args.ffprobe.map(PathBuf::from),
        geometry: GeometrySelection {
            resolution: args.resolution,
            orientation: args.orientation,
            gpu: args.gpu,
            framerate: args.framerate,
            bitrate_kbps: args.bitrate,
        },
    });

    let config = match settings.to_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        },
    };
    if let Err(err) = fs::create_dir_all(&config.output_dir) {
        error!("unable to create {:?}: {}", config.output_dir, err);
        return ExitCode::FAILURE;
    }

    let tools = settings.tools();
    if !tools.is_installed() {
        error!("ffmpeg/ffprobe not found ({:?}, {:?}); install ffmpeg or pass --ffmpeg/--ffprobe.", tools.ffmpeg, tools.ffprobe);
        return ExitCode::FAILURE;
    }

    let mut queue = JobQueue::new();
    for source in args.sources.iter().map(PathBuf::from) {
        if source.is_dir() {
            queue.add(scan_videos(&source, args.recursive));
        } else {
            queue.add([source]);
        }
    }
    let snapshot = queue.snapshot();

    let interrupted = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        // a second signal while the first is still pending exits immediately
        let registered = flag::register_conditional_shutdown(signal, 1, Arc::clone(&interrupted))
            .and_then(|_| flag::register(signal, Arc::clone(&interrupted)));
        if let Err(err) = registered {
            error!("unable to install signal handler: {}", err);
            return ExitCode::FAILURE;
        }
    }

    let (sink, stream) = channels();
    let runner = Arc::new(ProcessStepRunner::new(sink.log.clone()));
    let worker = BatchWorker::new(
        Transcoder::new(&tools.ffmpeg, runner),
        Arc::new(FFprobe::new(&tools.ffprobe)),
        sink);

    if let Err(err) = worker.start(snapshot.clone(), config.clone()) {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    let mut observer = Observer::new(&snapshot);
    let summary = observer.watch(&worker, &stream, &interrupted);
    worker.wait();
    observer.report(&summary, |p| config.output_path(p));

    match (summary.status, summary.failed) {
        (RunStatus::Completed, 0) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = match verbose {
        true => "debug",
        false => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
