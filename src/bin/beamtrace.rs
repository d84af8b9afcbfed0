use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use structopt::StructOpt;

use beamtrace::{load_config, Engine, Fate, Scene, TraceResult};

#[derive(Debug, StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Opt {
    #[structopt(long, default_value = "4")]
    pub threads: usize,

    /// overrides the scene file's ray cap
    #[structopt(long)]
    pub max_rays: Option<usize>,

    /// overrides the scene file's per-branch bounce budget
    #[structopt(long)]
    pub max_bounces: Option<usize>,

    #[structopt(parse(from_os_str), required = true)]
    pub scenes: Vec<PathBuf>,
}

fn summarize(path: &Path, result: &TraceResult) {
    let count = |fate: Fate| result.rays.iter().filter(|ray| ray.fate == fate).count();
    println!(
        "{}: {} rays ({} escaped, {} absorbed, {} blocked){}",
        path.display(),
        result.rays.len(),
        count(Fate::Escaped),
        count(Fate::Absorbed),
        count(Fate::Blocked),
        if result.truncated { ", truncated" } else { "" }
    );
    for (id, value) in result.readout() {
        println!("    {:<24} {:.6}", id, value);
    }
    for (id, color) in &result.colors {
        println!("    {:<24} {}", format!("{}_color", id), color);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    info!("{:?}", opt);

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()
        .context("failed to start the thread pool")?;

    let mut engines = Vec::new();
    let mut scenes: Vec<Scene> = Vec::new();
    for path in &opt.scenes {
        let config =
            load_config(path).with_context(|| format!("loading {}", path.display()))?;
        let mut limits = config.limits;
        if let Some(max_rays) = opt.max_rays {
            limits.max_rays = max_rays;
        }
        if let Some(max_bounces) = opt.max_bounces {
            limits.max_bounces = max_bounces;
        }
        engines.push(Engine::new(limits));
        scenes.push(config.scene());
    }

    let now = std::time::Instant::now();
    let results: Vec<TraceResult> = {
        use rayon::prelude::*;
        engines
            .par_iter()
            .zip(scenes.par_iter())
            .map(|(engine, scene)| engine.compute(scene))
            .collect()
    };
    info!("traced {} scenes in {:?}", results.len(), now.elapsed());

    for (path, result) in opt.scenes.iter().zip(results.iter()) {
        summarize(path, result);
    }
    Ok(())
}
