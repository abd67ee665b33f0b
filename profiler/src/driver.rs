//! Sweep orchestration.
//!
//! Each sweep submits one job per (generator, splatting method, container
//! combination) to the worker pool; a job measures every sweep point with the
//! epoch harness, writes its own CSV and appends one line to the shared
//! index. Job failures abort only the failing job: the error is logged with
//! its chain and the remaining jobs continue.

use std::path::Path;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use log::{error, info, warn};

use regsplat::container::regionfield::Regionfield;
use regsplat::generator::{GenerateInfo, RegionfieldGenerator, Uniform, Voronoi};
use regsplat::pool::{TaskHandle, ThreadPool};
use regsplat::splatting::convolution::{Fast, Vanilla};
use regsplat::splatting::sampled::{Stochastic, Stratified, Systematic};
use regsplat::splatting::{diameter, Combination, InvokeInfo, Scratch, Splatting};
use regsplat::system;
use regsplat::types::Dim2;

use crate::bench::Bench;
use crate::config::Config;
use crate::report::{JobId, ResultSink, Row, JOB_ID_START};

/// The splatting methods under profile, instantiated per radius.
#[derive(Clone, Copy, Debug)]
enum EngineKind {
    Vanilla,
    Fast,
    Systematic,
    Stratified,
    Stochastic,
}

impl EngineKind {
    const ALL: [Self; 5] = [
        Self::Vanilla,
        Self::Fast,
        Self::Systematic,
        Self::Stratified,
        Self::Stochastic,
    ];

    fn instantiate(self, radius: u32, seed: u64) -> Box<dyn Splatting> {
        match self {
            Self::Vanilla => Box::new(Vanilla { radius }),
            Self::Fast => Box::new(Fast { radius }),
            Self::Systematic => Box::new(Systematic {
                radius,
                first_sample: Dim2::new(0, 0),
                interval: Dim2::new(2, 2),
            }),
            Self::Stratified => Box::new(Stratified {
                radius,
                stratum_count: 2,
                seed,
            }),
            Self::Stochastic => Box::new(Stochastic {
                radius,
                sample: diameter(radius),
                seed,
            }),
        }
    }
}

/// The regionfield generators under profile.
#[derive(Clone, Copy, Debug)]
enum GeneratorKind {
    Uniform,
    Voronoi { centroid_count: u16 },
}

impl GeneratorKind {
    fn build(self) -> Box<dyn RegionfieldGenerator + Send + Sync> {
        match self {
            Self::Uniform => Box::new(Uniform),
            Self::Voronoi { centroid_count } => Box::new(Voronoi { centroid_count }),
        }
    }
}

/// Keeps the main thread out of the workers' way for the duration of the run:
/// elevated priority, affinity restricted to the CPUs the pool does not use.
/// Prior settings are restored on drop.
struct MainThreadScheduler {
    thread: system::NativeThread,
    saved_priority: Option<u8>,
    saved_affinity: Option<u64>,
}

impl MainThreadScheduler {
    fn engage(pool_mask: u64) -> Self {
        let thread = system::current_thread();
        let saved_priority = system::thread_priority(thread).ok();
        let saved_affinity = system::thread_affinity(thread).ok();
        if let Err(source) = system::set_thread_priority(thread, system::PRIORITY_MAX) {
            warn!("could not raise the main thread priority: {source}");
        }
        let reserved = !pool_mask & system::available_mask();
        if reserved != 0 {
            if let Err(source) = system::set_thread_affinity(thread, reserved) {
                warn!("could not restrict the main thread affinity: {source}");
            }
        }
        Self {
            thread,
            saved_priority,
            saved_affinity,
        }
    }
}

impl Drop for MainThreadScheduler {
    fn drop(&mut self) {
        if let Some(priority) = self.saved_priority {
            let _ = system::set_thread_priority(self.thread, priority);
        }
        if let Some(affinity) = self.saved_affinity {
            let _ = system::set_thread_affinity(self.thread, affinity);
        }
    }
}

struct Profiler {
    pool: ThreadPool,
    sink: Arc<ResultSink>,
    seed: u64,
    next_id: JobId,
    pending: Vec<(JobId, TaskHandle<Result<()>>)>,
}

impl Profiler {
    fn next_id(&mut self) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn submit(
        &mut self,
        id: JobId,
        job: impl FnOnce() -> Result<()> + Send + 'static,
    ) {
        let handle = self.pool.enqueue(move |_| job());
        self.pending.push((id, handle));
    }

    /// Measure every `(value, instance)` sweep point against a regionfield
    /// produced by `regionfield_for`, then write the job reports.
    #[allow(clippy::too_many_arguments)]
    fn profile_sweep(
        sink: &ResultSink,
        id: JobId,
        title: &str,
        custom_tag: &str,
        generator_name: &str,
        combination: Combination,
        points: Vec<(String, Box<dyn Splatting>)>,
        info: InvokeInfo,
        mut regionfield_for: impl FnMut(usize, &dyn Splatting) -> Result<Arc<Regionfield>>,
    ) -> Result<()> {
        let bench = Bench::default();
        let mut scratch = Scratch::new();
        let mut rows = Vec::with_capacity(points.len());
        let mut splatting_name = "";
        for (index, (variable, splat)) in points.iter().enumerate() {
            let regionfield = regionfield_for(index, splat.as_ref())?;
            // Surface validation errors before timing starts.
            combination
                .invoke(splat.as_ref(), &regionfield, &info, &mut scratch)
                .with_context(|| format!("sweep point {variable}"))?;
            let t_median = bench.measure(|| {
                let _ = combination.invoke(splat.as_ref(), &regionfield, &info, &mut scratch);
            });
            rows.push(Row {
                variable: variable.clone(),
                t_median,
                memory_bytes: splat.scratch_size_bytes(&scratch),
            });
            splatting_name = splat.name();
        }
        sink.write_job(id, &rows)?;
        sink.append_index(
            id,
            title,
            generator_name,
            splatting_name,
            combination.tag(),
            custom_tag,
        )?;
        Ok(())
    }

    /// Sweep the kernel radius. The regionfield is generated once per
    /// generator at the maximin dimension over all radii and shared
    /// read-only by the jobs.
    fn sweep_radius(
        &mut self,
        custom_tag: &'static str,
        extent: Dim2,
        region_count: u8,
        radii: &[u32],
        engines: &[EngineKind],
        generators: &[GeneratorKind],
    ) -> Result<()> {
        let max_radius = radii.iter().copied().max().unwrap_or(0);
        let info = InvokeInfo {
            offset: Dim2::splat(max_radius),
            extent,
        };
        let minimum_dimension = info.offset + info.extent + Dim2::splat(max_radius);

        for &generator_kind in generators {
            let generator = generator_kind.build();
            let mut regionfield = Regionfield::new();
            regionfield.resize(minimum_dimension)?;
            regionfield.region_count = region_count;
            generator.generate(&mut regionfield, &GenerateInfo { seed: self.seed })?;
            let regionfield = Arc::new(regionfield);
            let generator_name = generator.name();

            for &engine in engines {
                for combination in Combination::ALL {
                    let id = self.next_id();
                    let sink = Arc::clone(&self.sink);
                    let regionfield = Arc::clone(&regionfield);
                    let seed = self.seed;
                    let radii = radii.to_vec();
                    self.submit(id, move || {
                        let points = radii
                            .iter()
                            .map(|&radius| {
                                (radius.to_string(), engine.instantiate(radius, seed))
                            })
                            .collect();
                        Self::profile_sweep(
                            &sink,
                            id,
                            "Radius",
                            custom_tag,
                            generator_name,
                            combination,
                            points,
                            info,
                            |_, _| Ok(Arc::clone(&regionfield)),
                        )
                    });
                }
            }
        }
        Ok(())
    }

    /// Sweep the total region count; the regionfield is regenerated for every
    /// sweep point inside the job.
    fn sweep_region_count(
        &mut self,
        custom_tag: &'static str,
        extent: Dim2,
        radius: u32,
        region_counts: &[u8],
        engines: &[EngineKind],
        generators: &[GeneratorKind],
    ) {
        let info = InvokeInfo {
            offset: Dim2::splat(radius),
            extent,
        };
        for &generator_kind in generators {
            for &engine in engines {
                for combination in Combination::ALL {
                    let id = self.next_id();
                    let sink = Arc::clone(&self.sink);
                    let seed = self.seed;
                    let region_counts = region_counts.to_vec();
                    self.submit(id, move || {
                        let generator = generator_kind.build();
                        let generator_name = generator.name();
                        let points = region_counts
                            .iter()
                            .map(|&count| {
                                (count.to_string(), engine.instantiate(radius, seed))
                            })
                            .collect();
                        Self::profile_sweep(
                            &sink,
                            id,
                            "GlobalRegionCount",
                            custom_tag,
                            generator_name,
                            combination,
                            points,
                            info,
                            |index, splat| {
                                let mut regionfield = Regionfield::new();
                                regionfield.resize(
                                    splat.minimum_regionfield_dimension(&info),
                                )?;
                                regionfield.region_count = region_counts[index];
                                generator
                                    .generate(&mut regionfield, &GenerateInfo { seed })?;
                                Ok(Arc::new(regionfield))
                            },
                        )
                    });
                }
            }
        }
    }

    /// Sweep the Voronoi centroid count at a fixed region count.
    fn sweep_centroid_count(
        &mut self,
        custom_tag: &'static str,
        extent: Dim2,
        radius: u32,
        region_count: u8,
        centroid_counts: &[u16],
        engines: &[EngineKind],
    ) {
        let info = InvokeInfo {
            offset: Dim2::splat(radius),
            extent,
        };
        for &engine in engines {
            for combination in Combination::ALL {
                let id = self.next_id();
                let sink = Arc::clone(&self.sink);
                let seed = self.seed;
                let centroid_counts = centroid_counts.to_vec();
                self.submit(id, move || {
                    let points = centroid_counts
                        .iter()
                        .map(|&count| {
                            (count.to_string(), engine.instantiate(radius, seed))
                        })
                        .collect();
                    Self::profile_sweep(
                        &sink,
                        id,
                        "LocalRegionCount",
                        custom_tag,
                        "Voronoi",
                        combination,
                        points,
                        info,
                        |index, splat| {
                            let generator = Voronoi {
                                centroid_count: centroid_counts[index],
                            };
                            let mut regionfield = Regionfield::new();
                            regionfield
                                .resize(splat.minimum_regionfield_dimension(&info))?;
                            regionfield.region_count = region_count;
                            generator.generate(&mut regionfield, &GenerateInfo { seed })?;
                            Ok(Arc::new(regionfield))
                        },
                    )
                });
            }
        }
    }

    /// Block until every submitted job finishes; failed jobs are logged and
    /// skipped.
    fn synchronise(&mut self) -> Result<()> {
        for (id, handle) in self.pending.drain(..) {
            match handle.wait() {
                Ok(Ok(())) => {}
                Ok(Err(source)) => error!("job {id} failed: {source:#}"),
                Err(source) => error!("job {id} was lost by the pool: {source}"),
            }
        }
        Ok(())
    }
}

/// Run the full profile described by `config`, writing all reports into a
/// dated directory under `output`.
pub fn run(config: &Config, output: &Path, threads: usize) -> Result<()> {
    ensure!(
        output.is_dir(),
        "output location {} is not a directory",
        output.display()
    );
    let run_dir = output.join(
        chrono::Local::now()
            .format("%Y-%m-%d_%H-%M-%S")
            .to_string(),
    );
    std::fs::create_dir(&run_dir)
        .with_context(|| format!("creating the run directory {}", run_dir.display()))?;
    info!("profiling into {}", run_dir.display());

    let sink = Arc::new(ResultSink::create(run_dir)?);
    let pool = ThreadPool::new(threads)?;
    if let Err(source) = pool.set_priority(system::PRIORITY_MAX) {
        warn!("could not raise the worker priority: {source}");
    }
    if let Err(source) = pool.set_affinity_mask(config.thread_affinity_mask) {
        warn!("could not apply the worker affinity mask: {source}");
    }
    let _scheduler = MainThreadScheduler::engage(config.thread_affinity_mask);

    let mut profiler = Profiler {
        pool,
        sink,
        seed: config.seed,
        next_id: JOB_ID_START,
        pending: Vec::new(),
    };

    let default = &config.parameter_set.default;
    let stress = &config.parameter_set.stress;
    let default_extent = Dim2::new(default.fixed.extent[0], default.fixed.extent[1]);
    let stress_extent = Dim2::new(stress.fixed.extent[0], stress.fixed.extent[1]);
    let default_generators = [
        GeneratorKind::Uniform,
        GeneratorKind::Voronoi {
            centroid_count: default.fixed.centroid_count,
        },
    ];

    profiler.sweep_radius(
        "Default",
        default_extent,
        default.fixed.region_count,
        &default.variable.radius.values(),
        &EngineKind::ALL,
        &default_generators,
    )?;
    profiler.sweep_radius(
        "Stress",
        stress_extent,
        stress.fixed.region_count,
        &stress.variable.radius.values(),
        &[EngineKind::Fast],
        &[GeneratorKind::Uniform],
    )?;
    profiler.sweep_region_count(
        "Default",
        default_extent,
        default.fixed.radius,
        &default.variable.region_count.values(),
        &EngineKind::ALL,
        &default_generators,
    );
    profiler.sweep_centroid_count(
        "Default",
        default_extent,
        default.fixed.radius,
        default.fixed.region_count,
        &default.variable.centroid_count.values(),
        &EngineKind::ALL,
    );

    profiler.synchronise()
}
