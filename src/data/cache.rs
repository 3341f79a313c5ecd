//! Pulsar loading with a content-addressed cache of the loaded collection.
//!
//! Parsing many `.par`/`.tim` pairs is slow, so batch runs keep the loaded
//! collection under `<out>/.psrs_cache/<sha1(sorted names + ephemeris)>`. A cache
//! hit is trusted as-is: edits to the underlying files are not detected unless the
//! pulsar list or the ephemeris changes.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::{info, warn};

use crate::data::pulsar::{Pulsar, PulsarLoader, pulsar_name_from_path};
use crate::domain::RunConfig;
use crate::error::WarpError;

/// Directory (under the output directory) where loaded collections are cached.
pub const CACHE_DIR_NAME: &str = ".psrs_cache";

/// Whether the run analyses every pulsar at once or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Batch,
    Single { index: usize },
}

/// Matched `.par`/`.tim` files, each list sorted by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    pub par: Vec<PathBuf>,
    pub tim: Vec<PathBuf>,
}

/// Loaded pulsars plus what the rest of the run derives from them.
#[derive(Debug, Clone)]
pub struct PulsarSet {
    pub pulsars: Vec<Pulsar>,
    /// Time span in seconds used for Fourier frequency sampling.
    pub tspan: f64,
    /// Output directory of this run (created).
    pub directory: PathBuf,
    pub mode: LoadMode,
}

impl PulsarSet {
    pub fn names(&self) -> Vec<&str> {
        self.pulsars.iter().map(|p| p.name.as_str()).collect()
    }
}

/// List `*.par` and `*.tim` files of `datadir`; the two counts must agree.
pub fn find_data_files(datadir: &Path) -> Result<DataFiles, WarpError> {
    let mut par = Vec::new();
    let mut tim = Vec::new();
    let entries = fs::read_dir(datadir).map_err(|e| WarpError::io(datadir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| WarpError::io(datadir, e))?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("par") => par.push(path),
            Some("tim") => tim.push(path),
            _ => {}
        }
    }
    par.sort();
    tim.sort();

    info!(count = par.len(), "number of .par files");
    info!(count = tim.len(), "number of .tim files");
    if par.len() != tim.len() {
        return Err(WarpError::DataFileCountMismatch {
            datadir: datadir.to_path_buf(),
            par: par.len(),
            tim: tim.len(),
        });
    }

    Ok(DataFiles { par, tim })
}

/// Cache file name for a set of pulsar names and an ephemeris.
pub fn cache_key(names: &[String], ephem: &str) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha1::new();
    hasher.update(sorted.concat().as_bytes());
    hasher.update(ephem.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Read a cached pulsar collection.
pub fn restore(path: &Path) -> Result<Vec<Pulsar>, WarpError> {
    let cache_err = |message: String| WarpError::CacheLoad {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| cache_err(e.to_string()))?;
    rmp_serde::from_read(BufReader::new(file)).map_err(|e| cache_err(e.to_string()))
}

/// Write a pulsar collection to `path`.
///
/// The data goes to a temporary file in the same directory first and is renamed
/// into place, so concurrent runs never observe a partially written cache.
pub fn store(path: &Path, pulsars: &[Pulsar]) -> Result<(), WarpError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| WarpError::io(dir, e))?;

    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| WarpError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        rmp_serde::encode::write_named(&mut writer, pulsars).map_err(|e| {
            WarpError::io(path, std::io::Error::other(e.to_string()))
        })?;
        writer.flush().map_err(|e| WarpError::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| WarpError::io(path, e.error))?;
    Ok(())
}

/// Load the pulsars of a run.
///
/// `num` selects the pulsar in single-pulsar mode (`allpulsars: False`).
pub fn init_pulsars(run: &RunConfig, num: usize, loader: &dyn PulsarLoader) -> Result<PulsarSet, WarpError> {
    let globals = &run.globals;
    let out = PathBuf::from(globals.require_str("out")?);
    let datadir = PathBuf::from(globals.require_str("datadir")?);
    let allpulsars = globals.get_bool("allpulsars").ok_or_else(|| WarpError::MissingField {
        key: "allpulsars".to_string(),
    })?;
    let ephem = globals.get_str("ssephem");
    let clock = globals.get_str("clock");

    let files = find_data_files(&datadir)?;

    let set = if allpulsars {
        load_batch(run, &files, &out, ephem, clock, loader)?
    } else {
        load_single(&files, num, &out, ephem, clock, loader)?
    };

    fs::create_dir_all(&set.directory).map_err(|e| WarpError::io(&set.directory, e))?;
    Ok(set)
}

fn load_batch(
    run: &RunConfig,
    files: &DataFiles,
    out: &Path,
    ephem: Option<&str>,
    clock: Option<&str>,
    loader: &dyn PulsarLoader,
) -> Result<PulsarSet, WarpError> {
    let psrlist = run.psrlist();
    let ephem_id = ephem.unwrap_or_default();

    let pulsars = match cached_pulsars(run, &psrlist, ephem_id) {
        Some(pulsars) => {
            info!(count = pulsars.len(), "using pulsars from cache");
            pulsars
        }
        None => {
            info!("loading pulsars");
            let mut pulsars = Vec::new();
            let mut loaded = Vec::new();
            for (par, tim) in files.par.iter().zip(&files.tim) {
                let pname = pulsar_name_from_path(par);
                if psrlist.is_empty() || psrlist.contains(&pname) {
                    pulsars.push(loader.load(par, tim, ephem, clock)?);
                    loaded.push(pname);
                }
            }
            // Keyed by the file-derived names, which is what the next run will
            // ask for through `psrlist`.
            let cache_file = out.join(CACHE_DIR_NAME).join(cache_key(&loaded, ephem_id));
            info!(path = %cache_file.display(), "writing pulsars to cache");
            store(&cache_file, &pulsars)?;
            pulsars
        }
    };

    let tspan = batch_tspan(&pulsars).ok_or_else(|| WarpError::NoPulsars {
        datadir: PathBuf::from(run.globals.get_str("datadir").unwrap_or_default()),
    })?;

    Ok(PulsarSet {
        pulsars,
        tspan,
        directory: out.to_path_buf(),
        mode: LoadMode::Batch,
    })
}

/// Cached collection for this run, if one is configured and readable.
fn cached_pulsars(run: &RunConfig, psrlist: &[String], ephem_id: &str) -> Option<Vec<Pulsar>> {
    let cachefile = run.globals.get_path("psrcachefile");
    let cachedir = run.globals.get_path("psrcachedir");

    let path = match (cachefile, cachedir) {
        (Some(file), _) => file,
        (None, Some(dir)) if !psrlist.is_empty() => dir.join(cache_key(psrlist, ephem_id)),
        _ => {
            info!("condition for loading pulsars from cache is not satisfied");
            return None;
        }
    };

    info!(path = %path.display(), "attempting to load pulsar objects from cache");
    if !path.exists() {
        info!("could not load pulsars from cache: file does not exist");
        return None;
    }
    match restore(&path) {
        Ok(pulsars) => Some(pulsars),
        Err(err) => {
            warn!("{err}; loading from .par/.tim files instead");
            None
        }
    }
}

/// Maximum TOA minus minimum TOA over all pulsars.
pub fn batch_tspan(pulsars: &[Pulsar]) -> Option<f64> {
    let ranges: Vec<(f64, f64)> = pulsars.iter().filter_map(Pulsar::toa_range).collect();
    let tmin = ranges.iter().map(|r| r.0).reduce(f64::min)?;
    let tmax = ranges.iter().map(|r| r.1).reduce(f64::max)?;
    Some(tmax - tmin)
}

fn load_single(
    files: &DataFiles,
    num: usize,
    out: &Path,
    ephem: Option<&str>,
    clock: Option<&str>,
    loader: &dyn PulsarLoader,
) -> Result<PulsarSet, WarpError> {
    let (Some(par), Some(tim)) = (files.par.get(num), files.tim.get(num)) else {
        return Err(WarpError::PulsarIndexOutOfRange {
            index: num,
            count: files.par.len(),
        });
    };
    info!(par = %par.display(), tim = %tim.display(), "loading single pulsar");

    let pulsar = loader.load(par, tim, ephem, clock)?;
    let tspan = pulsar.tspan();
    let directory = out.join(format!("{num}_{}", pulsar.name));

    Ok(PulsarSet {
        pulsars: vec![pulsar],
        tspan,
        directory,
        mode: LoadMode::Single { index: num },
    })
}
