//! Command-line parsing for `ewarp`.
//!
//! Besides selecting the parameter file, `num`, `prfile`, `onum` and `sn_fcpr`
//! double as overrides of model parameters with the same name.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Override;
use crate::domain::Value;

#[derive(Debug, Parser, Clone)]
#[command(name = "ewarp", version, about = "Pulsar timing noise-model run configurator")]
pub struct Cli {
    /// Parameter file.
    #[arg(short = 'p', long = "prfile", value_name = "FILE")]
    pub prfile: PathBuf,

    /// Pulsar number when analysing one pulsar at a time (`allpulsars: False`).
    #[arg(short = 'n', long, default_value_t = 0)]
    pub num: usize,

    /// Output number, used by array jobs to tag their runs.
    #[arg(short = 'o', long, default_value_t = 0)]
    pub onum: usize,

    /// Spin-noise free-spectrum cut-off prior; overrides `sn_fcpr:` in models that set it.
    #[arg(short = 'c', long = "sn_fcpr")]
    pub sn_fcpr: Option<f64>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Options that may override per-model parameters, in application order.
    pub fn overrides(&self) -> Vec<Override> {
        vec![
            Override::new("num", Some(Value::Int(self.num as i64))),
            Override::new("prfile", Some(Value::Str(self.prfile.display().to_string()))),
            Override::new("onum", Some(Value::Int(self.onum as i64))),
            Override::new("sn_fcpr", self.sn_fcpr.map(Value::Float)),
        ]
    }
}
