//! End-to-end run: load inputs, compose and send every row, write the results table.

use std::path::{Path, PathBuf};

use crate::compose::EmailComposer;
use crate::config::{load_configuration, validate_configuration, Configuration};
use crate::data::{load_table, load_table_csv, CsvOptions, DataFormat, FileCollection, Table};
use crate::dispatch::{dispatch, Ledger};
use crate::transport::{self, Transport};

/// Where a run reads from and writes to.
#[derive(Debug, Clone, Default)]
pub struct RunPaths {
    pub config: PathBuf,
    pub table: Option<PathBuf>,
    /// Directory of template files and attachments.
    pub files: Option<PathBuf>,
    pub csv: CsvOptions,
}

/// Everything a run or an action works on.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub config: Configuration,
    pub table: Table,
    pub files: FileCollection,
}

impl RunInputs {
    /// Load the configuration, the input table (empty when absent) and the
    /// input file directory (empty when absent). The configuration is parsed
    /// but not validated.
    pub fn load(paths: &RunPaths) -> crate::Result<Self> {
        let config = load_configuration(&paths.config)?;
        let table = match &paths.table {
            Some(path) => load_input_table(path, &paths.csv)?,
            None => Table::default(),
        };
        let files = match &paths.files {
            Some(dir) => FileCollection::from_dir(dir)?,
            None => FileCollection::default(),
        };
        tracing::info!(
            rows = table.len(),
            files = files.len(),
            "inputs loaded"
        );
        Ok(Self {
            config,
            table,
            files,
        })
    }
}

fn load_input_table(path: &Path, csv: &CsvOptions) -> crate::Result<Table> {
    let explicit_csv = csv.separator.is_some() || csv.encoding.is_some();
    if explicit_csv && crate::data::detect_format(path)? == DataFormat::Csv {
        load_table_csv(path, csv)
    } else {
        load_table(path)
    }
}

/// Load inputs from `paths`, send, and write the results table to `output`.
pub async fn run(paths: &RunPaths, output: &Path, force_dry_run: bool) -> crate::Result<Ledger> {
    let mut inputs = RunInputs::load(paths)?;
    if force_dry_run {
        inputs.config.dry_run = true;
    }
    let transport = transport::from_config(&inputs.config.connection)?;
    execute(&inputs, transport.as_ref(), output).await
}

/// Validate the configuration, dispatch every row through `transport`, and
/// write the ledger to `output`. The ledger is written even when the run
/// aborts at a failing row.
pub async fn execute(
    inputs: &RunInputs,
    transport: &dyn Transport,
    output: &Path,
) -> crate::Result<Ledger> {
    validate_configuration(&inputs.config)?;
    let composer = EmailComposer::new(&inputs.config, &inputs.files)?;

    let outcome = dispatch(&inputs.config, &composer, transport, &inputs.table.rows).await;
    outcome.ledger.write_csv(output)?;
    tracing::info!(path = %output.display(), rows = outcome.ledger.len(), "results written");
    outcome.into_result()
}
