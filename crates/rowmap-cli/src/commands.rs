use std::fs::File;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use rowmap_cli::mapping::MappingFile;
use rowmap_cli::pipeline::{
    MapOptions, MapSummary, OutputFormat, compile_plan, input_key, map_file,
};
use rowmap_map::CompiledMapper;

use crate::cli::{MapArgs, OutputFormatArg, PlanArgs};

pub fn run_map(args: &MapArgs) -> Result<MapSummary> {
    let mut mapping = MappingFile::load(&args.mapping)?;
    if args.flat {
        mapping.grouped = false;
    }
    let options = MapOptions {
        format: match args.format {
            OutputFormatArg::Jsonl => OutputFormat::JsonLines,
            OutputFormatArg::Csv => OutputFormat::Csv,
        },
        columns: args.columns.clone(),
    };
    let summary = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create output file {}", path.display()))?;
            let summary = map_file(&mapping, &args.input, &options, file)?;
            info!(path = %path.display(), objects = summary.objects, "wrote output");
            summary
        }
        None => map_file(&mapping, &args.input, &options, io::stdout().lock())?,
    };
    Ok(summary)
}

pub fn run_plan(args: &PlanArgs) -> Result<Arc<CompiledMapper>> {
    let mapping = MappingFile::load(&args.mapping)?;
    let key = input_key(&mapping, args.input.as_deref(), &args.columns)?;
    compile_plan(&mapping, &key)
}
