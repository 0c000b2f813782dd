use std::env;
use std::path::PathBuf;

use graphseed_core::TypeModel;
use graphseed_import::{Importer, MemoryStore, discover_sources, export_memory_store};
use graphseed_plan::ImportPlan;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut model_path: Option<PathBuf> = None;
    let mut plan_path: Option<PathBuf> = None;
    let mut data_dir: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model" => model_path = args.next().map(PathBuf::from),
            "--plan" => plan_path = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from),
            _ => {
                if data_dir.is_none() {
                    data_dir = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let model_path = model_path.ok_or("missing --model path")?;
    let data_dir = data_dir.ok_or("missing data directory")?;
    let model = TypeModel::from_path(&model_path)?;
    let plan = match plan_path {
        Some(path) => ImportPlan::from_path(&path)?,
        None => ImportPlan::default(),
    };

    let mut importer = Importer::new(&model, &plan, MemoryStore::new(&model));
    for source in discover_sources(&data_dir)? {
        importer.register(source)?;
    }
    let ledger = importer.generate_all()?;
    for report in ledger.reports() {
        println!("{}={}", report.type_name, report.records);
    }

    if let Some(out_dir) = out_dir {
        let store = importer.into_store();
        for export in export_memory_store(&store, &out_dir)? {
            println!("wrote {}", export.path.display());
        }
    }
    Ok(())
}
