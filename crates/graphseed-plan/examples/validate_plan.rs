use std::env;
use std::path::PathBuf;

use graphseed_core::TypeModel;
use graphseed_plan::{ValidationReport, load_plan_value, plan_json_schema, validate_plan};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut plan_path: Option<PathBuf> = None;
    let mut model_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model" => {
                model_path = args.next().map(PathBuf::from);
            }
            _ => {
                if plan_path.is_none() {
                    plan_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let plan_path = plan_path.ok_or("missing plan path")?;
    let model_path = model_path.ok_or("missing --model path")?;

    let plan_json = load_plan_value(&plan_path)?;
    let plan_schema = serde_json::to_value(plan_json_schema())?;
    let model = TypeModel::from_path(&model_path)?;

    let validated = match validate_plan(&plan_json, &plan_schema, &model) {
        Ok(validated) => validated,
        Err(report) => {
            eprintln!("plan validation failed");
            print_report(&report);
            std::process::exit(1);
        }
    };

    if !validated.warnings.is_empty() {
        eprintln!("plan validated with warnings:");
        print_report(&ValidationReport {
            errors: Vec::new(),
            warnings: validated.warnings,
        });
    } else {
        println!("plan validated successfully");
    }

    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in report.errors.iter().chain(report.warnings.iter()) {
        eprintln!("{:?} {} {}: {}", issue.severity, issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}
