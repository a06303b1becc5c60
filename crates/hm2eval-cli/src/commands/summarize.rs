//! The `hm2eval summarize` command.

use std::path::PathBuf;

use anyhow::Result;

use hm2eval_core::config::load_config_from;
use hm2eval_core::report::{latest_report_dir, EvalReport};
use hm2eval_core::result::FailureKind;
use hm2eval_core::statistics::{summarize, Summary};

pub fn execute(report: String, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let dir = if report == "latest" {
        let config = load_config_from(config_path.as_deref())?;
        latest_report_dir(&config.eval_results_dir)?
    } else {
        PathBuf::from(report)
    };

    let summary = summarize(&EvalReport::load(&dir)?);
    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "text" => {
            println!("Report: {}", dir.display());
            print_summary(&summary);
        }
        other => anyhow::bail!("unknown format: {other}. Use text or json"),
    }
    Ok(())
}

pub fn print_summary(summary: &Summary) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Model",
        "Records",
        "Parse %",
        "Pass@1",
        "Overall %",
        "Failures",
    ]);

    for model in &summary.models {
        let failures = FailureKind::ALL
            .iter()
            .filter_map(|kind| {
                model
                    .failures
                    .get(kind)
                    .map(|count| format!("{kind}: {count}"))
            })
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(&model.model),
            Cell::new(model.total),
            Cell::new(format!("{:.1}%", model.parse_rate)),
            Cell::new(format!("{:.1}%", model.pass_at_1)),
            Cell::new(format!("{:.1}%", model.overall_rate)),
            Cell::new(failures),
        ]);
    }

    eprintln!("\n{table}");

    let mut categories = Table::new();
    categories.set_header(vec!["Model", "Type", "Parsed", "Equivalent", "Pass %"]);
    let mut any_category = false;
    for model in &summary.models {
        for (category, stats) in &model.by_category {
            any_category = true;
            categories.add_row(vec![
                Cell::new(&model.model),
                Cell::new(category),
                Cell::new(stats.parsed),
                Cell::new(stats.equivalent),
                Cell::new(format!("{:.1}%", stats.pass_rate)),
            ]);
        }
    }
    if any_category {
        eprintln!("\n{categories}");
    }
}
