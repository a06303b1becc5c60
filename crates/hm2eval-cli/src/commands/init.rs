//! The `hm2eval init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("hm2eval.toml").exists() {
        println!("hm2eval.toml already exists, skipping.");
    } else {
        std::fs::write("hm2eval.toml", SAMPLE_CONFIG)?;
        println!("Created hm2eval.toml");
    }

    std::fs::create_dir_all("query_results")?;

    println!("\nNext steps:");
    println!("  1. Put <model>_<timestamp>.json query results in query_results/");
    println!("  2. List the models to evaluate under [models] in hm2eval.toml");
    println!("  3. Run: hm2eval evaluate");
    println!("  4. Run: hm2eval summarize");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# hm2eval configuration

query_results_dir = "./query_results"
eval_results_dir = "./eval_results"
parallelism = 4

# Model name -> file selection: "latest", a timestamp suffix, or false to skip.
[models]
# "gpt-4o" = "latest"
# "claude-3-5-sonnet" = "1017120000"

[eval.tolerance]
relative = 1e-3
absolute = 1e-9

[eval.sampling]
samples = 8
stride = 3
min_points = 3

[eval.simplify]
max_terms = 256
max_steps = 20000
max_expand_power = 8

[eval.extraction]
strategies = ["boxed", "final_answer_marker", "answer_marker", "display_math", "inline_math", "last_expression"]
"#;
