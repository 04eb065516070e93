use anyhow::{bail, Context, Result};
use carbon_ingest_backend::{ingest, sample_template_csv, FactorCatalog, IngestionOptions};
use std::env;
use std::fs;

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} <workbook-file> [--sheet <name>] [--factors <csv-file>] [--llm]\n\
         \x20      {} --template",
        program, program
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .map(String::as_str)
        .unwrap_or("ingest")
        .to_string();

    let mut input_file: Option<String> = None;
    let mut sheet_hint: Option<String> = None;
    let mut factors_file: Option<String> = None;
    let mut use_llm = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--template" => {
                print!("{}", sample_template_csv());
                return Ok(());
            }
            "--sheet" => {
                sheet_hint = Some(
                    iter.next()
                        .context("--sheet requires a worksheet name")?
                        .clone(),
                );
            }
            "--factors" => {
                factors_file = Some(
                    iter.next()
                        .context("--factors requires a CSV file path")?
                        .clone(),
                );
            }
            "--llm" => use_llm = true,
            other if other.starts_with("--") => {
                print_usage(&program);
                bail!("unknown flag: {}", other);
            }
            other => {
                if input_file.is_some() {
                    print_usage(&program);
                    bail!("unexpected extra argument: {}", other);
                }
                input_file = Some(other.to_string());
            }
        }
    }

    let input_file = match input_file {
        Some(path) => path,
        None => {
            print_usage(&program);
            bail!("missing input file");
        }
    };

    let buffer = fs::read(&input_file)
        .with_context(|| format!("could not read input file '{}'", input_file))?;

    let factor_catalog = match factors_file {
        Some(path) => {
            let file = fs::File::open(&path)
                .with_context(|| format!("could not open factors file '{}'", path))?;
            Some(FactorCatalog::from_csv(file).context("could not parse factors file")?)
        }
        None => None,
    };

    let options = IngestionOptions {
        use_llm,
        factor_catalog,
        sheet_hint,
        column_analyzer: None,
    };

    let report = ingest(&buffer, &options).context("ingestion failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("could not serialize report")?
    );
    Ok(())
}
