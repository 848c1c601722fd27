use std::path::PathBuf;
use std::process;

use cog_schema::error::SchemaError;
use cog_schema::types::Mode;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let (predict_ref, mode_str, src) = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: cog-schema-gen <predict_ref> [--mode predict|train] [--src <dir>]");
            eprintln!();
            eprintln!("Arguments:");
            eprintln!(
                "  <predict_ref>    Predictor reference: file.py:ClassName or file.py:function_name"
            );
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --mode <mode>    Mode: predict or train [default: predict]");
            eprintln!("  --src <dir>      Source directory [default: .]");
            process::exit(2);
        }
    };

    if let Err(e) = run(&predict_ref, &mode_str, &src) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<(String, String, PathBuf), String> {
    let mut predict_ref: Option<String> = None;
    let mut mode = "predict".to_string();
    let mut src = PathBuf::from(".");

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                i += 1;
                mode = args.get(i).ok_or("--mode requires a value")?.clone();
            }
            "--src" => {
                i += 1;
                src = PathBuf::from(args.get(i).ok_or("--src requires a value")?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if predict_ref.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                predict_ref = Some(arg.to_string());
            }
        }
        i += 1;
    }

    let predict_ref = predict_ref.ok_or("missing required argument: <predict_ref>")?;
    Ok((predict_ref, mode, src))
}

fn run(predict_ref: &str, mode_str: &str, src: &std::path::Path) -> Result<(), SchemaError> {
    let mode = match mode_str {
        "predict" => Mode::Predict,
        "train" => Mode::Train,
        other => {
            return Err(SchemaError::Other(format!(
                "invalid mode '{other}', expected 'predict' or 'train'"
            )));
        }
    };

    let schema = cog_schema::generate_schema_from_dir(predict_ref, src, mode)?;

    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| SchemaError::Other(format!("JSON serialization failed: {e}")))?;

    println!("{json}");

    Ok(())
}
