#![forbid(unsafe_code)]

use std::io::Read;
use std::process::ExitCode;

use tabq::{OutputFormat, ReadOptions, run_str};

#[derive(Debug, Clone)]
struct CliArgs {
    expression: String,
    input: String,
    options: ReadOptions,
    format: OutputFormat,
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(2);
        }
    };
    match run(&args) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &CliArgs) -> Result<String, String> {
    let input = if args.input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|error| error.to_string())?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .map_err(|error| format!("{}: {error}", args.input))?
    };
    run_str(&args.expression, &input, &args.options, args.format)
        .map_err(|error| error.to_string())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut delimiter = b',';
    let mut has_header = true;
    let mut column_names = None;
    let mut format = OutputFormat::Plain;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--separator" | "-s" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--separator requires a character".to_owned())?;
                delimiter = parse_separator(&value)?;
            }
            "--format" | "-f" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--format requires plain, csv, or tsv".to_owned())?;
                format = parse_format(&value)?;
            }
            "--no-header" | "-n" => {
                has_header = false;
            }
            "--columns" | "-c" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--columns requires a comma-separated list".to_owned())?;
                column_names = Some(
                    value
                        .split(',')
                        .map(|name| name.trim().to_owned())
                        .collect::<Vec<_>>(),
                );
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other if other.len() > 1 && other.starts_with('-') => {
                return Err(format!("unknown argument: {other}"));
            }
            other => positional.push(other.to_owned()),
        }
    }

    let mut positional = positional.into_iter();
    let expression = positional
        .next()
        .ok_or_else(|| "an expression is required (try --help)".to_owned())?;
    let input = positional.next().unwrap_or_else(|| "-".to_owned());
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    Ok(CliArgs {
        expression,
        input,
        options: ReadOptions {
            delimiter,
            has_header,
            column_names,
        },
        format,
    })
}

fn parse_separator(value: &str) -> Result<u8, String> {
    if value == "\\t" || value.eq_ignore_ascii_case("tab") {
        return Ok(b'\t');
    }
    let mut bytes = value.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(byte), None) => Ok(byte),
        _ => Err(format!("separator must be a single character, got {value:?}")),
    }
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    match value {
        "plain" => Ok(OutputFormat::Plain),
        "csv" => Ok(OutputFormat::Csv),
        "tsv" => Ok(OutputFormat::Tsv),
        other => Err(format!("unknown format: {other} (expected plain, csv, or tsv)")),
    }
}

fn print_help() {
    println!(
        "tabq-cli\n\
         Usage:\n\
         \ttabq-cli [OPTIONS] <EXPRESSION> [INPUT]\n\
         Arguments:\n\
         \t<EXPRESSION>             chain expression, e.g. 'where(age > 30).select(name)'\n\
         \t[INPUT]                  input file path, or - for stdin (default: -)\n\
         Options:\n\
         \t-s, --separator <CHAR>   field separator; \\t or tab for TSV (default: ,)\n\
         \t-f, --format <FORMAT>    output format: plain, csv, or tsv (default: plain)\n\
         \t-n, --no-header          input has no header row; names become column_1..column_N\n\
         \t-c, --columns <NAMES>    comma-separated column names replacing the schema\n\
         \t-h, --help               show this help"
    );
}
