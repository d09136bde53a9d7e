//! Purpose: `mediconv` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout (pretty on a TTY, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Diagnostics go through `tracing` on stderr and never mix with stdout.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;

use mediconv::api::{
    Conversion, DecodeOptions, Dictionary, Error, ErrorKind, FormatConverter, MAX_DEPTH,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let context = CommandContext {
        dictionary: cli.dictionary,
        color_mode,
    };

    command_dispatch::dispatch_command(cli.command, context)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "mediconv",
    version,
    about = "Convert HL7 v2, CSV and XML healthcare payloads to JSON",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"HL7 v2 messages are decoded with a versioned dictionary of segment and
datatype definitions. Field labels become PascalCase JSON keys.
"#,
    after_help = r#"EXAMPLES
  $ mediconv --dictionary hl7.json convert adt.hl7
  $ cat adt.hl7 | mediconv --dictionary hl7.json convert --content-type x-application/hl7-v2+er7
  $ mediconv detect payload.xml
  $ mediconv key "Date/Time Of Message"

LEARN MORE
  $ mediconv <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "MEDICONV_DICTIONARY",
        value_name = "PATH",
        help = "HL7 v2 dictionary JSON (segment and datatype definitions)",
        value_hint = ValueHint::FilePath
    )]
    dictionary: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Convert a payload to JSON",
        long_about = r#"Convert HL7 v2 (ER7), CSV, XML or JSON input to JSON.

Without --content-type the input format is detected."#,
        after_help = r#"EXAMPLES
  $ mediconv --dictionary hl7.json convert adt.hl7
  $ mediconv convert --content-type text/csv patients.csv
  $ mediconv --dictionary hl7.json convert --hl7-version 2.5 --envelope adt.hl7"#
    )]
    Convert(ConvertArgs),
    #[command(
        about = "Detect the format of a payload",
        after_help = r#"EXAMPLES
  $ mediconv detect payload.txt
  $ echo 'a,b' | mediconv detect"#
    )]
    Detect {
        #[arg(help = "Input file (default: stdin)", value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    #[command(
        about = "Show the JSON key derived from a field label",
        after_help = r#"EXAMPLES
  $ mediconv key "Patient's Name"
  $ mediconv key "Set ID - PID""#
    )]
    Key {
        #[arg(help = "Field label as written in the dictionary")]
        label: String,
    },
    #[command(
        about = "Serve conversions over HTTP",
        long_about = r#"Start a loopback HTTP server.

Routes:
  GET  /healthz
  POST /v1/convert   body = payload, Content-Type selects the converter
  POST /v1/detect    body = payload"#
    )]
    Serve(ServeArgs),
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

impl Command {
    /// `EnvFilter` default when `RUST_LOG` is unset.
    fn log_directive(&self) -> &'static str {
        match self {
            Command::Serve(_) => "info",
            _ => "warn",
        }
    }
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(help = "Input file (default: stdin; `-` also reads stdin)", value_hint = ValueHint::FilePath)]
    file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "TYPE",
        help = "application/json | text/csv | application/xml | x-application/hl7-v2+er7"
    )]
    content_type: Option<String>,
    #[arg(
        long,
        value_name = "VERSION",
        help = "Dictionary version to use instead of MSH-12"
    )]
    hl7_version: Option<String>,
    #[arg(
        long,
        default_value_t = MAX_DEPTH,
        help = "Maximum datatype nesting depth before values pass through raw"
    )]
    max_depth: usize,
    #[arg(
        long,
        help = "Wrap output as {content_type, detected, converted_at, data}"
    )]
    envelope: bool,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(
        long,
        default_value = "127.0.0.1:9780",
        help = "Bind address",
        help_heading = "Connection"
    )]
    bind: String,
    #[arg(
        long,
        value_name = "VERSION",
        help = "Dictionary version to use instead of MSH-12",
        help_heading = "Decoding"
    )]
    hl7_version: Option<String>,
    #[arg(
        long,
        help = "Allow non-loopback binds (unsafe: no authentication)",
        help_heading = "Safety"
    )]
    allow_non_loopback: bool,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_BODY_BYTES,
        help = "Max request body size in bytes",
        help_heading = "Safety"
    )]
    max_body_bytes: u64,
}

const DEFAULT_MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

struct CommandContext {
    dictionary: Option<PathBuf>,
    color_mode: ColorMode,
}

fn init_tracing(default_directive: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn load_dictionary(path: Option<&Path>) -> Result<Arc<Dictionary>, Error> {
    match path {
        Some(path) => {
            let dictionary = Dictionary::from_path(path)?;
            tracing::debug!(
                path = %path.display(),
                versions = ?dictionary.versions().collect::<Vec<_>>(),
                "loaded dictionary"
            );
            Ok(Arc::new(dictionary))
        }
        None => {
            tracing::debug!("no dictionary given; HL7 fields use positional names");
            Ok(Arc::new(Dictionary::empty()))
        }
    }
}

fn build_converter(
    dictionary: Option<&Path>,
    hl7_version: Option<String>,
    max_depth: usize,
) -> Result<FormatConverter, Error> {
    if max_depth == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-depth must be greater than zero")
            .with_hint(format!("Use a positive value like {MAX_DEPTH}.")));
    }
    let options = DecodeOptions {
        version: hl7_version,
        max_depth,
    };
    Ok(FormatConverter::new(load_dictionary(dictionary)?, options))
}

fn read_input(file: Option<&Path>) -> Result<String, Error> {
    match file {
        None => read_stdin(),
        Some(path) if path.as_os_str() == "-" => read_stdin(),
        Some(path) => std::fs::read_to_string(path).map_err(|err| {
            let kind = if err.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to read input file")
                .with_path(path)
                .with_source(err)
        }),
    }
}

fn read_stdin() -> Result<String, Error> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(input)
}

fn conversion_json(conversion: Conversion, converted_at: Option<String>) -> Value {
    let mut out = Map::new();
    out.insert(
        "content_type".to_string(),
        json!(conversion.content_type.as_str()),
    );
    out.insert("detected".to_string(), json!(conversion.detected));
    if let Some(converted_at) = converted_at {
        out.insert("converted_at".to_string(), json!(converted_at));
    }
    out.insert("data".to_string(), conversion.data);
    Value::Object(out)
}

fn timestamp_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    if err.path().is_some() {
        return err.with_hint("Check that the path exists and is readable.");
    }
    err
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Re-run with RUST_LOG=debug and report the output.")
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("mediconv {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "mediconv",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Parse => "parse error".to_string(),
        ErrorKind::Unsupported => "unsupported input".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(line) = err.line() {
        lines.push(format!(
            "{} {line}",
            colorize_label("line:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `mediconv --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "mediconv") else {
        return "Try `mediconv --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `mediconv --help`.".to_string();
    }
    format!("Try `mediconv {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, add_io_hint, conversion_json, error_json, error_text};
    use clap::{CommandFactory, Parser};
    use mediconv::api::{Conversion, ContentType, Error, ErrorKind};
    use serde_json::json;

    #[test]
    fn convert_args_parse() {
        let cli = Cli::try_parse_from([
            "mediconv",
            "--dictionary",
            "dict.json",
            "convert",
            "--content-type",
            "text/csv",
            "--hl7-version",
            "2.5",
            "in.csv",
        ])
        .expect("parse");
        assert_eq!(cli.dictionary.as_deref(), Some(std::path::Path::new("dict.json")));
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.content_type.as_deref(), Some("text/csv"));
        assert_eq!(args.hl7_version.as_deref(), Some("2.5"));
        assert_eq!(args.max_depth, mediconv::api::MAX_DEPTH);
        assert!(!args.envelope);
    }

    #[test]
    fn log_defaults_follow_the_command() {
        let serve = Cli::try_parse_from(["mediconv", "serve"]).expect("parse");
        assert_eq!(serve.command.log_directive(), "info");
        let convert = Cli::try_parse_from(["mediconv", "convert", "in.hl7"]).expect("parse");
        assert_eq!(convert.command.log_directive(), "warn");
        let detect = Cli::try_parse_from(["mediconv", "detect"]).expect("parse");
        assert_eq!(detect.command.log_directive(), "warn");
    }

    #[test]
    fn help_describes_pascal_case_keys() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("PascalCase JSON keys"));
        assert!(!help.contains("camel-cased"));
    }

    #[test]
    fn error_json_includes_line_and_causes() {
        let err = Error::new(ErrorKind::Parse)
            .with_message("invalid HL7 message")
            .with_line(3)
            .with_source(std::io::Error::other("boom"));
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], json!("Parse"));
        assert_eq!(value["error"]["line"], json!(3));
        assert_eq!(value["error"]["causes"], json!(["boom"]));
    }

    #[test]
    fn error_text_without_color_is_plain() {
        let err = Error::new(ErrorKind::Unsupported).with_hint("Pass --content-type.");
        let text = error_text(&err, false);
        assert_eq!(text, "error: unsupported input\nhint: Pass --content-type.");
    }

    #[test]
    fn io_errors_with_paths_get_a_hint() {
        let err = add_io_hint(Error::new(ErrorKind::Io).with_path("missing.hl7"));
        assert!(err.hint().is_some());
        let err = add_io_hint(Error::new(ErrorKind::Io));
        assert!(err.hint().is_none());
    }

    #[test]
    fn envelope_keeps_key_order() {
        let conversion = Conversion {
            content_type: ContentType::Csv,
            detected: true,
            data: json!([]),
        };
        let value = conversion_json(conversion, Some("2026-01-01T00:00:00Z".to_string()));
        let keys: Vec<&str> = value
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["content_type", "detected", "converted_at", "data"]);
    }
}
