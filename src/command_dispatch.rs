//! Purpose: Hold top-level CLI command dispatch for `mediconv`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command writes exactly one JSON document to stdout on success.
//! Invariants: Helpers in `main.rs` remain the source of input/output plumbing.

use super::*;

use std::net::SocketAddr;

use mediconv::api::{KeyNormalizer, detect_format};

pub(super) fn dispatch_command(
    command: Command,
    context: CommandContext,
) -> Result<RunOutcome, Error> {
    init_tracing(command.log_directive());
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "mediconv", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Convert(args) => {
            let converter = build_converter(
                context.dictionary.as_deref(),
                args.hl7_version,
                args.max_depth,
            )?;
            let input = read_input(args.file.as_deref())?;
            let conversion = converter
                .to_json_detected(&input, args.content_type.as_deref())
                .map_err(|err| match &args.file {
                    Some(path) if err.path().is_none() && path.as_os_str() != "-" => {
                        err.with_path(path)
                    }
                    _ => err,
                })?;
            if args.envelope {
                emit_json(conversion_json(conversion, timestamp_now()));
            } else {
                emit_json(conversion.data);
            }
            Ok(RunOutcome::ok())
        }
        Command::Detect { file } => {
            let input = read_input(file.as_deref())?;
            let format = detect_format(&input);
            emit_json(json!({
                "format": format.as_str(),
                "content_type": format.content_type().map(|content_type| content_type.as_str()),
                "editor_language": format.editor_language().as_str(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Key { label } => {
            let keys = KeyNormalizer::global();
            let key = keys.normalize(&label);
            emit_json(json!({ "label": label, "key": key }));
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let bind: SocketAddr = args.bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9780.")
            })?;
            let converter = build_converter(context.dictionary.as_deref(), args.hl7_version, MAX_DEPTH)?;
            let config = serve::ServeConfig {
                bind,
                allow_non_loopback: args.allow_non_loopback,
                max_body_bytes: args.max_body_bytes,
            };
            emit_serve_startup(&config, context.color_mode);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config, Arc::new(converter)))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn emit_serve_startup(config: &serve::ServeConfig, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if !is_tty {
        return;
    }
    let label = colorize_label("serve:", color_mode.use_color(is_tty), AnsiColor::Yellow);
    eprintln!("{label} listening on http://{}", config.bind);
    eprintln!("{label} POST /v1/convert with a Content-Type header, or let the server detect it");
}
