use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use confmap_engine::{
    ConfigMapSource, ConfigPayloadBuilder, ConfigSource, DualViewController, EncodedDocument, EsoProvider, EsoSpec, FilePermission,
    KesProvider, MappingChange, SecretSource, SubPath, Usage, VolumeMount, diff_mappings, read_document,
    secret::parse_kes_items,
    validation::parse_sub_path_keys,
};
use confmap_types::TextFormat;
use confmap_util::{EditorPreferences, KeyRule};
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format},
};

/// Edit ConfigMap and Secret data as key/value rows or YAML/JSON documents.
#[derive(Parser, Debug)]
#[command(name = "confmap", version, about)]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Spaces per indentation level (default: stored preference)
    #[arg(long, global = true)]
    indent: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Re-encode a YAML or JSON document, optionally in the other format
    Convert {
        input: PathBuf,
        /// Target format: yaml or json (default: stored preference)
        #[arg(long)]
        to: Option<TextFormat>,
        /// Apply the Secret key rule
        #[arg(long, action = ArgAction::SetTrue)]
        secret: bool,
    },
    /// Check every key and value of a document
    Validate {
        input: PathBuf,
        /// Apply the Secret key rule
        #[arg(long, action = ArgAction::SetTrue)]
        secret: bool,
    },
    /// Build the save request for a ConfigMap or Secret
    Payload(PayloadArgs),
    /// Show key-level changes between two documents
    Diff {
        base: PathBuf,
        edited: PathBuf,
        /// Hide values in the output
        #[arg(long, action = ArgAction::SetTrue)]
        secret: bool,
    },
    /// Show or change stored editor preferences
    Prefs {
        /// Default text format: yaml or json
        #[arg(long)]
        format: Option<TextFormat>,
        /// Default spaces per indentation level
        #[arg(long)]
        default_indent: Option<usize>,
        /// Open secret editors in the text view
        #[arg(long)]
        text_first_for_secrets: Option<bool>,
    },
}

#[derive(clap::Args, Debug)]
struct PayloadArgs {
    /// Data document (inline data, ESO spec or KES list)
    input: Option<PathBuf>,
    /// Resource name
    #[arg(long)]
    name: String,
    /// Build a Secret instead of a ConfigMap
    #[arg(long, action = ArgAction::SetTrue)]
    secret: bool,
    /// Mount an existing resource instead of sending data
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["eso", "kes"])]
    existing: bool,
    /// External Secrets Operator provider, e.g. ESO_AWSSecretsManager
    #[arg(long, conflicts_with = "kes")]
    eso: Option<EsoProvider>,
    /// Kubernetes External Secrets provider, e.g. AWSSecretsManager
    #[arg(long)]
    kes: Option<KesProvider>,
    /// IAM role for AWS backed external secrets
    #[arg(long)]
    role_arn: Option<String>,
    /// Mount as a volume at this path instead of environment variables
    #[arg(long)]
    mount_path: Option<PathBuf>,
    /// Mount each key as its own file
    #[arg(long, action = ArgAction::SetTrue, requires = "mount_path")]
    sub_path: bool,
    /// Comma separated keys to mount as files (external data only)
    #[arg(long, requires = "mount_path")]
    sub_path_keys: Option<String>,
    /// Octal mode of mounted files, e.g. 0644
    #[arg(long, requires = "mount_path")]
    file_permission: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let preferences = EditorPreferences::new().unwrap_or_else(|error| {
        warn!(error = %error, "preferences unavailable; using defaults");
        EditorPreferences::ephemeral()
    });
    let indent = cli.indent.unwrap_or_else(|| preferences.indent());

    match cli.command {
        Commands::Convert { input, to, secret } => {
            run_convert(&input, to.unwrap_or_else(|| preferences.default_format()), secret, indent)
        }
        Commands::Validate { input, secret } => run_validate(&input, secret, indent, cli.output),
        Commands::Payload(args) => run_payload(args, indent),
        Commands::Diff { base, edited, secret } => run_diff(&base, &edited, secret, indent, cli.output),
        Commands::Prefs {
            format,
            default_indent,
            text_first_for_secrets,
        } => run_prefs(&preferences, format, default_indent, text_first_for_secrets),
    }
}

fn init_tracing() {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = log_builder(&directives).with_writer(std::io::stderr).try_init();
}

fn log_builder(directives: &str) -> fmt::SubscriberBuilder<format::DefaultFields, format::Format, EnvFilter> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(directives))
}

fn key_rule(secret: bool) -> KeyRule {
    if secret { KeyRule::secret() } else { KeyRule::config_map() }
}

fn report_diagnostics(path: &Path, document: &EncodedDocument) {
    if let Some(summary) = document.summary() {
        warn!(path = %path.display(), "{summary}");
    }
}

fn run_convert(input: &Path, to: TextFormat, secret: bool, indent: usize) -> Result<()> {
    let (codec, outcome) = read_document(input, indent, &key_rule(secret))?;
    report_diagnostics(input, &outcome.document);
    debug!(from = %codec.format(), to = %to, "converting document");
    print!("{}", codec.with_format(to).encode(&outcome.model));
    Ok(())
}

fn run_validate(input: &Path, secret: bool, indent: usize, output: Output) -> Result<()> {
    let (_, outcome) = read_document(input, indent, &key_rule(secret))?;
    report_diagnostics(input, &outcome.document);
    let report = outcome.model.validate_all(&key_rule(secret));
    let errors = report.errors();

    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&report.entries)?),
        Output::Human => {
            for error in &errors {
                println!("row {}: {}", error.index() + 1, error);
            }
        }
    }
    if !report.is_valid {
        bail!("{} invalid entries in {}", errors.len(), input.display());
    }
    if output == Output::Human {
        println!("{} entries valid", report.entries.len());
    }
    Ok(())
}

fn run_payload(args: PayloadArgs, indent: usize) -> Result<()> {
    let is_secret = args.secret || args.eso.is_some() || args.kes.is_some();
    let rule = key_rule(is_secret);

    let source = if args.existing {
        if is_secret {
            ConfigSource::Secret(SecretSource::MountExisting)
        } else {
            ConfigSource::ConfigMap(ConfigMapSource::MountExisting)
        }
    } else if let Some(provider) = args.eso {
        let text = read_input(args.input.as_deref())?;
        ConfigSource::Secret(SecretSource::Eso {
            provider,
            role_arn: args.role_arn,
            spec: EsoSpec::from_yaml(&text)?,
        })
    } else if let Some(provider) = args.kes {
        let text = read_input(args.input.as_deref())?;
        ConfigSource::Secret(SecretSource::Kes {
            provider,
            role_arn: args.role_arn,
            items: parse_kes_items(&text)?,
        })
    } else {
        let input = args.input.as_deref().context("a data document is required")?;
        let (codec, outcome) = read_document(input, indent, &rule)?;
        report_diagnostics(input, &outcome.document);
        let data = DualViewController::new(outcome.model, codec, rule).validate_for_submission()?;
        if is_secret {
            ConfigSource::Secret(SecretSource::Kubernetes { data })
        } else {
            ConfigSource::ConfigMap(ConfigMapSource::Inline { data })
        }
    };

    let usage = match args.mount_path {
        None => Usage::Environment,
        Some(path) => {
            let mut volume = VolumeMount::new(path.to_string_lossy());
            if let Some(keys) = args.sub_path_keys {
                volume = volume.with_sub_path(SubPath::Keys(parse_sub_path_keys(&keys)?));
            } else if args.sub_path {
                volume = volume.with_sub_path(SubPath::PerKey);
            }
            if let Some(permission) = args.file_permission {
                volume = volume.with_file_permission(FilePermission::parse(&permission)?);
            }
            Usage::Volume(volume)
        }
    };

    let payload = ConfigPayloadBuilder::new(args.name, source).usage(usage).build()?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_diff(base: &Path, edited: &Path, secret: bool, indent: usize, output: Output) -> Result<()> {
    let rule = key_rule(secret);
    let (_, base_doc) = read_document(base, indent, &rule)?;
    let (_, edited_doc) = read_document(edited, indent, &rule)?;
    let diff = diff_mappings(&base_doc.model.to_mapping(), &edited_doc.model.to_mapping());
    let summary = diff.summary();

    match output {
        Output::Json if secret => println!("{}", serde_json::to_string_pretty(&summary)?),
        Output::Json => println!("{}", serde_json::to_string_pretty(&diff)?),
        Output::Human => {
            for change in &diff.changes {
                let line = match (change, secret) {
                    (MappingChange::Added { key, .. }, true) => format!("+ {key}"),
                    (MappingChange::Added { key, value }, false) => format!("+ {key}: {value}"),
                    (MappingChange::Changed { key, .. }, true) => format!("~ {key}"),
                    (MappingChange::Changed { key, before, after }, false) => format!("~ {key}: {before} -> {after}"),
                    (MappingChange::Removed { key, .. }, true) => format!("- {key}"),
                    (MappingChange::Removed { key, value }, false) => format!("- {key}: {value}"),
                };
                println!("{line}");
            }
            println!("adds: {}, updates: {}, removes: {}", summary.adds, summary.updates, summary.removes);
        }
    }
    Ok(())
}

fn run_prefs(
    preferences: &EditorPreferences,
    format: Option<TextFormat>,
    indent: Option<usize>,
    text_first_for_secrets: Option<bool>,
) -> Result<()> {
    if let Some(format) = format {
        preferences.set_default_format(format)?;
    }
    if let Some(indent) = indent {
        preferences.set_indent(indent)?;
    }
    if let Some(enabled) = text_first_for_secrets {
        preferences.set_text_first_for_secrets(enabled)?;
    }
    if format.is_some() || indent.is_some() || text_first_for_secrets.is_some() {
        info!(path = %preferences.path().display(), "preferences updated");
    }
    println!("{}", serde_json::to_string_pretty(&preferences.snapshot())?);
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    let path = path.context("a data document is required")?;
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn payload_flags_parse() {
        let cli = Cli::try_parse_from([
            "confmap",
            "payload",
            "data.yaml",
            "--name",
            "app",
            "--eso",
            "ESO_HashiCorpVault",
            "--mount-path",
            "/etc/app",
            "--file-permission",
            "644",
        ])
        .expect("valid arguments");
        let Commands::Payload(args) = cli.command else {
            panic!("expected payload command");
        };
        assert_eq!(args.eso, Some(EsoProvider::HashiCorpVault));
        assert_eq!(args.file_permission.as_deref(), Some("644"));
    }

    #[test]
    fn sub_path_requires_mount_path() {
        assert!(Cli::try_parse_from(["confmap", "payload", "--name", "app", "--sub-path"]).is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn emitted(directives: &str) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = log_builder(directives).with_writer(move || writer.clone()).finish();
        tracing::subscriber::with_default(subscriber, || {
            debug!("decoder detail");
            info!("preferences updated");
        });
        let bytes = logs.0.lock().expect("log buffer").clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn log_level_follows_directives() {
        let verbose = emitted("debug");
        assert!(verbose.contains("decoder detail"));
        assert!(verbose.contains("preferences updated"));

        let quiet = emitted("info");
        assert!(!quiet.contains("decoder detail"));
        assert!(quiet.contains("preferences updated"));
    }

    #[test]
    fn validate_fails_on_bad_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.yaml");
        fs::write(&path, "good: x\nbad key: y\n").expect("write fixture");
        assert!(run_validate(&path, false, 2, Output::Human).is_err());

        fs::write(&path, "good: x\n").expect("write fixture");
        assert!(run_validate(&path, false, 2, Output::Json).is_ok());
    }
}
