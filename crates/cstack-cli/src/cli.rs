use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cstack_codec::StackFormat;
use cstack_model::{headings, Step, StepBody};
use cstack_session::{FsStorage, SessionConfig, StackSession};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "cstack", version, about = "Inspect, convert and export command stacks")]
pub(crate) struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args, Clone)]
struct GlobalArgs {
    /// Directory holding one folder per bucket
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// TOML session configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bucket to read from, overriding the configuration
    #[arg(long)]
    bucket: Option<String>,
    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the steps of a stack
    Inspect {
        /// Object name, e.g. `ops/pass.ycs`
        name: String,
    },
    /// Print the numbered heading outline
    Outline {
        /// Object name
        name: String,
    },
    /// Rewrite an XML stack as YCS, removing the XML object
    Convert {
        /// Object name of the XML stack
        name: String,
    },
    /// Serialize a stack in either format
    Export {
        /// Object name
        name: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Ycs)]
        format: FormatArg,
        /// Output file; standard output when absent
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Xml,
    Ycs,
}

impl From<FormatArg> for StackFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Xml => Self::Xml,
            FormatArg::Ycs => Self::Ycs,
        }
    }
}

impl Cli {
    pub(crate) fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);
        let _ = if self.global.log_json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    }

    pub(crate) async fn run(self, out: &mut impl Write) -> anyhow::Result<()> {
        let mut session = self.global.open()?;
        match self.command {
            Command::Inspect { name } => {
                load(&mut session, &name).await?;
                inspect(&session, out)?;
            }
            Command::Outline { name } => {
                load(&mut session, &name).await?;
                for heading in headings(session.steps()) {
                    let indent = (heading.level - 1) * 2;
                    writeln!(out, "{:indent$}{}", "", heading.render())?;
                }
            }
            Command::Convert { name } => {
                load(&mut session, &name).await?;
                let target = session
                    .convert_to_ycs()
                    .await
                    .with_context(|| format!("failed to convert {name}"))?;
                info!(from = %name, to = %target, "Converted");
                writeln!(out, "{target}")?;
            }
            Command::Export {
                name,
                format,
                output,
            } => {
                load(&mut session, &name).await?;
                let text = session.serialize(format.into())?;
                match output {
                    Some(path) => std::fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?,
                    None => out.write_all(text.as_bytes())?,
                }
            }
        }
        Ok(())
    }
}

impl GlobalArgs {
    fn open(&self) -> anyhow::Result<StackSession> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(bucket) = &self.bucket {
            config = config.with_bucket(bucket.clone());
        }
        let storage = Arc::new(FsStorage::new(&self.root));
        Ok(StackSession::new(config, storage))
    }
}

async fn load(session: &mut StackSession, name: &str) -> anyhow::Result<()> {
    session
        .load(name)
        .await
        .with_context(|| format!("failed to load {name}"))
}

fn inspect(session: &StackSession, out: &mut impl Write) -> anyhow::Result<()> {
    let advancement = session.advancement();
    writeln!(
        out,
        "{} ({}, {} steps, advance on {} after {} ms)",
        session.object_name().unwrap_or("-"),
        session.format(),
        session.steps().len(),
        advancement.acknowledgment,
        advancement.wait,
    )?;
    for (index, step) in session.steps().iter().enumerate() {
        writeln!(out, "{:>3}  {:<7}  {}", index + 1, step.step_type().as_str(), describe(step))?;
        if let Some(comment) = step.comment() {
            writeln!(out, "            # {comment}")?;
        }
    }
    let parameters = session.monitored_parameters();
    if !parameters.is_empty() {
        writeln!(out, "parameters: {}", parameters.join(", "))?;
    }
    Ok(())
}

fn describe(step: &Step) -> String {
    match step.body() {
        StepBody::Command(cmd) if !cmd.args.is_empty() => {
            let args: Vec<String> = cmd
                .args
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            format!("{cmd} {}", args.join(" "))
        }
        StepBody::Command(_) | StepBody::Check(_) | StepBody::Text(_) | StepBody::Verify(_) => {
            step.to_string()
        }
    }
}
