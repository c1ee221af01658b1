//! Template Fields CLI - JSON bridge over the field builder
//!
//! Commands: check, build
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on unreadable input, 2 on validation failure

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use templatefields_core::{
    FieldDefinition, FieldPatch, Template, TemplateChanges, TemplateData, TemplateFields,
    TemplateFieldsBuilder, ValidationError,
};

#[derive(Parser)]
#[command(name = "templatefields-cli")]
#[command(about = "Template Fields CLI - validated template schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the fields of a template file
    Check {
        /// Path to a template JSON file
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Replay field operations and print the resulting template
    Build {
        /// Path to a build spec JSON file
        #[arg(short, long)]
        spec: PathBuf,
    },
}

/// A template as stored on disk. Field definitions stay raw JSON until the
/// builder has checked them, so failures name the offending field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateFile {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    created_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    fields: IndexMap<String, Value>,
}

impl TemplateFile {
    /// Add every stored definition to `builder` under the usual rules
    fn seed(&self, builder: &mut TemplateFieldsBuilder) -> Result<(), ValidationError> {
        for (name, raw) in &self.fields {
            let definition = FieldDefinition::from_json_unchecked(raw.clone())?;
            builder.add_field(name, definition)?;
        }
        Ok(())
    }

    /// Metadata only; the builder supplies the fields
    fn metadata(&self) -> Template {
        Template {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
            tags: self.tags.clone(),
            fields: TemplateFields::default(),
        }
    }
}

/// Input of `build`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildSpec {
    /// Existing template to seed from; the output is then an update of it
    #[serde(default)]
    template: Option<TemplateFile>,
    #[serde(default)]
    data: Option<NewTemplate>,
    #[serde(default)]
    changes: TemplateChanges,
    #[serde(default)]
    operations: Vec<Operation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewTemplate {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Operation {
    Add { name: String, definition: Value },
    Update { name: String, patch: FieldPatch },
    Remove { name: String },
}

#[derive(Debug)]
enum CliError {
    Input(String),
    Invalid(ValidationError),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Input(_) => 1,
            CliError::Invalid(_) => 2,
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        CliError::Invalid(e)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { template } => read_json(&template).and_then(check),
        Commands::Build { spec } => read_json(&spec)
            .and_then(|spec: BuildSpec| build(spec, TemplateFieldsBuilder::new()))
            .and_then(|t| serde_json::to_value(&t).map_err(|e| CliError::Input(e.to_string()))),
    };

    match result {
        Ok(output) => {
            emit(&output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = match &e {
                CliError::Input(message) => message.clone(),
                CliError::Invalid(err) => err.to_string(),
            };
            emit(&json!({"success": false, "error": message}));
            ExitCode::from(e.exit_code())
        }
    }
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => println!(r#"{{"success": false, "error": "{}"}}"#, e),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Input(format!("Invalid JSON in {}: {}", path.display(), e)))
}

fn check(file: TemplateFile) -> Result<Value, CliError> {
    let mut builder = TemplateFieldsBuilder::new();
    file.seed(&mut builder)?;

    let fields = builder.build()?;
    let fingerprint = fields
        .fingerprint()
        .map_err(|e| CliError::Input(e.to_string()))?;

    info!(template = %file.id, fields = fields.len(), "checked template");
    Ok(json!({
        "valid": true,
        "errors": builder.validate(),
        "fieldCount": fields.len(),
        "fingerprint": fingerprint,
    }))
}

fn build(spec: BuildSpec, mut builder: TemplateFieldsBuilder) -> Result<Template, CliError> {
    if let Some(file) = &spec.template {
        file.seed(&mut builder)?;
    }

    for op in spec.operations {
        match op {
            Operation::Add { name, definition } => {
                builder.add_field(&name, FieldDefinition::from_json_unchecked(definition)?)?;
            }
            Operation::Update { name, patch } => {
                // date defaults arrive as text; read them against the stored type
                let patch = match builder.field(&name) {
                    Some(current) => patch.coerce_default(current.field_type),
                    None => patch,
                };
                builder.update_field(&name, patch)?;
            }
            Operation::Remove { name } => {
                builder.remove_field(&name);
            }
        }
    }

    let template = match (&spec.template, spec.data) {
        (Some(file), _) => builder.update_template(&file.metadata(), spec.changes)?,
        (None, Some(data)) => {
            let mut new = TemplateData::new(
                data.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                data.name,
                data.created_at.unwrap_or_else(Utc::now),
            )
            .tags(data.tags);
            new.description = data.description;
            builder.to_template(new)?
        }
        (None, None) => {
            return Err(CliError::Input(
                "Build spec needs either \"template\" or \"data\"".to_string(),
            ))
        }
    };

    info!(template = %template.id, fields = template.fields.len(), "built template");
    Ok(template)
}
