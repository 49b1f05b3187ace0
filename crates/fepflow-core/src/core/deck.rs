use crate::core::params::{SimulationParameters, WindowParameters};
use crate::core::schedule::format_lambda;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("Deck template not found: '{path}'", path = path.display())]
    TemplateMissing { path: PathBuf },

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single `key value` line injected at the head of a deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

impl Assignment {
    pub fn new(key: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<15} {}", self.key, self.value)
    }
}

/// Composes a deck: prepend lines in order, then the template, then the append
/// lines verbatim in order.
///
/// This is pure text composition; nothing is checked against engine syntax. The
/// result always ends with a newline, and a template of `N` lines yields exactly
/// `N + prepend.len() + append.len()` lines.
pub fn assemble(template: &str, prepend: &[Assignment], append: &[String]) -> String {
    let mut deck = String::with_capacity(template.len() + 64 * (prepend.len() + append.len()));

    for assignment in prepend {
        deck.push_str(&assignment.to_string());
        deck.push('\n');
    }

    deck.push_str(template);
    if !template.is_empty() && !template.ends_with('\n') {
        deck.push('\n');
    }

    for line in append {
        deck.push_str(line);
        deck.push('\n');
    }

    deck
}

/// Reads `template_path`, assembles the deck and writes it to `output_path`.
pub fn write_deck(
    template_path: &Path,
    prepend: &[Assignment],
    append: &[String],
    output_path: &Path,
) -> Result<PathBuf, DeckError> {
    let template = fs::read_to_string(template_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => DeckError::TemplateMissing {
            path: template_path.to_path_buf(),
        },
        _ => DeckError::Io {
            path: template_path.to_path_buf(),
            source: e,
        },
    })?;

    let deck = assemble(&template, prepend, append);
    fs::write(output_path, &deck).map_err(|e| DeckError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    debug!(
        "Wrote deck {:?} ({} prepended, {} appended line(s))",
        output_path,
        prepend.len(),
        append.len()
    );
    Ok(output_path.to_path_buf())
}

/// The file and output assignments every FEP window deck starts with.
pub fn fep_assignments(params: &SimulationParameters, output_prefix: &str) -> Vec<Assignment> {
    let mut assignments = vec![
        Assignment::new("outputName", output_prefix),
        Assignment::new("temperature", params.temperature),
        Assignment::new("structure", params.structure.display()),
        Assignment::new("coordinates", params.coordinates.display()),
    ];
    assignments.extend(
        params
            .parameter_files
            .iter()
            .map(|p| Assignment::new("parameters", p.display())),
    );
    assignments.push(Assignment::new("alchFile", params.fep_topology.display()));
    assignments.push(Assignment::new(
        "alchOutFile",
        format!("{}.fepout", output_prefix),
    ));
    assignments.push(Assignment::new(
        "extraBondsFile",
        params.restraints.display(),
    ));
    assignments
}

/// The lambda and stage directives appended to the end of a window deck.
pub fn fep_directives(window: &WindowParameters) -> Vec<String> {
    vec![
        format!("alchLambda      {}", format_lambda(window.window.lambda_start)),
        format!("alchLambda2     {}", format_lambda(window.window.lambda_end)),
        format!("alchEquilSteps  {}", window.equilibration_steps),
        format!("minimize        {}", window.minimization_steps),
        format!("reinitvels      {}", window.temperature),
        format!("run             {}", window.total_md_steps()),
    ]
}
