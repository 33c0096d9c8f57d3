//! One-shot evaluation from the command line.

use crate::loader::{self, LoadError};
use std::io::Read;
use std::path::PathBuf;
use verdict_core::{EvalError, EvaluationRequest};
use verdict_runtime::Evaluator;

/// `verdict eval` arguments
#[derive(Debug, Default, clap::Args)]
pub struct EvalArgs {
    /// Query to evaluate
    pub query: Option<String>,

    /// Read the query from stdin
    #[arg(long, conflicts_with_all = ["query", "stdin_input"])]
    pub stdin: bool,

    /// Policy or data file, or a directory of them (repeatable)
    #[arg(short, long = "data")]
    pub data: Vec<PathBuf>,

    /// Input document file
    #[arg(short, long, conflicts_with = "stdin_input")]
    pub input: Option<PathBuf>,

    /// Read the input document from stdin
    #[arg(short = 'I', long)]
    pub stdin_input: bool,

    /// Path expression applied to the result set
    #[arg(short, long)]
    pub result_path: Option<String>,
}

/// Eval failure
#[derive(Debug, thiserror::Error)]
pub enum EvalCommandError {
    /// Argument combination not allowed
    #[error("{0}")]
    Usage(&'static str),

    /// Stdin or input file unreadable
    #[error("unable to read {what}: {source}")]
    Read {
        /// What was being read
        what: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Data paths could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Evaluation failed
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl EvalArgs {
    /// Check flag combinations clap cannot express
    ///
    /// # Errors
    ///
    /// Returns a usage error for a missing query
    pub fn validate(&self) -> Result<(), EvalCommandError> {
        match (&self.query, self.stdin) {
            (None, false) => Err(EvalCommandError::Usage(
                "specify query argument or --stdin",
            )),
            (Some(_), true) => Err(EvalCommandError::Usage(
                "specify query argument or --stdin but not both",
            )),
            _ if self.stdin && self.stdin_input => Err(EvalCommandError::Usage(
                "specify --stdin or --stdin-input but not both",
            )),
            _ if self.stdin_input && self.input.is_some() => Err(EvalCommandError::Usage(
                "specify --stdin-input or --input but not both",
            )),
            _ => Ok(()),
        }
    }

    /// Assemble the evaluation request, reading stdin and files as needed
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be read or loaded
    pub fn request(&self, stdin: &mut impl Read) -> Result<EvaluationRequest, EvalCommandError> {
        self.validate()?;

        let query = match &self.query {
            Some(query) => query.clone(),
            None => read_all(stdin, "stdin")?,
        };

        let loaded = loader::load_paths(&self.data)?;
        let mut request = EvaluationRequest::new(query);
        request.data = loaded.data_json();
        request.packages = loaded.modules;

        if self.stdin_input {
            request = request.with_input(read_all(stdin, "stdin")?);
        } else if let Some(path) = &self.input {
            let input = std::fs::read_to_string(path).map_err(|source| EvalCommandError::Read {
                what: path.display().to_string(),
                source,
            })?;
            request = request.with_input(input);
        }

        if let Some(path) = &self.result_path {
            request = request.with_result_path(path.clone());
        }

        Ok(request)
    }
}

fn read_all(reader: &mut impl Read, what: &str) -> Result<String, EvalCommandError> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .map_err(|source| EvalCommandError::Read {
            what: what.to_string(),
            source,
        })?;
    Ok(buf)
}

/// Run one evaluation and render its output
///
/// # Errors
///
/// Returns the first usage, load or evaluation failure
pub fn run(args: &EvalArgs, stdin: &mut impl Read) -> Result<String, EvalCommandError> {
    let request = args.request(stdin)?;
    let evaluator = Evaluator::rego(0);
    let extracted = evaluator.run(&request)?;
    Ok(extracted.render_pretty()?)
}
