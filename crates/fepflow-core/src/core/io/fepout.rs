use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const FEPOUT_EXTENSION: &str = "fepout";

const ENERGY_RECORD: &str = "FepEnergy:";
const COLLECTION_START: &str = "#STARTING";
const WINDOW_END: &str = "#Free";
const MIN_ENERGY_COLUMNS: usize = 10;

#[derive(Debug, Error)]
pub enum FepoutError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No .fepout files found in '{dir}'", dir = dir.display())]
    NoResults { dir: PathBuf },

    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: FepoutParseErrorKind,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FepoutParseErrorKind {
    #[error("Energy record has {found} columns, expected at least 10")]
    TooFewColumns { found: usize },
    #[error("Invalid float in column {column} (value: '{value}')")]
    InvalidFloat { column: usize, value: String },
    #[error("Window summary line does not contain a '[ start end ]' lambda label")]
    MalformedWindowSummary,
}

/// Samples collected for one lambda window, after the engine's equilibration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FepWindowData {
    /// Window label as printed by the engine, e.g. `[ 0 0.025 ]`.
    pub label: String,
    pub lambda_start: f64,
    pub lambda_end: f64,
    /// Instantaneous energy difference per sample (kcal/mol).
    pub delta_e: Vec<f64>,
    /// Running free energy estimate per sample (kcal/mol).
    pub delta_g: Vec<f64>,
    pub elec: Vec<f64>,
    pub vdw: Vec<f64>,
}

/// Parses concatenated `.fepout` content into one entry per completed window.
///
/// Energy records are only taken between a `#STARTING COLLECTION` marker and the
/// `#Free energy change` summary that closes the window.
pub fn parse_fepout(reader: &mut impl BufRead) -> Result<Vec<FepWindowData>, FepoutError> {
    let mut windows = Vec::new();
    let mut current = FepWindowData::default();
    let mut collecting = false;

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens.first().copied() {
            Some(WINDOW_END) => {
                let (label, start, end) = parse_window_summary(&tokens).ok_or(FepoutError::Parse {
                    line: line_num,
                    kind: FepoutParseErrorKind::MalformedWindowSummary,
                })?;
                let mut finished = std::mem::take(&mut current);
                finished.label = label;
                finished.lambda_start = start;
                finished.lambda_end = end;
                debug!(
                    "Parsed window {} with {} sample(s)",
                    finished.label,
                    finished.delta_e.len()
                );
                windows.push(finished);
                collecting = false;
            }
            Some(ENERGY_RECORD) if collecting => {
                if tokens.len() < MIN_ENERGY_COLUMNS {
                    return Err(FepoutError::Parse {
                        line: line_num,
                        kind: FepoutParseErrorKind::TooFewColumns {
                            found: tokens.len(),
                        },
                    });
                }
                let column = |idx: usize| -> Result<f64, FepoutError> {
                    tokens[idx].parse::<f64>().map_err(|_| FepoutError::Parse {
                        line: line_num,
                        kind: FepoutParseErrorKind::InvalidFloat {
                            column: idx,
                            value: tokens[idx].to_string(),
                        },
                    })
                };
                let (elec, elec_dl) = (column(2)?, column(3)?);
                let (vdw, vdw_dl) = (column(4)?, column(5)?);
                current.delta_e.push(column(6)?);
                current.delta_g.push(column(9)?);
                current.elec.push(elec_dl - elec);
                current.vdw.push(vdw_dl - vdw);
            }
            Some(COLLECTION_START) => collecting = true,
            _ => {}
        }
    }

    if !current.delta_e.is_empty() {
        warn!(
            "Ignoring {} sample(s) after the last completed window",
            current.delta_e.len()
        );
    }

    Ok(windows)
}

pub fn read_fepout_path<P: AsRef<Path>>(path: P) -> Result<Vec<FepWindowData>, FepoutError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FepoutError::File {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_fepout(&mut BufReader::new(file))
}

fn parse_window_summary(tokens: &[&str]) -> Option<(String, f64, f64)> {
    let open = tokens.iter().position(|&t| t == "[")?;
    let bracket = tokens.get(open..open + 4)?;
    if bracket[3] != "]" {
        return None;
    }
    let start = bracket[1].parse().ok()?;
    let end = bracket[2].parse().ok()?;
    Some((bracket.join(" "), start, end))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Concatenated { files: usize },
    /// The output already existed and was left untouched.
    AlreadyExists,
}

/// Concatenates every `.fepout` file in `dir` into `output`, in natural numeric
/// order of their file names (`lambda_2` before `lambda_10`).
pub fn collect_fepout(dir: &Path, output: &Path) -> Result<CollectOutcome, FepoutError> {
    if output.exists() {
        warn!("{:?} already exists; reusing it", output);
        return Ok(CollectOutcome::AlreadyExists);
    }

    let dir_err = |e: io::Error| FepoutError::File {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == FEPOUT_EXTENSION) {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(FepoutError::NoResults {
            dir: dir.to_path_buf(),
        });
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));

    let out_err = |e: io::Error| FepoutError::File {
        path: output.to_path_buf(),
        source: e,
    };
    let mut writer = BufWriter::new(File::create(output).map_err(out_err)?);
    for path in &files {
        let mut input = File::open(path).map_err(|e| FepoutError::File {
            path: path.clone(),
            source: e,
        })?;
        io::copy(&mut input, &mut writer).map_err(out_err)?;
    }
    writer.flush().map_err(out_err)?;

    debug!("Concatenated {} file(s) into {:?}", files.len(), output);
    Ok(CollectOutcome::Concatenated { files: files.len() })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Text(&'a str),
    Number(u128),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let split = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(split);
        out.push(match head.parse::<u128>() {
            Ok(n) if is_digit => Chunk::Number(n),
            _ => Chunk::Text(head),
        });
        rest = tail;
    }
    out
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn window_block(start: &str, end: &str, samples: &[(f64, f64)]) -> String {
        let mut s = format!("#NEW FEP WINDOW: LAMBDA SET TO {start} LAMBDA2 {end}\n");
        s.push_str("FepEnergy:      0   -10.0   -10.0   5.0   5.0   99.0   0.0   298.0   99.0\n");
        s.push_str("#STARTING COLLECTION OF ENSEMBLE AVERAGE\n");
        for (i, (de, dg)) in samples.iter().enumerate() {
            s.push_str(&format!(
                "FepEnergy: {:>6} -100.0 -99.5 20.0 20.25 {de} 0.0 298.0 {dg}\n",
                (i + 1) * 100
            ));
        }
        s.push_str(&format!(
            "#Free energy change for lambda window [ {start} {end} ] is 0.1 ; net change until now is 0.1\n"
        ));
        s
    }

    #[test]
    fn parse_collects_samples_only_after_collection_start() {
        let content = window_block("0", "0.5", &[(0.1, 0.05), (0.2, 0.07)])
            + &window_block("0.5", "1", &[(0.3, 0.2)]);
        let windows = parse_fepout(&mut Cursor::new(content)).unwrap();

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].label, "[ 0 0.5 ]");
        assert_eq!(windows[0].delta_e, vec![0.1, 0.2]);
        assert_eq!(windows[0].delta_g, vec![0.05, 0.07]);
        assert_eq!(windows[0].elec, vec![0.5, 0.5]);
        assert_eq!(windows[0].vdw, vec![0.25, 0.25]);
        assert_eq!(windows[1].lambda_start, 0.5);
        assert_eq!(windows[1].lambda_end, 1.0);
        assert_eq!(windows[1].delta_e, vec![0.3]);
    }

    #[test]
    fn parse_ignores_trailing_incomplete_window() {
        let content = window_block("0", "1", &[(0.1, 0.1)])
            + "#STARTING COLLECTION OF ENSEMBLE AVERAGE\n"
            + "FepEnergy: 100 0 0 0 0 1.0 0 298 1.0\n";
        let windows = parse_fepout(&mut Cursor::new(content)).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn parse_reports_line_of_bad_float() {
        let content = "#STARTING COLLECTION\nFepEnergy: 100 0 0 0 0 oops 0 298 1.0\n";
        let err = parse_fepout(&mut Cursor::new(content)).unwrap_err();
        match err {
            FepoutError::Parse { line, kind } => {
                assert_eq!(line, 2);
                assert_eq!(
                    kind,
                    FepoutParseErrorKind::InvalidFloat {
                        column: 6,
                        value: "oops".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_reports_short_energy_record() {
        let content = "#STARTING COLLECTION\nFepEnergy: 100 0 0\n";
        assert!(matches!(
            parse_fepout(&mut Cursor::new(content)),
            Err(FepoutError::Parse {
                line: 2,
                kind: FepoutParseErrorKind::TooFewColumns { found: 4 }
            })
        ));
    }

    #[test]
    fn parse_rejects_summary_without_lambda_label() {
        let content = "#Free energy change is 0.1\n";
        assert!(matches!(
            parse_fepout(&mut Cursor::new(content)),
            Err(FepoutError::Parse {
                kind: FepoutParseErrorKind::MalformedWindowSummary,
                ..
            })
        ));
    }

    #[test]
    fn natural_order_sorts_numbers_by_value() {
        let mut names = vec!["lambda_10.fepout", "lambda_2.fepout", "lambda_01.fepout"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["lambda_01.fepout", "lambda_2.fepout", "lambda_10.fepout"]
        );
    }

    #[test]
    fn collect_concatenates_in_natural_order() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results");
        fs::create_dir(&results).unwrap();
        fs::write(results.join("lambda_10.fepout"), "ten\n").unwrap();
        fs::write(results.join("lambda_9.fepout"), "nine\n").unwrap();
        fs::write(results.join("lambda_9.log"), "ignored\n").unwrap();

        let output = dir.path().join("all_F.fepout");
        let outcome = collect_fepout(&results, &output).unwrap();

        assert_eq!(outcome, CollectOutcome::Concatenated { files: 2 });
        assert_eq!(fs::read_to_string(&output).unwrap(), "nine\nten\n");
    }

    #[test]
    fn collect_leaves_existing_output_untouched() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("all_F.fepout");
        fs::write(&output, "previous\n").unwrap();

        let outcome = collect_fepout(&dir.path().join("missing"), &output).unwrap();
        assert_eq!(outcome, CollectOutcome::AlreadyExists);
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous\n");
    }

    #[test]
    fn collect_fails_for_missing_or_empty_directory() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.fepout");

        let missing = dir.path().join("missing");
        assert!(matches!(
            collect_fepout(&missing, &output),
            Err(FepoutError::File { path, .. }) if path == missing
        ));

        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert!(matches!(
            collect_fepout(&empty, &output),
            Err(FepoutError::NoResults { .. })
        ));
    }

    #[test]
    fn read_fepout_path_reports_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.fepout");
        assert!(matches!(
            read_fepout_path(&path),
            Err(FepoutError::File { .. })
        ));
    }
}
