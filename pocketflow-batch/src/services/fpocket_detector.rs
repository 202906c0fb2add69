//! fpocket-backed candidate detection
//!
//! fpocket writes `<stem>_out/` next to the structure it is given, so it is
//! run on a copy staged inside the item's working directory. The input tree
//! is never written. The output is then renamed to `<stem>_fpocket/`, where
//! the rescoring stage expects to find it.

use crate::models::{Candidate, Center};
use crate::types::{DetectionError, Detector};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

const TOOL_NAME: &str = "fpocket";

/// Pocket header and score parsed from `<stem>_info.txt`
#[derive(Debug, Clone, PartialEq)]
pub struct PocketInfo {
    pub number: usize,
    pub score: f64,
}

/// Directory the detector leaves under `workdir` for `structure`
pub fn fpocket_output_dir(structure: &Path, workdir: &Path) -> PathBuf {
    workdir.join(format!("{}_fpocket", file_stem(structure)))
}

/// Where the structure is copied before fpocket runs on it
pub fn staged_structure_path(structure: &Path, workdir: &Path) -> PathBuf {
    match structure.file_name() {
        Some(name) => workdir.join(name),
        None => workdir.join(format!("{}.pdb", file_stem(structure))),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs the `fpocket` executable
pub struct FpocketDetector {
    binary: PathBuf,
}

impl FpocketDetector {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_tool(&self, structure: &Path, workdir: &Path) -> Result<PathBuf, DetectionError> {
        if !structure.is_file() {
            return Err(DetectionError::MissingOutput(structure.to_path_buf()));
        }

        let staged = staged_structure_path(structure, workdir);
        tokio::fs::copy(structure, &staged).await?;

        debug!(structure = %structure.display(), staged = %staged.display(), "Running fpocket");
        let output = Command::new(&self.binary)
            .arg("-f")
            .arg(&staged)
            .output()
            .await;
        if let Err(e) = tokio::fs::remove_file(&staged).await {
            debug!(path = %staged.display(), error = %e, "Could not remove staged structure");
        }
        let output = output.map_err(|e| DetectionError::Launch {
            tool: TOOL_NAME.to_string(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(DetectionError::ToolFailed {
                tool: TOOL_NAME.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stem = file_stem(structure);
        let produced = staged.with_file_name(format!("{}_out", stem));
        if !produced.is_dir() {
            return Err(DetectionError::MissingOutput(produced));
        }

        let target = fpocket_output_dir(structure, workdir);
        if target.exists() {
            tokio::fs::remove_dir_all(&target).await?;
        }
        move_dir(&produced, &target).await?;
        Ok(target)
    }
}

#[async_trait]
impl Detector for FpocketDetector {
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn detect(
        &self,
        structure: &Path,
        workdir: &Path,
    ) -> Result<Vec<Candidate>, DetectionError> {
        tokio::fs::create_dir_all(workdir).await?;
        let out_dir = self.run_tool(structure, workdir).await?;
        let candidates = read_pockets(&out_dir, &file_stem(structure))?;
        info!(
            structure = %structure.display(),
            pockets = candidates.len(),
            "fpocket detection complete"
        );
        Ok(candidates)
    }
}

/// Rename, falling back to copy + delete across filesystems
async fn move_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry.path().strip_prefix(from).map_err(std::io::Error::other)?;
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&dest).await?;
        } else {
            tokio::fs::copy(entry.path(), &dest).await?;
        }
    }
    tokio::fs::remove_dir_all(from).await
}

/// Parse candidates from a moved fpocket output directory
pub fn read_pockets(out_dir: &Path, stem: &str) -> Result<Vec<Candidate>, DetectionError> {
    let info_path = out_dir.join(format!("{}_info.txt", stem));
    if !info_path.is_file() {
        return Err(DetectionError::MissingOutput(info_path));
    }
    let info = std::fs::read_to_string(&info_path)?;
    let pockets = parse_info(&info).map_err(|message| DetectionError::Parse {
        path: info_path.clone(),
        message,
    })?;

    let mut candidates = Vec::with_capacity(pockets.len());
    for pocket in pockets {
        let atoms_path = out_dir
            .join("pockets")
            .join(format!("pocket{}_atm.pdb", pocket.number));
        let (center, membership) = if atoms_path.is_file() {
            parse_pocket_atoms(&std::fs::read_to_string(&atoms_path)?)
        } else {
            debug!(path = %atoms_path.display(), "Pocket atom file missing");
            (None, BTreeSet::new())
        };

        let mut candidate = Candidate::new(center.unwrap_or_default(), pocket.score);
        candidate.membership = membership;
        candidates.push(candidate);
    }
    Ok(candidates)
}

/// Parse `Pocket N :` blocks and their `Score :` lines
pub fn parse_info(content: &str) -> Result<Vec<PocketInfo>, String> {
    let mut pockets: Vec<PocketInfo> = Vec::new();

    for line in content.lines() {
        // Headers start at column 0; per-pocket properties are indented
        if let Some(rest) = line.strip_prefix("Pocket ") {
            let number = rest
                .trim()
                .trim_end_matches(':')
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("bad pocket header '{}': {}", line.trim(), e))?;
            pockets.push(PocketInfo { number, score: 0.0 });
            continue;
        }

        let trimmed = line.trim();

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        // "Druggability Score" also ends in "Score"; only the bare key counts
        if key.trim() == "Score" {
            if let Some(current) = pockets.last_mut() {
                current.score = value
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("bad score '{}': {}", value.trim(), e))?;
            }
        }
    }

    Ok(pockets)
}

/// Centroid of ATOM records and the residues they belong to
pub fn parse_pocket_atoms(content: &str) -> (Option<Center>, BTreeSet<String>) {
    let mut coords = Vec::new();
    let mut residues = BTreeSet::new();

    for line in content.lines().filter(|l| l.starts_with("ATOM")) {
        let field = |range: std::ops::Range<usize>| line.get(range).map(str::trim);
        let x = field(30..38).and_then(|s| s.parse::<f64>().ok());
        let y = field(38..46).and_then(|s| s.parse::<f64>().ok());
        let z = field(46..54).and_then(|s| s.parse::<f64>().ok());
        if let (Some(x), Some(y), Some(z)) = (x, y, z) {
            coords.push(Center::new(x, y, z));
        }

        let res_name = field(17..20).unwrap_or("");
        let chain = field(21..22).unwrap_or("");
        let res_seq = field(22..26).unwrap_or("");
        if !res_name.is_empty() && !res_seq.is_empty() {
            residues.insert(format!("{}:{}{}", chain, res_name, res_seq));
        }
    }

    (Center::centroid(coords), residues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INFO: &str = "Pocket 1 :\n\
\tScore : \t0.512\n\
\tDruggability Score : \t0.003\n\
\tNumber of Alpha Spheres : \t42\n\
\tPocket volume (Monte Carlo) : \t512.3\n\
\n\
Pocket 2 :\n\
\tScore : \t0.250\n\
\tDruggability Score : \t0.900\n";

    const ATOMS: &str = "HEADER\n\
ATOM      1  N   ALA A  10       1.000   2.000   3.000  1.00  0.00           N\n\
ATOM      2  CA  ALA A  10       3.000   4.000   5.000  1.00  0.00           C\n\
ATOM      3  CB  GLY B 112      -1.000   0.000   1.000  1.00  0.00           C\n\
HETATM    4  O   HOH A 200       9.000   9.000   9.000  1.00  0.00           O\n";

    #[test]
    fn test_parse_info_ignores_druggability_score() {
        let pockets = parse_info(INFO).unwrap();
        assert_eq!(
            pockets,
            vec![
                PocketInfo { number: 1, score: 0.512 },
                PocketInfo { number: 2, score: 0.25 },
            ]
        );
    }

    #[test]
    fn test_parse_info_rejects_garbage_header() {
        assert!(parse_info("Pocket abc :\n").is_err());
    }

    #[test]
    fn test_parse_pocket_atoms() {
        let (center, residues) = parse_pocket_atoms(ATOMS);
        let center = center.unwrap();
        assert!((center.x - 1.0).abs() < 1e-9);
        assert!((center.y - 2.0).abs() < 1e-9);
        assert!((center.z - 3.0).abs() < 1e-9);
        let expected: BTreeSet<String> =
            ["A:ALA10", "B:GLY112"].iter().map(|s| s.to_string()).collect();
        assert_eq!(residues, expected);
    }

    #[test]
    fn test_read_pockets_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("1abc_fpocket");
        std::fs::create_dir_all(out.join("pockets")).unwrap();
        std::fs::write(out.join("1abc_info.txt"), INFO).unwrap();
        std::fs::write(out.join("pockets").join("pocket1_atm.pdb"), ATOMS).unwrap();

        let candidates = read_pockets(&out, "1abc").unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].raw_score, 0.512);
        assert_eq!(candidates[0].membership.len(), 2);
        // pocket 2 has no atom file
        assert_eq!(candidates[1].center, Center::default());
        assert!(candidates[1].membership.is_empty());
    }

    #[test]
    fn test_missing_info_file() {
        let temp_dir = TempDir::new().unwrap();
        match read_pockets(temp_dir.path(), "1abc") {
            Err(DetectionError::MissingOutput(path)) => {
                assert!(path.ends_with("1abc_info.txt"))
            }
            other => panic!("Expected MissingOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_output_dir_naming() {
        let dir = fpocket_output_dir(Path::new("/data/in/1abc.pdb"), Path::new("/runs/1abc"));
        assert_eq!(dir, PathBuf::from("/runs/1abc/1abc_fpocket"));
    }

    #[test]
    fn test_staged_path_keeps_file_name() {
        let staged = staged_structure_path(Path::new("/data/in/1abc.cif"), Path::new("/runs/1abc_cif"));
        assert_eq!(staged, PathBuf::from("/runs/1abc_cif/1abc.cif"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detection_leaves_input_directory_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("fake-fpocket");
        std::fs::write(
            &script,
            "#!/bin/sh
             base=\"${2%.*}\"
             mkdir -p \"${base}_out/pockets\"
             printf 'Pocket 1 :\\n\\tScore : \\t0.700\\n' > \"${base}_out/$(basename \"$base\")_info.txt\"
",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let structure = input.join("1abc.pdb");
        std::fs::write(&structure, ATOMS).unwrap();
        let workdir = temp_dir.path().join("out").join("1abc_pdb");

        let candidates = FpocketDetector::new(&script)
            .detect(&structure, &workdir)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw_score, 0.7);

        let input_entries: Vec<_> = std::fs::read_dir(&input).unwrap().collect();
        assert_eq!(input_entries.len(), 1);
        assert!(fpocket_output_dir(&structure, &workdir).join("1abc_info.txt").is_file());
        assert!(!staged_structure_path(&structure, &workdir).exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let temp_dir = TempDir::new().unwrap();
        let structure = temp_dir.path().join("1abc.pdb");
        std::fs::write(&structure, ATOMS).unwrap();

        let detector = FpocketDetector::new("/nonexistent/bin/fpocket");
        let err = detector
            .detect(&structure, &temp_dir.path().join("work"))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::Launch { .. }));
    }
}
